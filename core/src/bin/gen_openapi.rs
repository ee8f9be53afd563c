//! Writes the OpenAPI document for the Tasker API to one or more files.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tasker_core::openapi::{self, DEFAULT_SERVER_URL};

#[derive(Parser)]
#[command(name = "gen-openapi", version, about = "Generate the Tasker OpenAPI document")]
struct Args {
    /// Files to write. Parent directories are created.
    #[arg(default_value = "openapi.json")]
    outputs: Vec<PathBuf>,

    /// Server URL advertised in the document.
    #[arg(long, default_value = DEFAULT_SERVER_URL)]
    server: String,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gen_openapi=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let document = match openapi::generate(&args.server) {
        Ok(document) => document,
        Err(e) => {
            error!(error = %e, "failed to build document");
            return ExitCode::FAILURE;
        }
    };
    let json = match serde_json::to_string_pretty(&document) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "failed to serialize document");
            return ExitCode::FAILURE;
        }
    };

    for path in &args.outputs {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                error!(path = %parent.display(), error = %e, "failed to create directory");
                return ExitCode::FAILURE;
            }
        }
        if let Err(e) = fs::write(path, &json) {
            error!(path = %path.display(), error = %e, "failed to write document");
            return ExitCode::FAILURE;
        }
        info!(path = %path.display(), "wrote OpenAPI document");
    }

    ExitCode::SUCCESS
}
