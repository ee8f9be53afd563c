//! Runtime configuration read from the environment.
//!
//! All problems are collected before failing so a misconfigured deployment
//! reports everything at once.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

pub const PUBLISHABLE_KEY_VAR: &str = "TASKER_PUBLISHABLE_KEY";
pub const API_URL_VAR: &str = "TASKER_API_URL";
pub const ENV_VAR: &str = "TASKER_ENV";

pub const DEFAULT_API_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
    #[default]
    Local,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
            Environment::Local => "local",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Environment::Production),
            "development" => Ok(Environment::Development),
            "local" => Ok(Environment::Local),
            other => Err(format!(
                "{ENV_VAR} must be one of production, development, local (got {other:?})"
            )),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid configuration: {}", .issues.join("; "))]
pub struct ConfigError {
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Identity provider publishable key.
    pub publishable_key: String,
    pub api_url: Url,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unset and empty values are treated alike.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut issues = Vec::new();

        let publishable_key = get(PUBLISHABLE_KEY_VAR);
        if publishable_key.is_none() {
            issues.push(format!("{PUBLISHABLE_KEY_VAR} is required"));
        }

        let raw_url = get(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = match Url::parse(&raw_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
            Ok(url) => {
                issues.push(format!("{API_URL_VAR} must be http or https (got {})", url.scheme()));
                None
            }
            Err(err) => {
                issues.push(format!("{API_URL_VAR} is not a valid URL: {err}"));
                None
            }
        };

        let environment = match get(ENV_VAR).map(|raw| raw.parse::<Environment>()) {
            None => Some(Environment::default()),
            Some(Ok(env)) => Some(env),
            Some(Err(issue)) => {
                issues.push(issue);
                None
            }
        };

        match (publishable_key, api_url, environment) {
            (Some(publishable_key), Some(api_url), Some(environment)) if issues.is_empty() => {
                Ok(Config {
                    publishable_key,
                    api_url,
                    environment,
                })
            }
            _ => Err(ConfigError { issues }),
        }
    }

    /// Base URL for `TodoClient`, without a trailing slash.
    pub fn base_url(&self) -> String {
        self.api_url.as_str().trim_end_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = load(&[(PUBLISHABLE_KEY_VAR, "pk_test")]).unwrap();
        assert_eq!(config.publishable_key, "pk_test");
        assert_eq!(config.base_url(), "http://localhost:3000");
        assert_eq!(config.environment, Environment::Local);
    }

    #[test]
    fn reads_every_variable() {
        let config = load(&[
            (PUBLISHABLE_KEY_VAR, "pk_live"),
            (API_URL_VAR, "https://api.example.com/"),
            (ENV_VAR, "production"),
        ])
        .unwrap();
        assert_eq!(config.base_url(), "https://api.example.com");
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn empty_key_is_missing() {
        let err = load(&[(PUBLISHABLE_KEY_VAR, "  ")]).unwrap_err();
        assert_eq!(err.issues, vec![format!("{PUBLISHABLE_KEY_VAR} is required")]);
    }

    #[test]
    fn reports_all_issues_together() {
        let err = load(&[(API_URL_VAR, "not a url"), (ENV_VAR, "staging")]).unwrap_err();
        assert_eq!(err.issues.len(), 3);
        assert!(err.issues[1].starts_with(API_URL_VAR));
        assert!(err.issues[2].contains("staging"));
        assert!(err.to_string().starts_with("invalid configuration: "));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = load(&[(PUBLISHABLE_KEY_VAR, "pk"), (API_URL_VAR, "ftp://files.example.com")])
            .unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(err.issues[0].contains("http or https"));
    }
}
