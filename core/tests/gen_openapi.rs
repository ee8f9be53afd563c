//! Runs the `gen-openapi` binary and checks the files it writes.

use std::process::Command;

#[test]
fn writes_every_output_with_the_requested_server() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("openapi.json");
    let nested = dir.path().join("docs/api/openapi.json");

    let status = Command::new(env!("CARGO_BIN_EXE_gen-openapi"))
        .arg(&first)
        .arg(&nested)
        .args(["--server", "https://api.example.test"])
        .status()
        .unwrap();
    assert!(status.success());

    let written = std::fs::read_to_string(&first).unwrap();
    assert_eq!(written, std::fs::read_to_string(&nested).unwrap());

    let doc: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(doc["openapi"], "3.0.2");
    assert_eq!(doc["servers"][0]["url"], "https://api.example.test");
    assert_eq!(doc["paths"]["/v1/todos"]["get"]["operationId"], "getTodos");
}

#[test]
fn output_is_stable_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.json");
    let b = dir.path().join("b.json");

    for path in [&a, &b] {
        let status = Command::new(env!("CARGO_BIN_EXE_gen-openapi"))
            .arg(path)
            .status()
            .unwrap();
        assert!(status.success());
    }

    assert_eq!(
        std::fs::read_to_string(&a).unwrap(),
        std::fs::read_to_string(&b).unwrap()
    );
}
