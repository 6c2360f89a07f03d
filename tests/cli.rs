mod common;

use std::process::Command;

use common::{fixtures_root, scratch_fixtures};

fn cmdmock() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cmdmock"));
    cmd.env_remove("CMDMOCK_FIXTURES_ROOT")
        .env_remove("CMDMOCK_COMMAND_TYPE")
        .env_remove("CMDMOCK_TIMEOUT_SECS")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn list_prints_scenarios_as_json() {
    let output = cmdmock()
        .args(["list", "--json", "--command-type", "git", "--file", "log/follow.toml"])
        .arg("--fixtures")
        .arg(fixtures_root())
        .output()
        .expect("run list");
    assert!(output.status.success());
    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).expect("parse json");
    let names: Vec<&str> = entries
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|entry| entry["name"].as_str())
        .collect();
    assert_eq!(names, vec!["basic", "grep", "unknown_path"]);
}

#[test]
fn resolve_reports_binding_and_mismatch() {
    let output = cmdmock()
        .args(["resolve", "--json", "--command-type", "git", "--file", "status.toml"])
        .arg("--fixtures")
        .arg(fixtures_root())
        .args(["--", "git", "add", "src/app.py", "--verbose"])
        .output()
        .expect("run resolve");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("parse json");
    assert_eq!(report["matched"], true);
    assert_eq!(report["scenario"], "add");
    assert_eq!(report["binding"]["filepath"], "src/app.py");

    let output = cmdmock()
        .args(["resolve", "--command-type", "git", "--file", "status.toml"])
        .arg("--fixtures")
        .arg(fixtures_root())
        .args(["--", "git", "commit"])
        .output()
        .expect("run resolve");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no recorded scenario"), "{stderr}");
}

#[cfg(unix)]
#[test]
fn record_then_resolve_round_trips() {
    let fixtures = scratch_fixtures();
    let status = cmdmock()
        .args(["record", "--command-type", "sh", "--file", "echo.toml", "--name", "hello"])
        .args(["--var", "msg=hello world"])
        .arg("--fixtures")
        .arg(fixtures.path())
        .args(["--", "echo", "{msg}"])
        .status()
        .expect("run record");
    assert!(status.success());

    let recorded = std::fs::read_to_string(fixtures.path().join("mocks/sh/outputs/hello.txt"))
        .expect("read output");
    assert_eq!(recorded, "hello world\n");

    let output = cmdmock()
        .args(["resolve", "--json", "--command-type", "sh", "--file", "echo.toml"])
        .arg("--fixtures")
        .arg(fixtures.path())
        .args(["--", "echo", "goodbye"])
        .output()
        .expect("run resolve");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("parse json");
    assert_eq!(report["scenario"], "hello");
    assert_eq!(report["binding"]["msg"], "goodbye");
}
