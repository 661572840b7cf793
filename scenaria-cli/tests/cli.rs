use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

fn scenaria(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("scenaria").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG").env("NO_COLOR", "1");
    cmd
}

fn stdout(cmd: &mut Command, code: i32) -> String {
    let assert = cmd.assert().code(code);
    String::from_utf8_lossy(&assert.get_output().stdout).into_owned()
}

fn stderr(cmd: &mut Command, code: i32) -> String {
    let assert = cmd.assert().code(code);
    String::from_utf8_lossy(&assert.get_output().stderr).into_owned()
}

const EMPTY: &str = "schemaVersion: scenario/v1\ntitle: nothing to do\n";

const UNREACHABLE: &str = r#"
schemaVersion: scenario/v1
title: unreachable
steps:
- title: connect
  protocol: http
  request:
    url: http://127.0.0.1:1/
- title: never
  protocol: http
  request:
    url: http://127.0.0.1:1/
"#;

#[test]
fn run_passes_with_exit_code_zero() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("empty.yaml"), EMPTY).unwrap();

    let out = stdout(scenaria(tmp.path()).args(["run", "--verbose", "--summary", "empty.yaml"]), 0);
    assert!(out.contains("=== RUN   empty.yaml"), "{out}");
    assert!(out.contains("--- PASS: empty.yaml/nothing_to_do"), "{out}");
    assert!(out.contains("ok  \t"), "{out}");
    assert!(out.contains("1 passed, 0 failed, 0 skipped"), "{out}");
}

#[test]
fn failing_step_exits_with_one() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("down.yaml"), UNREACHABLE).unwrap();

    let out = stdout(scenaria(tmp.path()).args(["run", "down.yaml"]), 1);
    assert!(out.contains("--- FAIL: down.yaml/unreachable/connect"), "{out}");
    assert!(out.contains("steps[0].request: failed to send request"), "{out}");
    assert!(!out.contains("--- SKIP"), "quiet output hides skipped steps: {out}");
    assert!(!out.contains("\u{1b}["), "NO_COLOR must disable colors: {out}");

    let out = stdout(scenaria(tmp.path()).args(["run", "--verbose", "--no-color", "down.yaml"]), 1);
    assert!(out.contains("=== RUN   down.yaml/unreachable/never"), "{out}");
    assert!(out.contains("--- SKIP: down.yaml/unreachable/never"), "{out}");
}

#[test]
fn run_uses_configured_scenarios() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("suite")).unwrap();
    fs::write(tmp.path().join("suite/a.yaml"), EMPTY).unwrap();
    fs::write(
        tmp.path().join("scenaria.yaml"),
        "schemaVersion: config/v1\nscenarios: [suite]\noutput:\n  verbose: true\n  report:\n    json: {filename: report.json}\n",
    )
    .unwrap();

    let out = stdout(scenaria(tmp.path()).arg("run"), 0);
    assert!(out.contains("--- PASS: suite/a.yaml"), "{out}");
    let report = fs::read_to_string(tmp.path().join("report.json")).unwrap();
    assert!(report.contains("\"outcome\": \"passed\""), "{report}");
}

#[test]
fn invalid_config_exits_with_two() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("bad.yaml"), "schemaVersion: config/v0\n").unwrap();

    let err = stderr(scenaria(tmp.path()).args(["run", "--config", "bad.yaml"]), 2);
    assert!(err.contains("invalid config bad.yaml"), "{err}");
    assert!(err.contains("schemaVersion"), "{err}");

    let err = stderr(scenaria(tmp.path()).args(["run", "--config", "missing.yaml"]), 2);
    assert!(err.contains("failed to read missing.yaml"), "{err}");
}

#[test]
fn list_prints_scenarios_and_steps() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("down.yaml"), UNREACHABLE).unwrap();

    let out = stdout(scenaria(tmp.path()).args(["list", "down.yaml"]), 0);
    assert_eq!(out, "down.yaml\n  unreachable\n    - connect\n    - never\n");

    let json = stdout(scenaria(tmp.path()).args(["list", "--format", "json", "down.yaml"]), 0);
    assert!(json.contains("\"title\": \"unreachable\""), "{json}");
}

#[test]
fn list_rejects_invalid_scenarios() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("bad.yaml"), "schemaVersion: scenario/v1\nsteps:\n- title: x\n").unwrap();

    let err = stderr(scenaria(tmp.path()).args(["list", "bad.yaml"]), 2);
    assert!(err.contains("steps[0].request"), "{err}");
}

#[test]
fn config_init_then_validate() {
    let tmp = TempDir::new().unwrap();

    let out = stdout(scenaria(tmp.path()).args(["config", "init"]), 0);
    assert!(out.contains("wrote scenaria.yaml"), "{out}");
    let written = fs::read_to_string(tmp.path().join("scenaria.yaml")).unwrap();
    assert!(written.starts_with("schemaVersion: config/v1"), "{written}");

    let err = stderr(scenaria(tmp.path()).args(["config", "init"]), 2);
    assert!(err.contains("already exists"), "{err}");
    scenaria(tmp.path()).args(["config", "init", "--force"]).assert().success();

    // the default config points at ./scenarios
    stderr(scenaria(tmp.path()).args(["config", "validate"]), 2);
    fs::create_dir_all(tmp.path().join("scenarios")).unwrap();
    fs::write(tmp.path().join("scenarios/a.yaml"), EMPTY).unwrap();
    let out = stdout(scenaria(tmp.path()).args(["config", "validate"]), 0);
    assert_eq!(out.trim(), "ok: 1 scenario file(s)");
}
