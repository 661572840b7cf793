mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::FakeProtocol;
use scenaria_exec::reporter::{Outcome, Report};
use scenaria_exec::{Config, Engine};

fn outcome(report: &Report, name: &str) -> Outcome {
    report
        .find(name)
        .unwrap_or_else(|| panic!("no test named {name}"))
        .outcome
}

const ECHO: &str = r#"
schemaVersion: scenario/v1
title: echo
vars:
  auth: token-1
steps:
- title: post
  protocol: http
  request:
    method: POST
    url: '{{env.TEST_ADDR}}/echo'
    header:
      Authorization: 'Bearer {{vars.auth}}'
    body:
      message: hello
  expect:
    code: 200
    header:
      X-Authorization: 'Bearer {{vars.auth}}'
    body:
      message: hello
"#;

#[tokio::test]
async fn echo_request_passes() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(dir.path(), "echo.yaml", ECHO);
    let engine = common::engine(dir.path());

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(summary.passed, "{out}");
    assert_eq!(outcome(&summary.report, "echo.yaml/echo/post"), Outcome::Passed);
    assert!(out.contains("--- PASS: echo.yaml/echo/post"), "{out}");
    assert!(out.contains("Bearer token-1"), "{out}");
    assert!(out.contains("1 passed, 0 failed, 0 skipped"), "{out}");
}

#[tokio::test]
async fn body_mismatch_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let at = ECHO.rfind("message: hello").unwrap();
    let doc = format!("{}message: world{}", &ECHO[..at], &ECHO[at + "message: hello".len()..]);
    let file = common::write(dir.path(), "mismatch.yaml", &doc);
    let engine = common::engine(dir.path());

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(!summary.passed, "{out}");
    let line = out
        .lines()
        .find(|l| l.contains("steps[0].expect.body.message:"))
        .unwrap_or_else(|| panic!("no error line in {out}"));
    assert!(line.contains("hello") && line.contains("world"), "{line}");
    assert!(out.contains("--- FAIL: mismatch.yaml/echo/post"), "{out}");
}

#[tokio::test]
async fn left_arrow_functions_nest() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "arrow.yaml",
        r#"
schemaVersion: scenario/v1
title: arrow
steps:
- title: post
  protocol: http
  request:
    method: POST
    url: '{{env.TEST_ADDR}}/echo'
    body:
      messages: [a, b, c]
  expect:
    body:
      messages:
        length <-:
          greater <-: 2
"#,
    );
    let engine = common::engine(dir.path());

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(summary.passed, "{out}");
}

fn lazy_doc(body: &str) -> String {
    format!(
        r#"
schemaVersion: scenario/v1
title: lazy
vars:
  body: hi
steps:
- title: post
  protocol: http
  request:
    method: POST
    url: '{{{{env.TEST_ADDR}}}}/echo'
    body:
      message: {body}
  expect:
    body:
      message: '{{{{$ == vars.body}}}}'
"#
    )
}

#[tokio::test]
async fn lazy_dollar_compares_with_actual_value() {
    let dir = tempfile::tempdir().unwrap();
    let pass = common::write(dir.path(), "pass.yaml", &lazy_doc("hi"));
    let fail = common::write(dir.path(), "fail.yaml", &lazy_doc("hello"));
    let engine = common::engine(dir.path());

    let (summary, out) = common::run(&engine, &[pass]).await;
    assert!(summary.passed, "{out}");

    let (summary, out) = common::run(&engine, &[fail]).await;
    assert!(!summary.passed, "{out}");
    assert!(out.contains("steps[0].expect.body.message"), "{out}");
}

#[tokio::test]
async fn retry_reinvokes_failed_step() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "retry.yaml",
        r#"
schemaVersion: scenario/v1
title: retry
steps:
- title: flaky
  protocol: fake
  request: {n: 1}
  retry:
    constant:
      interval: 1ms
      maxRetries: 1
"#,
    );
    let fake = FakeProtocol {
        fail_first: 1,
        ..FakeProtocol::default()
    };
    let mut engine = common::engine(dir.path());
    engine.register_protocol(Arc::new(fake.clone()));

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(summary.passed, "{out}");
    assert_eq!(fake.calls(), 2);
    let logs = summary.report.all_logs();
    assert!(logs.iter().any(|l| l == "invocation 1"), "{logs:?}");
    assert!(logs.iter().any(|l| l == "invocation 2"), "{logs:?}");
    assert!(logs.iter().any(|l| l.starts_with("attempt 1 failed, retrying after")), "{logs:?}");
}

#[tokio::test]
async fn retries_run_out() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "exhausted.yaml",
        r#"
schemaVersion: scenario/v1
title: retry
steps:
- title: flaky
  protocol: fake
  request: {n: 1}
  retry:
    constant:
      interval: 1ms
      maxRetries: 2
"#,
    );
    let fake = FakeProtocol {
        fail_first: 10,
        ..FakeProtocol::default()
    };
    let mut engine = common::engine(dir.path());
    engine.register_protocol(Arc::new(fake.clone()));

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(!summary.passed, "{out}");
    assert_eq!(fake.calls(), 3);
    assert!(out.contains("transient failure"), "{out}");
}

#[tokio::test]
async fn step_timeout_fails_without_deadlock() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "timeout.yaml",
        r#"
schemaVersion: scenario/v1
title: slow
steps:
- title: sleep
  protocol: fake
  request: {n: 1}
  timeout: 50ms
"#,
    );
    let fake = FakeProtocol {
        sleep: Duration::from_millis(200),
        ..FakeProtocol::default()
    };
    let mut engine = common::engine(dir.path());
    engine.register_protocol(Arc::new(fake.clone()));

    let started = Instant::now();
    let (summary, out) = tokio::time::timeout(Duration::from_secs(5), common::run(&engine, &[file]))
        .await
        .expect("run finished");
    assert!(!summary.passed, "{out}");
    assert!(out.contains("steps[0].timeout: timeout exceeded"), "{out}");
    assert!(!out.contains("despite the context canceled"), "{out}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn timed_out_step_is_abandoned_after_waiting_limit() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "abandon.yaml",
        r#"
schemaVersion: scenario/v1
title: slow
steps:
- title: sleep
  protocol: fake
  request: {n: 1}
  timeout: 20ms
  postTimeoutWaitingLimit: 10ms
"#,
    );
    let fake = FakeProtocol {
        sleep: Duration::from_secs(3),
        ..FakeProtocol::default()
    };
    let mut engine = common::engine(dir.path());
    engine.register_protocol(Arc::new(fake.clone()));

    let started = Instant::now();
    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(!summary.passed, "{out}");
    assert!(out.contains("timeout exceeded"), "{out}");
    assert!(out.contains("step hasn't finished despite the context canceled"), "{out}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn failed_step_skips_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "skip.yaml",
        r#"
schemaVersion: scenario/v1
title: skip
steps:
- title: first
  protocol: http
  request:
    url: '{{env.TEST_ADDR}}/status/500'
- title: second
  protocol: fake
  request: {n: 1}
"#,
    );
    let fake = FakeProtocol::default();
    let mut engine = common::engine(dir.path());
    engine.register_protocol(Arc::new(fake.clone()));

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(!summary.passed, "{out}");
    assert_eq!(fake.calls(), 0);
    assert_eq!(outcome(&summary.report, "skip.yaml/skip/first"), Outcome::Failed);
    assert_eq!(outcome(&summary.report, "skip.yaml/skip/second"), Outcome::Skipped);
    assert!(out.contains("expected code is 200 but got 500 Internal Server Error"), "{out}");
    assert!(out.contains("skipped because a previous step failed"), "{out}");
}

#[tokio::test]
async fn continue_on_error_keeps_running() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "continue.yaml",
        r#"
schemaVersion: scenario/v1
title: continue
steps:
- title: first
  protocol: fake
  request: {n: 1}
  continueOnError: true
- title: second
  protocol: fake
  request: {n: 2}
"#,
    );
    let fake = FakeProtocol {
        fail_first: 1,
        ..FakeProtocol::default()
    };
    let mut engine = common::engine(dir.path());
    engine.register_protocol(Arc::new(fake.clone()));

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(!summary.passed, "{out}");
    assert_eq!(fake.calls(), 2);
    assert_eq!(outcome(&summary.report, "continue.yaml/continue/second"), Outcome::Passed);
}

#[tokio::test]
async fn bound_vars_and_step_results_flow_forward() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "bind.yaml",
        r#"
schemaVersion: scenario/v1
title: bind
steps:
- id: first
  protocol: fake
  request: {n: 1}
  expect: {call: 1}
  bind:
    vars:
      got: '{{response.call}}'
- title: echo
  protocol: http
  request:
    method: POST
    url: '{{env.TEST_ADDR}}/echo'
    body:
      got: '{{vars.got}}'
      status: '{{steps.first.status}}'
      call: '{{steps.first.response.call}}'
  expect:
    body:
      got: 1
      status: passed
      call: 1
"#,
    );
    let mut engine = common::engine(dir.path());
    engine.register_protocol(Arc::new(FakeProtocol::default()));

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(summary.passed, "{out}");
}

#[tokio::test]
async fn included_scenario_runs_as_subtest() {
    let dir = tempfile::tempdir().unwrap();
    common::write(
        dir.path(),
        "parts/inner.yaml",
        r#"
schemaVersion: scenario/v1
title: inner
steps:
- id: ping
  protocol: fake
  request: {n: 1}
"#,
    );
    let file = common::write(
        dir.path(),
        "outer.yaml",
        r#"
schemaVersion: scenario/v1
title: outer
steps:
- id: inc
  include: parts/inner.yaml
- title: check
  protocol: http
  request:
    method: POST
    url: '{{env.TEST_ADDR}}/echo'
    body:
      status: '{{steps.inc.steps.ping.status}}'
  expect:
    body:
      status: passed
"#,
    );
    let fake = FakeProtocol::default();
    let mut engine = common::engine(dir.path());
    engine.register_protocol(Arc::new(fake.clone()));

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(summary.passed, "{out}");
    assert_eq!(fake.calls(), 1);
    assert_eq!(outcome(&summary.report, "outer.yaml/outer/inc/inner/ping"), Outcome::Passed);
}

#[tokio::test]
async fn missing_include_fails_at_include_path() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "outer.yaml",
        "schemaVersion: scenario/v1\ntitle: outer\nsteps:\n- include: nope.yaml\n",
    );
    let engine = common::engine(dir.path());

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(!summary.passed, "{out}");
    assert!(out.contains("steps[0].include: failed to include"), "{out}");
}

#[tokio::test]
async fn every_document_of_a_file_runs() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "multi.yaml",
        r#"
schemaVersion: scenario/v1
title: one
steps:
- protocol: fake
  request: {n: 1}
---
schemaVersion: scenario/v1
title: two
steps:
- protocol: fake
  request: {n: 2}
"#,
    );
    let fake = FakeProtocol::default();
    let mut engine = common::engine(dir.path());
    engine.register_protocol(Arc::new(fake.clone()));

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(summary.passed, "{out}");
    assert_eq!(fake.calls(), 2);
    let file_node = summary.report.find("multi.yaml").unwrap();
    let names: Vec<_> = file_node.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["multi.yaml/one", "multi.yaml/two"]);
}

#[tokio::test]
async fn unknown_protocol_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "proto.yaml",
        "schemaVersion: scenario/v1\ntitle: p\nsteps:\n- protocol: grpc\n  request: {}\n",
    );
    let engine = common::engine(dir.path());

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(!summary.passed, "{out}");
    assert!(out.contains("steps[0].protocol: unknown protocol \"grpc\""), "{out}");
}

#[tokio::test]
async fn invalid_file_fails_its_node_only() {
    let dir = tempfile::tempdir().unwrap();
    let bad = common::write(dir.path(), "a_bad.yaml", "schemaVersion: scenario/v9\n");
    let good = common::write(
        dir.path(),
        "b_good.yaml",
        "schemaVersion: scenario/v1\ntitle: g\nsteps:\n- protocol: fake\n  request: {}\n",
    );
    let mut engine = common::engine(dir.path());
    engine.register_protocol(Arc::new(FakeProtocol::default()));

    let (summary, out) = common::run(&engine, &[bad, good]).await;
    assert!(!summary.passed, "{out}");
    assert_eq!(outcome(&summary.report, "a_bad.yaml"), Outcome::Failed);
    assert_eq!(outcome(&summary.report, "b_good.yaml"), Outcome::Passed);
}

#[tokio::test]
async fn reports_are_written_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    common::echo_addr();
    common::write(dir.path(), "scenarios/echo.yaml", ECHO);
    let config = Config::parse(
        "schemaVersion: config/v1\nscenarios: [scenarios]\noutput:\n  report:\n    json: {filename: out/report.json}\n    junit: {filename: out/junit.xml}\n",
        "scenaria.yaml",
        dir.path().to_path_buf(),
    )
    .unwrap();
    let engine = Engine::new(config);

    let (summary, _) = common::run(&engine, &[]).await;
    assert!(summary.passed);

    let json = std::fs::read_to_string(dir.path().join("out/report.json")).unwrap();
    let report: Report = serde_json::from_str(&json).unwrap();
    assert_eq!(
        outcome(&report, "scenarios/echo.yaml/echo/post"),
        Outcome::Passed
    );
    let junit = std::fs::read_to_string(dir.path().join("out/junit.xml")).unwrap();
    assert!(junit.contains("<testsuites"), "{junit}");
    assert!(
        junit.contains(r#"<testcase classname="scenarios/echo.yaml" name="scenarios/echo.yaml/echo""#),
        "{junit}"
    );
    assert!(!junit.contains("<failure"), "{junit}");
}

#[tokio::test]
async fn junit_report_carries_failures() {
    let dir = tempfile::tempdir().unwrap();
    common::echo_addr();
    let at = ECHO.rfind("message: hello").unwrap();
    let doc = format!("{}message: world{}", &ECHO[..at], &ECHO[at + "message: hello".len()..]);
    common::write(dir.path(), "scenarios/mismatch.yaml", &doc);
    let config = Config::parse(
        "schemaVersion: config/v1\nscenarios: [scenarios]\noutput:\n  report:\n    junit: {filename: junit.xml}\n",
        "scenaria.yaml",
        dir.path().to_path_buf(),
    )
    .unwrap();
    let engine = Engine::new(config);

    let (summary, _) = common::run(&engine, &[]).await;
    assert!(!summary.passed);

    let junit = std::fs::read_to_string(dir.path().join("junit.xml")).unwrap();
    assert!(junit.contains(r#"<testsuites tests="1" failures="1" skipped="0""#), "{junit}");
    assert!(junit.contains(r#"name="scenarios/mismatch.yaml/echo""#), "{junit}");
    assert!(junit.contains(r#"<failure message="failed">"#), "{junit}");
    assert!(junit.contains("steps[0].expect.body.message: expected"), "{junit}");
}

#[tokio::test]
async fn secrets_never_reach_the_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "secret.yaml",
        r#"
schemaVersion: scenario/v1
title: secret
secrets:
  token: s3cr3t-value
steps:
- title: post
  protocol: http
  request:
    method: POST
    url: '{{env.TEST_ADDR}}/echo'
    header:
      Authorization: 'Bearer {{secrets.token}}'
    body:
      token: '{{secrets.token}}'
  expect:
    body:
      token: nope
"#,
    );
    let engine = common::engine(dir.path());

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(!summary.passed, "{out}");
    assert!(!out.contains("s3cr3t-value"), "{out}");
    assert!(out.contains("{{secrets.token}}"), "{out}");
}
