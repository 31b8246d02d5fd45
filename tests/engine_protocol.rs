#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout};

use datachef::engine::{CancelSignal, EngineBackend, EngineError, EngineInvocation, LogSink};
use datachef::types::{ExecutionLog, LogLevel};
use datachef_test_utils::stub_engine;
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;

fn invocation(action: &str) -> EngineInvocation {
    EngineInvocation::new(action, Vec::new(), json!({"pipe": {"name": "stub"}}))
}

fn drain(rx: &mut UnboundedReceiver<ExecutionLog>) -> Vec<ExecutionLog> {
    let mut entries = Vec::new();
    while let Ok(entry) = rx.try_recv() {
        entries.push(entry);
    }
    entries
}

async fn run(script: &str, action: &str) -> (Result<Value, EngineError>, Vec<ExecutionLog>) {
    init_tracing();
    let engine = stub_engine(script);
    let (sink, mut rx) = LogSink::channel();
    let result = with_timeout(engine.invoke(invocation(action), sink, CancelSignal::never())).await;
    (result, drain(&mut rx))
}

#[tokio::test]
async fn last_brace_line_is_the_result_and_plain_lines_are_forwarded() {
    let (result, logs) = run(
        r#"echo "scanning warehouse"; echo "found 2 tables"; echo '{"tables":["a","b"]}'"#,
        "list",
    )
    .await;

    assert_eq!(result.unwrap(), json!({"tables": ["a", "b"]}));

    let plain: Vec<&str> = logs
        .iter()
        .filter(|e| !e.message.starts_with('{'))
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(plain, vec!["scanning warehouse", "found 2 tables"]);
    assert!(logs.iter().all(|e| e.level == LogLevel::Info));
}

#[tokio::test]
async fn structured_stderr_is_surfaced_and_noise_is_dropped() {
    let (result, logs) = run(
        r#"echo '{"level":"warn","message":"slow scan"}' >&2; echo 'JVM noise: not json' >&2; echo '{}'"#,
        "list",
    )
    .await;

    assert_eq!(result.unwrap(), json!({}));

    let structured: Vec<&ExecutionLog> = logs.iter().filter(|e| e.message != "{}").collect();
    assert_eq!(structured.len(), 1);
    assert_eq!(structured[0].level, LogLevel::Warn);
    assert_eq!(structured[0].message, "slow scan");
}

#[tokio::test]
async fn invocation_arguments_reach_the_process() {
    let (result, _) = run(r#"printf '{"action":"%s","flag":"%s"}\n' "$2" "$3""#, "preview").await;
    assert_eq!(result.unwrap(), json!({"action": "preview", "flag": "--config"}));
}

#[tokio::test]
async fn missing_result_line_is_a_protocol_error() {
    let (result, logs) = run("echo 'done, nothing to report'", "list").await;

    let err = result.unwrap_err();
    assert!(matches!(err, EngineError::NoResult));
    assert!(err.is_protocol());
    assert_eq!(logs.len(), 1);
}

#[tokio::test]
async fn malformed_result_line_is_a_protocol_error() {
    let (result, _) = run("echo '{not json'", "list").await;
    assert!(matches!(result.unwrap_err(), EngineError::MalformedResult(_)));
}

#[tokio::test]
async fn nonzero_exit_carries_diagnostics() {
    let (result, _) = run("echo 'table not found: orders' >&2; exit 3", "preview").await;

    match result.unwrap_err() {
        EngineError::Execution { code, diagnostics } => {
            assert_eq!(code, Some(3));
            assert!(diagnostics.contains("table not found: orders"));
        }
        other => panic!("expected execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_program_fails_to_spawn() {
    init_tracing();
    let engine = datachef::engine::ProcessEngine::new(datachef::engine::EngineLauncher::new(
        "/nonexistent/datachef-engine",
    ));
    let err = engine
        .invoke(invocation("list"), LogSink::discard(), CancelSignal::never())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Spawn { .. }));
}

#[tokio::test]
async fn cancelling_kills_the_process() {
    init_tracing();
    let engine = stub_engine("echo started; sleep 30; echo '{}'");
    let (tx, signal) = CancelSignal::pair();

    let run = engine.invoke(invocation("execute"), LogSink::discard(), signal);
    let cancel = async {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let _ = tx.send(());
    };

    let (result, ()) = with_timeout(async { tokio::join!(run, cancel) }).await;
    assert!(matches!(result.unwrap_err(), EngineError::Cancelled));
}

#[tokio::test]
async fn invalid_utf8_on_stdout_does_not_stop_reading() {
    let (result, logs) = run(
        r#"printf 'reading caf\351.csv\n'; echo progress; echo '{"tables":["a"]}'"#,
        "list",
    )
    .await;

    assert_eq!(result.unwrap(), json!({"tables": ["a"]}));

    let messages: Vec<&str> = logs.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["reading caf\u{fffd}.csv", "progress", r#"{"tables":["a"]}"#]
    );
}

#[tokio::test]
async fn invalid_utf8_on_stderr_is_dropped_and_later_entries_survive() {
    let (result, logs) = run(
        r#"printf 'bad \351\n' >&2; echo '{"level":"warn","message":"slow scan"}' >&2; echo '{}'"#,
        "list",
    )
    .await;

    assert_eq!(result.unwrap(), json!({}));

    let warnings: Vec<&ExecutionLog> = logs.iter().filter(|e| e.level == LogLevel::Warn).collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "slow scan");
}

#[tokio::test]
async fn invalid_utf8_survives_into_failure_diagnostics() {
    let (result, _) = run(
        r#"printf 'missing \351\n' >&2; echo 'table not found' >&2; exit 2"#,
        "preview",
    )
    .await;

    match result.unwrap_err() {
        EngineError::Execution { code, diagnostics } => {
            assert_eq!(code, Some(2));
            assert!(diagnostics.contains("missing \u{fffd}"));
            assert!(diagnostics.contains("table not found"));
        }
        other => panic!("expected execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn blank_stdout_lines_are_forwarded() {
    let (result, logs) = run(r#"echo first; echo; echo '{}'"#, "list").await;

    assert_eq!(result.unwrap(), json!({}));
    let messages: Vec<&str> = logs.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["first", "", "{}"]);
}
