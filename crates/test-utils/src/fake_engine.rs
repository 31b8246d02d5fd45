use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use datachef::engine::{CancelSignal, EngineBackend, EngineError, EngineInvocation, LogSink};
use datachef::types::LogLevel;
use serde_json::{Value, json};
use tokio::sync::Notify;

/// What the fake answers to one invocation.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Result(Value),
    /// Fails like a process that exited with code 1.
    Fail(String),
    /// Blocks until the cancel signal fires, then reports `Cancelled`.
    HangUntilCancelled,
}

/// A fake engine that:
/// - records every invocation
/// - emits the configured log lines
/// - answers from a queue of scripted responses, then with the fallback
pub struct FakeEngine {
    responses: Mutex<VecDeque<FakeResponse>>,
    fallback: FakeResponse,
    logs: Vec<(LogLevel, String)>,
    invocations: Arc<Mutex<Vec<EngineInvocation>>>,
    started: Arc<Notify>,
}

impl FakeEngine {
    /// Every call succeeds with `{}`.
    pub fn new() -> Self {
        Self::answering(FakeResponse::Result(json!({})))
    }

    pub fn answering(fallback: FakeResponse) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback,
            logs: Vec::new(),
            invocations: Arc::new(Mutex::new(Vec::new())),
            started: Arc::new(Notify::new()),
        }
    }

    pub fn then(self, response: FakeResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_log(mut self, level: LogLevel, message: &str) -> Self {
        self.logs.push((level, message.to_string()));
        self
    }

    pub fn invocations(&self) -> Vec<EngineInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Resolves once an invocation has started (or already had).
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBackend for FakeEngine {
    fn invoke(
        &self,
        invocation: EngineInvocation,
        logs: LogSink,
        mut cancel: CancelSignal,
    ) -> Pin<Box<dyn Future<Output = Result<Value, EngineError>> + Send + '_>> {
        self.invocations.lock().unwrap().push(invocation);
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        Box::pin(async move {
            for (level, message) in &self.logs {
                logs.emit(*level, message.clone());
            }
            self.started.notify_one();

            match response {
                FakeResponse::Result(value) => Ok(value),
                FakeResponse::Fail(diagnostics) => Err(EngineError::Execution {
                    code: Some(1),
                    diagnostics,
                }),
                FakeResponse::HangUntilCancelled => {
                    cancel.cancelled().await;
                    Err(EngineError::Cancelled)
                }
            }
        })
    }
}
