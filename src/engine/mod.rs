// src/engine/mod.rs

//! Bridge to the external compute engine.
//!
//! The engine is a separate process spoken to over a line protocol (see
//! [`protocol`]). Everything above this module talks to an [`EngineBackend`]
//! so tests can swap the process for a fake.
//!
//! - [`process`] spawns the real engine with `tokio::process`.
//! - [`protocol`] holds the pure parsing rules and the config blob builder.

pub mod process;
pub mod protocol;

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::types::{ExecutionLog, LogLevel};

pub use process::{EngineLauncher, ProcessEngine};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine produced no result object")]
    NoResult,

    #[error("engine result is not valid JSON: {0}")]
    MalformedResult(#[source] serde_json::Error),

    #[error("engine exited with {}: {}", exit_label(.code), .diagnostics.trim())]
    Execution {
        code: Option<i32>,
        diagnostics: String,
    },

    #[error("engine run was cancelled")]
    Cancelled,

    #[error("engine IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// The process ran but broke the output contract.
    pub fn is_protocol(&self) -> bool {
        matches!(self, EngineError::NoResult | EngineError::MalformedResult(_))
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_string(),
    }
}

/// One engine call: an action, its positional arguments and the config blob.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInvocation {
    pub action: String,
    pub args: Vec<String>,
    pub config: Value,
}

impl EngineInvocation {
    pub fn new(action: impl Into<String>, args: Vec<String>, config: Value) -> Self {
        Self {
            action: action.into(),
            args,
            config,
        }
    }

    /// Process arguments after the launcher prefix.
    pub fn to_args(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.args.len() + 4);
        out.push("--action".to_string());
        out.push(self.action.clone());
        out.extend(self.args.iter().cloned());
        out.push("--config".to_string());
        out.push(self.config.to_string());
        out
    }
}

/// Fan-out for execution log entries.
///
/// Every entry is mirrored to `tracing` at debug level and sent to each
/// attached channel. Closed receivers are ignored.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    senders: Vec<mpsc::UnboundedSender<ExecutionLog>>,
}

impl LogSink {
    /// A sink that only mirrors to tracing.
    pub fn discard() -> Self {
        Self::default()
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionLog>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { senders: vec![tx] }, rx)
    }

    /// A sink that delivers to both `self` and `other`.
    pub fn merged(&self, other: &LogSink) -> Self {
        let mut senders = self.senders.clone();
        senders.extend(other.senders.iter().cloned());
        Self { senders }
    }

    pub fn emit(&self, level: LogLevel, message: impl Into<String>) {
        self.send(ExecutionLog::new(level, message));
    }

    pub fn send(&self, entry: ExecutionLog) {
        debug!(level = %entry.level, "engine: {}", entry.message);
        for tx in &self.senders {
            let _ = tx.send(entry.clone());
        }
    }
}

/// Resolves once an explicit cancel is sent. A dropped sender never cancels.
#[derive(Debug)]
pub struct CancelSignal(Option<oneshot::Receiver<()>>);

impl CancelSignal {
    pub fn pair() -> (oneshot::Sender<()>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self(Some(rx)))
    }

    pub fn never() -> Self {
        Self(None)
    }

    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.0.as_mut() {
            if rx.await.is_ok() {
                return;
            }
        }
        self.0 = None;
        std::future::pending::<()>().await
    }
}

/// How engine calls are executed.
///
/// Production uses [`ProcessEngine`]; tests provide doubles that return
/// scripted results without spawning processes.
pub trait EngineBackend: Send + Sync {
    fn invoke(
        &self,
        invocation: EngineInvocation,
        logs: LogSink,
        cancel: CancelSignal,
    ) -> Pin<Box<dyn Future<Output = Result<Value, EngineError>> + Send + '_>>;
}
