// src/engine/process.rs

//! Engine calls as child processes.

use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::protocol::{is_result_candidate, parse_diagnostic_line, parse_result_line};
use super::{CancelSignal, EngineBackend, EngineError, EngineInvocation, LogSink};
use crate::config::model::EngineConfig;
use crate::types::LogLevel;

/// Program, fixed leading arguments and environment for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineLauncher {
    pub program: PathBuf,
    pub prefix_args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, OsString)>,
}

impl EngineLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.prefix_args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// `<java_home>/bin/java <jvm options> -jar <jar>`, or `program` verbatim
    /// when one is configured.
    pub fn from_config(cfg: &EngineConfig) -> Self {
        if let Some(program) = &cfg.program {
            let mut launcher = Self::new(program);
            launcher.working_dir = cfg.working_dir.clone();
            return launcher;
        }

        let java_home = cfg
            .java_home
            .clone()
            .or_else(|| std::env::var_os("JAVA_HOME").map(PathBuf::from));

        let (program, env) = match java_home {
            Some(home) => {
                let bin = home.join("bin");
                let mut path = bin.clone().into_os_string();
                if let Some(existing) = std::env::var_os("PATH") {
                    path.push(":");
                    path.push(existing);
                }
                (
                    bin.join("java"),
                    vec![
                        ("JAVA_HOME".to_string(), home.into_os_string()),
                        ("PATH".to_string(), path),
                    ],
                )
            }
            None => (PathBuf::from("java"), Vec::new()),
        };

        let mut prefix_args = cfg.jvm_options.clone();
        prefix_args.push("-jar".to_string());
        prefix_args.push(cfg.jar_path.display().to_string());

        Self {
            program,
            prefix_args,
            working_dir: cfg.working_dir.clone(),
            env,
        }
    }

    fn command(&self, invocation: &EngineInvocation) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args).args(invocation.to_args());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Production [`EngineBackend`]: one child process per invocation.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    launcher: EngineLauncher,
}

impl ProcessEngine {
    pub fn new(launcher: EngineLauncher) -> Self {
        Self { launcher }
    }

    pub fn launcher(&self) -> &EngineLauncher {
        &self.launcher
    }

    async fn run(
        &self,
        invocation: EngineInvocation,
        logs: LogSink,
        mut cancel: CancelSignal,
    ) -> Result<Value, EngineError> {
        let program = self.launcher.program.display().to_string();
        info!(action = %invocation.action, program = %program, "starting engine process");

        let mut cmd = self.launcher.command(&invocation);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|source| EngineError::Spawn { program, source })?;

        let stdout_task = tokio::spawn(forward_stdout(child.stdout.take(), logs.clone()));
        let stderr_task = tokio::spawn(forward_stderr(child.stderr.take(), logs));

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                info!(action = %invocation.action, "cancellation requested; killing engine process");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill engine process on cancellation");
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(EngineError::Cancelled);
            }
        };

        let result_line = stdout_task.await.unwrap_or_default();
        let diagnostics = stderr_task.await.unwrap_or_default();

        info!(
            action = %invocation.action,
            exit_code = status.code().unwrap_or(-1),
            success = status.success(),
            "engine process exited"
        );

        if !status.success() {
            return Err(EngineError::Execution {
                code: status.code(),
                diagnostics,
            });
        }

        parse_result_line(result_line.as_deref())
    }
}

impl EngineBackend for ProcessEngine {
    fn invoke(
        &self,
        invocation: EngineInvocation,
        logs: LogSink,
        cancel: CancelSignal,
    ) -> Pin<Box<dyn Future<Output = Result<Value, EngineError>> + Send + '_>> {
        Box::pin(self.run(invocation, logs, cancel))
    }
}

/// Forward every stdout line as an info entry; remember the last result
/// candidate.
async fn forward_stdout<R>(stdout: Option<R>, logs: LogSink) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout?);
    let mut result_line = None;

    while let Some(line) = next_lossy_line(&mut reader, "stdout").await {
        if is_result_candidate(&line) {
            result_line = Some(line.clone());
        }
        logs.emit(LogLevel::Info, line);
    }

    result_line
}

/// Surface structured stderr entries; keep the full text for diagnostics.
async fn forward_stderr<R>(stderr: Option<R>, logs: LogSink) -> String
where
    R: AsyncRead + Unpin,
{
    let mut diagnostics = String::new();
    let Some(stderr) = stderr else {
        return diagnostics;
    };
    let mut reader = BufReader::new(stderr);

    while let Some(line) = next_lossy_line(&mut reader, "stderr").await {
        match parse_diagnostic_line(&line) {
            Some(entry) => logs.send(entry),
            None => debug!("engine stderr: {}", line),
        }
        diagnostics.push_str(&line);
        diagnostics.push('\n');
    }

    diagnostics
}

/// Read one line, replacing invalid UTF-8. `None` at EOF or on a read
/// error; the pipe must stay drained until the child closes it.
async fn next_lossy_line<R>(reader: &mut BufReader<R>, stream: &str) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    match reader.read_until(b'\n', &mut buf).await {
        Ok(0) => None,
        Ok(_) => {
            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            Some(String::from_utf8_lossy(&buf).into_owned())
        }
        Err(e) => {
            warn!(stream, error = %e, "failed to read engine output");
            None
        }
    }
}
