// gemini-mcp-core/src/diagnostics.rs

//! Optional observers invoked around every execution.
//!
//! Hooks are best effort. The executor logs and discards any error a hook
//! returns, so a hook can never change the outcome of an execution.

use crate::executor::{CommandRequest, ExecutionResult};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait DiagnosticsHook: Send + Sync {
    /// Called right before the child is spawned.
    async fn before(&self, request: &CommandRequest) -> Result<()>;
    /// Called after the execution finished; `result` is `None` on failure.
    async fn after(&self, request: &CommandRequest, result: Option<&ExecutionResult>) -> Result<()>;
}

/// Does nothing. Used when debug mode is off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

#[async_trait]
impl DiagnosticsHook for NoopHook {
    async fn before(&self, _request: &CommandRequest) -> Result<()> {
        Ok(())
    }

    async fn after(&self, _request: &CommandRequest, _result: Option<&ExecutionResult>) -> Result<()> {
        Ok(())
    }
}

/// Logs the process table (`ps aux`) before and after each execution.
#[derive(Debug, Clone)]
pub struct ProcessSnapshotHook {
    program: String,
    args: Vec<String>,
}

impl Default for ProcessSnapshotHook {
    fn default() -> Self {
        Self::with_command("ps", &["aux"])
    }
}

impl ProcessSnapshotHook {
    /// Uses a custom snapshot command instead of `ps aux`.
    pub fn with_command(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Runs the snapshot command on a blocking thread and returns its stdout.
    pub async fn snapshot(&self) -> Result<String> {
        let program = self.program.clone();
        let args = self.args.clone();
        let output = tokio::task::spawn_blocking(move || {
            duct::cmd(program.as_str(), args)
                .stdout_capture()
                .stderr_null()
                .unchecked()
                .run()
        })
        .await
        .context("Process snapshot task panicked")?
        .with_context(|| format!("Failed to run {}", self.program))?;

        if !output.status.success() {
            return Err(anyhow!(
                "{} exited with status {:?}",
                self.program,
                output.status.code()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl DiagnosticsHook for ProcessSnapshotHook {
    async fn before(&self, request: &CommandRequest) -> Result<()> {
        let table = self.snapshot().await?;
        debug!(command_type = %request.command_type, "Processes before gemini command:\n{}", table);
        Ok(())
    }

    async fn after(&self, request: &CommandRequest, _result: Option<&ExecutionResult>) -> Result<()> {
        let table = self.snapshot().await?;
        debug!(command_type = %request.command_type, "Processes after gemini command:\n{}", table);
        Ok(())
    }
}
