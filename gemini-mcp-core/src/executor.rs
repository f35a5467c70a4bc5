// gemini-mcp-core/src/executor.rs

//! Runs the gemini binary as a child process with a bounded lifetime.
//!
//! Each call to [`CommandExecutor::execute`] spawns exactly one child, waits for
//! it (or for the configured timeout) and returns either an [`ExecutionResult`]
//! or an [`ExecutionError`]. The executor holds no per-call state, so one
//! instance can be cloned and shared across concurrent requests.

use crate::config::{ENV_API_KEY, ExecutionConfig};
use crate::diagnostics::{DiagnosticsHook, NoopHook};
use crate::errors::ExecutionError;
use crate::output::normalize;
use crate::shell::{display_command, find_executable, shell_command_string};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Upper bound on how far ahead a deadline is placed, whatever the configured timeout.
const MAX_DEADLINE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Sub-command passed to the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    /// A plain question.
    Ask,
    /// An autonomous multi-step run.
    Agent,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Ask => "ask",
            CommandType::Agent => "agent",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command_type: CommandType,
    pub prompt: String,
    /// Flags placed after the common flags and before `--prompt`.
    pub extra_args: Vec<String>,
}

impl CommandRequest {
    pub fn new(command_type: CommandType, prompt: impl Into<String>) -> Self {
        Self {
            command_type,
            prompt: prompt.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Captured output of a finished child.
///
/// A non-zero `exit_code` still means the binary ran; it is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecutionResult {
    /// Shape returned to tool callers when the binary could not be run.
    pub fn from_error(err: &ExecutionError) -> Self {
        Self {
            stdout: String::new(),
            stderr: err.to_string(),
            exit_code: -1,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Clone)]
pub struct CommandExecutor {
    config: Arc<ExecutionConfig>,
    hook: Arc<dyn DiagnosticsHook>,
}

impl fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CommandExecutor {
    pub fn new(config: Arc<ExecutionConfig>) -> Self {
        Self {
            config,
            hook: Arc::new(NoopHook),
        }
    }

    /// Replaces the diagnostics hook run around each execution.
    pub fn with_hook(mut self, hook: Arc<dyn DiagnosticsHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Locates the configured binary, returning its resolved path.
    pub fn verify_executable_available(&self) -> Result<PathBuf, ExecutionError> {
        find_executable(&self.config.binary).ok_or_else(|| {
            warn!(binary = %self.config.binary, "gemini executable not found");
            ExecutionError::ExecutableNotFound(self.config.binary.clone())
        })
    }

    /// Builds the full argument vector, binary name first and `--prompt` last.
    pub fn build_command_line(&self, request: &CommandRequest) -> Vec<String> {
        let config = &self.config;
        let mut cmd = vec![
            config.binary.clone(),
            request.command_type.as_str().to_string(),
        ];
        if !config.model.is_empty() {
            cmd.push("--model".to_string());
            cmd.push(config.model.clone());
        }
        if config.use_all_files {
            cmd.push("--all-files".to_string());
        }
        if config.use_sandbox {
            cmd.push("--sandbox".to_string());
        }
        cmd.extend(request.extra_args.iter().cloned());
        cmd.push("--prompt".to_string());
        cmd.push(request.prompt.clone());
        cmd
    }

    /// Variables set on top of the inherited environment of this process.
    pub fn environment_overrides(&self) -> Vec<(String, String)> {
        let inherited = |key: &str, default: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let home = std::env::var("HOME")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| std::env::temp_dir().to_string_lossy().into_owned());

        let mut vars = Vec::with_capacity(8);
        if let Some(key) = &self.config.credential {
            vars.push((ENV_API_KEY.to_string(), key.clone()));
        }
        vars.push(("PYTHONUNBUFFERED".to_string(), "1".to_string()));
        vars.push(("LC_ALL".to_string(), "C.UTF-8".to_string()));
        vars.push(("LANG".to_string(), "C.UTF-8".to_string()));
        vars.push(("HOME".to_string(), home));
        vars.push(("TERM".to_string(), inherited("TERM", "xterm-256color")));
        vars.push(("COLORTERM".to_string(), inherited("COLORTERM", "truecolor")));
        vars.push(("NODE_OPTIONS".to_string(), "--no-warnings".to_string()));
        vars
    }

    /// Runs one request to completion.
    pub async fn execute(&self, request: &CommandRequest) -> Result<ExecutionResult, ExecutionError> {
        let program = self.verify_executable_available()?;
        let command_line = self.build_command_line(request);
        debug!(command = %display_command(&command_line), "Running gemini command");

        let command = self.prepare_command(&program, &command_line)?;

        if let Err(e) = self.hook.before(request).await {
            debug!(error = %e, "Diagnostics hook failed before execution");
        }

        let outcome = self.run_to_completion(command).await;

        match &outcome {
            Ok(result) if self.config.debug => {
                debug!(
                    exit_code = result.exit_code,
                    "stdout: {}\nstderr: {}",
                    result.stdout,
                    result.stderr
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!(command = %display_command(&command_line), error = %e, "gemini command failed");
            }
        }

        if let Err(e) = self.hook.after(request, outcome.as_ref().ok()).await {
            debug!(error = %e, "Diagnostics hook failed after execution");
        }

        outcome
    }

    fn prepare_command(
        &self,
        program: &Path,
        command_line: &[String],
    ) -> Result<Command, ExecutionError> {
        let mut command = if self.config.invoke_via_shell {
            let script = shell_command_string(command_line)?;
            let mut command = Command::new("sh");
            command.arg("-c").arg(script);
            command
        } else {
            let mut command = Command::new(program);
            command.args(&command_line[1..]);
            command
        };

        let working_dir = match &self.config.working_directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|e| {
                ExecutionError::unexpected(format!("Failed to get current directory: {}", e))
            })?,
        };

        let overrides = self.environment_overrides();
        debug!(
            working_dir = %working_dir.display(),
            env = ?redacted(&overrides),
            "Prepared child process"
        );

        command
            .envs(overrides)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The child leads its own group so a timeout can take its descendants down too.
        #[cfg(unix)]
        command.process_group(0);
        Ok(command)
    }

    async fn run_to_completion(&self, mut command: Command) -> Result<ExecutionResult, ExecutionError> {
        let timeout_secs = self.config.timeout_secs;
        let deadline = deadline_after(timeout_secs);

        let mut child = command.spawn().map_err(|e| {
            ExecutionError::unexpected(format!("Failed to start {}: {}", self.config.binary, e))
        })?;
        let mut group = ProcessGroup::of(&child);
        let readers = OutputReaders::attach(&mut child)?;

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                group.kill();
                terminate(&mut child).await;
                return Err(ExecutionError::unexpected(format!(
                    "Failed to wait for {}: {}",
                    self.config.binary, e
                )));
            }
            Err(_) => {
                warn!(timeout_secs, pid = ?child.id(), "Command timed out, killing process group");
                group.kill();
                terminate(&mut child).await;
                return Err(ExecutionError::Timeout(timeout_secs));
            }
        };

        // Pipes can outlive the child if it left descendants behind.
        let (stdout, stderr) = match readers.collect(deadline, timeout_secs).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Failed to collect child output, killing process group");
                group.kill();
                return Err(e);
            }
        };
        group.release();

        Ok(ExecutionResult {
            stdout: normalize(&stdout),
            stderr: stderr.trim().to_string(),
            exit_code: status.code().unwrap_or(-1),
        })
    }
}

fn redacted(vars: &[(String, String)]) -> Vec<String> {
    vars.iter()
        .map(|(k, v)| {
            if k == ENV_API_KEY {
                format!("{}=<redacted>", k)
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect()
}

fn deadline_after(timeout_secs: u64) -> Instant {
    Instant::now() + Duration::from_secs(timeout_secs).min(MAX_DEADLINE)
}

/// The process group led by a spawned child. Dropping it before [`ProcessGroup::release`]
/// kills every process still in the group, so a cancelled call leaves nothing behind.
struct ProcessGroup {
    id: Option<u32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self { id: child.id() }
    }

    fn kill(&mut self) {
        if let Some(id) = self.id.take() {
            kill_group(id);
        }
    }

    fn release(mut self) {
        self.id = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers. A negative pid addresses the group the child
    // leads; the id cannot be reused while any member of that group is alive.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        // ESRCH: every member already exited.
        debug!(pgid, error = %std::io::Error::last_os_error(), "Process group kill returned an error");
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill child process");
    }
}

/// Drains stdout and stderr concurrently so the child never blocks on a full pipe.
/// Dropping it aborts whichever reader is still running.
struct OutputReaders {
    stdout: JoinHandle<std::io::Result<String>>,
    stderr: JoinHandle<std::io::Result<String>>,
}

impl OutputReaders {
    fn attach(child: &mut Child) -> Result<Self, ExecutionError> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::unexpected("Child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionError::unexpected("Child stderr was not captured"))?;
        Ok(Self {
            stdout: tokio::spawn(read_stream(stdout)),
            stderr: tokio::spawn(read_stream(stderr)),
        })
    }

    async fn collect(
        mut self,
        deadline: Instant,
        timeout_secs: u64,
    ) -> Result<(String, String), ExecutionError> {
        let stdout = join_reader(&mut self.stdout, deadline, timeout_secs, "stdout").await?;
        let stderr = join_reader(&mut self.stderr, deadline, timeout_secs, "stderr").await?;
        Ok((stdout, stderr))
    }
}

impl Drop for OutputReaders {
    fn drop(&mut self) {
        self.stdout.abort();
        self.stderr.abort();
    }
}

async fn join_reader(
    handle: &mut JoinHandle<std::io::Result<String>>,
    deadline: Instant,
    timeout_secs: u64,
    stream: &str,
) -> Result<String, ExecutionError> {
    match tokio::time::timeout_at(deadline, handle).await {
        Ok(Ok(Ok(text))) => Ok(text),
        Ok(Ok(Err(e))) => Err(ExecutionError::unexpected(format!(
            "Failed to read child {}: {}",
            stream, e
        ))),
        Ok(Err(e)) => Err(ExecutionError::unexpected(format!(
            "Reader for child {} failed: {}",
            stream, e
        ))),
        Err(_) => Err(ExecutionError::Timeout(timeout_secs)),
    }
}

async fn read_stream<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<String> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_is_capped_for_huge_timeouts() {
        let before = Instant::now();
        let deadline = deadline_after(u64::MAX);
        assert!(deadline >= before + MAX_DEADLINE);
        assert!(deadline <= Instant::now() + MAX_DEADLINE);

        let short = deadline_after(5);
        assert!(short <= Instant::now() + Duration::from_secs(5));
    }

    fn executor(config: ExecutionConfig) -> CommandExecutor {
        CommandExecutor::new(Arc::new(config))
    }

    #[test]
    fn test_build_command_line_defaults() {
        let exec = executor(ExecutionConfig::default());
        let cmd = exec.build_command_line(&CommandRequest::new(CommandType::Ask, "test question"));
        assert_eq!(
            cmd,
            vec![
                "gemini",
                "ask",
                "--model",
                "gemini-2.5-flash",
                "--all-files",
                "--sandbox",
                "--prompt",
                "test question"
            ]
        );
    }

    #[test]
    fn test_build_command_line_optional_flags_off() {
        let exec = executor(ExecutionConfig {
            model: String::new(),
            use_all_files: false,
            use_sandbox: false,
            ..Default::default()
        });
        let cmd = exec.build_command_line(&CommandRequest::new(CommandType::Agent, "go"));
        assert_eq!(cmd, vec!["gemini", "agent", "--prompt", "go"]);
    }

    #[test]
    fn test_extra_args_before_prompt() {
        let exec = executor(ExecutionConfig::default());
        let request = CommandRequest::new(CommandType::Agent, "--sandbox").with_extra_args(["--yolo"]);
        let cmd = exec.build_command_line(&request);
        let n = cmd.len();
        assert_eq!(cmd[n - 3], "--yolo");
        assert_eq!(cmd[n - 2], "--prompt");
        // A prompt that looks like a flag is still the final value.
        assert_eq!(cmd[n - 1], "--sandbox");
    }

    #[test]
    fn test_environment_overrides() {
        let exec = executor(ExecutionConfig {
            credential: Some("key-123".into()),
            ..Default::default()
        });
        let vars = exec.environment_overrides();
        let get = |k: &str| vars.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("GEMINI_API_KEY"), Some("key-123"));
        assert_eq!(get("LC_ALL"), Some("C.UTF-8"));
        assert_eq!(get("LANG"), Some("C.UTF-8"));
        assert_eq!(get("PYTHONUNBUFFERED"), Some("1"));
        assert_eq!(get("NODE_OPTIONS"), Some("--no-warnings"));
        assert!(get("HOME").is_some_and(|h| !h.is_empty()));
        assert!(get("TERM").is_some());
        assert!(get("COLORTERM").is_some());
    }

    #[test]
    fn test_environment_without_credential() {
        let exec = executor(ExecutionConfig::default());
        assert!(
            !exec
                .environment_overrides()
                .iter()
                .any(|(k, _)| k == "GEMINI_API_KEY")
        );
    }

    #[test]
    fn test_redacted_hides_credential() {
        let vars = vec![
            ("GEMINI_API_KEY".to_string(), "key-123".to_string()),
            ("LANG".to_string(), "C.UTF-8".to_string()),
        ];
        assert_eq!(redacted(&vars), vec!["GEMINI_API_KEY=<redacted>", "LANG=C.UTF-8"]);
    }

    #[test]
    fn test_result_from_error() {
        let result = ExecutionResult::from_error(&ExecutionError::Timeout(5));
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, "Command timed out after 5s");
        assert_eq!(result.exit_code, -1);
        assert!(!result.success());
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ExecutionResult {
            stdout: "answer".into(),
            stderr: String::new(),
            exit_code: 0,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "stdout": "answer", "stderr": "", "exitCode": 0 })
        );
    }

    #[test]
    fn test_command_type_strings() {
        assert_eq!(CommandType::Ask.to_string(), "ask");
        assert_eq!(CommandType::Agent.as_str(), "agent");
        assert_eq!(
            serde_json::from_str::<CommandType>("\"agent\"").unwrap(),
            CommandType::Agent
        );
    }
}
