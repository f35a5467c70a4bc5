// gemini-mcp-core/src/shell.rs

//! Shell quoting for shell-invocation mode and `PATH` lookup for the binary.

use crate::errors::ExecutionError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Joins `tokens` into a single string for `sh -c`, quoting every token.
///
/// The result starts with `exec` so the shell replaces itself with the binary
/// and a kill on timeout reaches the real process. Tokens containing a NUL
/// byte cannot be represented and are rejected.
pub fn shell_command_string(tokens: &[String]) -> Result<String, ExecutionError> {
    let joined = shlex::try_join(tokens.iter().map(String::as_str)).map_err(|e| {
        ExecutionError::unexpected(format!("Cannot quote command for the shell: {}", e))
    })?;
    Ok(format!("exec {}", joined))
}

/// Renders `tokens` for log output. Never fails; unquotable tokens are shown as-is.
pub fn display_command(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| shlex::try_quote(t).map(|q| q.into_owned()).unwrap_or_else(|_| t.clone()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves `name` to an executable file.
///
/// Names containing a path separator are checked directly; bare names are
/// searched for in each directory of `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }
    let path_var = std::env::var_os("PATH")?;
    find_in_path(name, &path_var)
}

fn find_in_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
