// gemini-mcp-core/src/config.rs

//! Runtime configuration for the gemini executor.
//!
//! Everything is read from the process environment once at startup and then
//! shared read-only (usually behind an `Arc`) for the lifetime of the process.

use crate::errors::ConfigError;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_BINARY: &str = "gemini";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub const ENV_BINARY: &str = "GEMINI_BINARY";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_ALL_FILES: &str = "GEMINI_ALL_FILES";
pub const ENV_SANDBOX: &str = "GEMINI_SANDBOX";
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_TIMEOUT: &str = "QUERY_TIMEOUT";
pub const ENV_USE_SHELL: &str = "USE_SHELL";
pub const ENV_PROJECT_ROOT: &str = "PROJECT_ROOT";
pub const ENV_DEBUG: &str = "DEBUG";

#[derive(Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Name or path of the binary to run.
    pub binary: String,
    /// Passed as `--model`; omitted when empty.
    pub model: String,
    pub use_all_files: bool,
    pub use_sandbox: bool,
    /// Injected into the child as `GEMINI_API_KEY`.
    pub credential: Option<String>,
    /// Always positive.
    pub timeout_secs: u64,
    /// Launch through `sh -c` with every token quoted.
    pub invoke_via_shell: bool,
    /// `None` means the current directory of this process.
    pub working_directory: Option<PathBuf>,
    pub debug: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            model: DEFAULT_MODEL.to_string(),
            use_all_files: true,
            use_sandbox: true,
            credential: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            invoke_via_shell: false,
            working_directory: None,
            debug: false,
        }
    }
}

// Keeps the credential out of logs.
impl fmt::Debug for ExecutionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionConfig")
            .field("binary", &self.binary)
            .field("model", &self.model)
            .field("use_all_files", &self.use_all_files)
            .field("use_sandbox", &self.use_sandbox)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("invoke_via_shell", &self.invoke_via_shell)
            .field("working_directory", &self.working_directory)
            .field("debug", &self.debug)
            .finish()
    }
}

impl ExecutionConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration using `lookup` to resolve variable names.
    ///
    /// Missing or unrecognized values fall back to defaults. The timeout is the
    /// exception: a value that is present but not a positive integer is an error,
    /// since every later execution depends on it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str, default: bool| match lookup(key) {
            Some(v) => v.trim().eq_ignore_ascii_case("true"),
            None => default,
        };

        let timeout_secs = match non_empty(ENV_TIMEOUT) {
            Some(raw) => parse_timeout(&raw)?,
            None => defaults.timeout_secs,
        };

        let config = Self {
            binary: non_empty(ENV_BINARY).unwrap_or(defaults.binary),
            // An explicitly empty model disables the --model flag.
            model: lookup(ENV_MODEL).unwrap_or(defaults.model),
            use_all_files: flag(ENV_ALL_FILES, defaults.use_all_files),
            use_sandbox: flag(ENV_SANDBOX, defaults.use_sandbox),
            credential: non_empty(ENV_API_KEY),
            timeout_secs,
            invoke_via_shell: flag(ENV_USE_SHELL, defaults.invoke_via_shell),
            working_directory: non_empty(ENV_PROJECT_ROOT).map(PathBuf::from),
            debug: flag(ENV_DEBUG, defaults.debug),
        };
        tracing::debug!(config = ?config, "Loaded execution configuration.");
        Ok(config)
    }

    /// Returns a copy with debug mode forced on or off.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

fn parse_timeout(raw: &str) -> Result<u64, ConfigError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidInteger {
            var: ENV_TIMEOUT,
            value: raw.to_string(),
        })?;
    if value <= 0 {
        return Err(ConfigError::NonPositiveTimeout {
            var: ENV_TIMEOUT,
            value,
        });
    }
    Ok(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ExecutionConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ExecutionConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.binary, "gemini");
        assert_eq!(config.model, "gemini-2.5-flash");
        assert!(config.use_all_files);
        assert!(config.use_sandbox);
        assert_eq!(config.credential, None);
        assert_eq!(config.timeout_secs, 300);
        assert!(!config.invoke_via_shell);
        assert_eq!(config.working_directory, None);
        assert!(!config.debug);
    }

    #[test]
    fn test_booleans_are_case_insensitive() {
        let config = load(&[
            (ENV_ALL_FILES, "FALSE"),
            (ENV_SANDBOX, "no"),
            (ENV_USE_SHELL, "True"),
            (ENV_DEBUG, " TRUE "),
        ])
        .unwrap();
        assert!(!config.use_all_files);
        assert!(!config.use_sandbox);
        assert!(config.invoke_via_shell);
        assert!(config.debug);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            (ENV_BINARY, "/opt/bin/gemini"),
            (ENV_MODEL, "gemini-2.5-pro"),
            (ENV_API_KEY, "secret"),
            (ENV_TIMEOUT, "45"),
            (ENV_PROJECT_ROOT, "/work/repo"),
        ])
        .unwrap();
        assert_eq!(config.binary, "/opt/bin/gemini");
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.credential.as_deref(), Some("secret"));
        assert_eq!(config.timeout_secs, 45);
        assert_eq!(config.working_directory, Some(PathBuf::from("/work/repo")));
    }

    #[test]
    fn test_empty_optionals_are_absent() {
        let config = load(&[(ENV_API_KEY, ""), (ENV_PROJECT_ROOT, "  ")]).unwrap();
        assert_eq!(config.credential, None);
        assert_eq!(config.working_directory, None);
    }

    #[test]
    fn test_malformed_timeout_is_an_error() {
        let err = load(&[(ENV_TIMEOUT, "five minutes")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInteger { .. }));
        assert!(err.to_string().contains("QUERY_TIMEOUT"));
    }

    #[test]
    fn test_non_positive_timeout_is_an_error() {
        assert_eq!(
            load(&[(ENV_TIMEOUT, "0")]).unwrap_err(),
            ConfigError::NonPositiveTimeout { var: ENV_TIMEOUT, value: 0 }
        );
        assert!(load(&[(ENV_TIMEOUT, "-3")]).is_err());
    }

    #[test]
    fn test_debug_output_redacts_credential() {
        let config = ExecutionConfig {
            credential: Some("super-secret-key".into()),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-key"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_with_debug_forces_flag() {
        let config = load(&[(ENV_DEBUG, "false")]).unwrap().with_debug(true);
        assert!(config.debug);
    }
}
