// gemini-mcp-core/src/errors.rs
use thiserror::Error;

/// Errors that can occur while running the gemini binary.
///
/// A non-zero exit from the binary is not an error; it is carried inside a
/// normal [`ExecutionResult`](crate::executor::ExecutionResult).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The binary could not be located on `PATH`.
    #[error(
        "{0} executable not found in PATH. Please ensure gemini-cli is installed and in your system's PATH."
    )]
    ExecutableNotFound(String),

    /// The child exceeded its wall-clock budget and was killed.
    #[error("Command timed out after {0}s")]
    Timeout(u64),

    /// Any other launch or runtime fault.
    #[error("An unexpected error occurred: {0}")]
    UnexpectedFailure(String),
}

impl ExecutionError {
    pub fn unexpected(msg: impl Into<String>) -> Self {
        ExecutionError::UnexpectedFailure(msg.into())
    }
}

/// Errors raised while loading configuration at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}' is not a valid integer")]
    InvalidInteger { var: &'static str, value: String },

    #[error("Invalid value for {var}: timeout must be a positive number of seconds, got {value}")]
    NonPositiveTimeout { var: &'static str, value: i64 },
}
