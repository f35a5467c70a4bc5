// gemini-mcp-core/src/lib.rs

//! Runs the `gemini` command-line assistant as a subprocess and returns its
//! normalized output.
//!
//! The pieces, bottom-up:
//! - [`config`]: environment-driven [`ExecutionConfig`], loaded once at startup.
//! - [`output`]: the noise-line filter applied to stdout.
//! - [`shell`]: per-token quoting for shell mode and `PATH` lookup.
//! - [`executor`]: [`CommandExecutor`], one bounded child process per request.
//! - [`diagnostics`]: hooks run around each execution.
//! - [`tools`]: the five caller-facing tools and their prompt templates.

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod executor;
pub mod output;
pub mod shell;
pub mod tools;


pub use config::ExecutionConfig;
pub use diagnostics::{DiagnosticsHook, NoopHook, ProcessSnapshotHook};
pub use errors::{ConfigError, ExecutionError};
pub use executor::{CommandExecutor, CommandRequest, CommandType, ExecutionResult};
pub use output::normalize;
pub use tools::{GeminiTool, run_tool};
