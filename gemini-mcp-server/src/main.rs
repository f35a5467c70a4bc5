// gemini-mcp-server/src/main.rs
mod cli;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use gemini_mcp_core::{CommandExecutor, ExecutionConfig, ProcessSnapshotHook};
use rmcp::{service::*, transport::io};
use std::env;
use std::fs;
use std::io as std_io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use time::macros::format_description;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::server::{GeminiServer, SERVER_NAME};

const LOG_FILE_PREFIX: &str = "gemini-cli-mcp.log";

fn log_level(verbose: u8, debug: bool) -> Level {
    match verbose {
        v if v >= 3 => Level::TRACE,
        _ if debug => Level::DEBUG,
        _ => Level::WARN,
    }
}

fn log_dir() -> PathBuf {
    dirs::cache_dir()
        .or_else(dirs::runtime_dir)
        .unwrap_or_else(env::temp_dir)
        .join(SERVER_NAME)
}

/// Logs go to stderr (stdout carries the protocol). In debug mode a daily
/// rolling file is written as well; the returned guard must stay alive.
fn init_logging(level: Level, debug: bool) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ));

    let stderr_layer = fmt::layer()
        .with_writer(std_io::stderr)
        .with_ansi(false)
        .with_timer(timer.clone())
        .with_target(false)
        .with_level(true);

    let (file_layer, guard) = if debug {
        let dir = log_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_timer(timer)
            .with_target(true)
            .with_line_number(true);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(guard)
}

fn print_version(binary: &str) {
    println!("{} version: {}", SERVER_NAME, env!("CARGO_PKG_VERSION"));
    let output = duct::cmd!(binary, "--version")
        .stdout_capture()
        .stderr_null()
        .unchecked()
        .run();
    if let Ok(output) = output {
        let version = String::from_utf8_lossy(&output.stdout);
        if output.status.success() && !version.trim().is_empty() {
            println!("gemini version: {}", version.trim());
        }
    }
}

async fn serve(config: ExecutionConfig) -> Result<()> {
    let debug_mode = config.debug;
    let mut executor = CommandExecutor::new(Arc::new(config));
    if debug_mode {
        executor = executor.with_hook(Arc::new(ProcessSnapshotHook::default()));
    }
    if let Err(e) = executor.verify_executable_available() {
        // Not fatal: each tool call reports it to the client.
        error!("{}", e);
    }

    let server = GeminiServer::new(executor);
    let transport = io::stdio();
    let ct = CancellationToken::new();

    info!("Starting {} MCP server in STDIO mode...", SERVER_NAME);
    let running = server
        .serve_with_ct(transport, ct.clone())
        .await
        .context("Failed to start MCP server")?;

    tokio::select! {
        quit = running.waiting() => {
            let reason = quit.context("MCP server task failed")?;
            debug!(?reason, "Server loop ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down.");
            ct.cancel();
        }
    }

    info!("{} MCP server stopped.", SERVER_NAME);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = cli::Cli::parse();

    let config_result = ExecutionConfig::from_env();

    if cli.version {
        let binary = config_result
            .as_ref()
            .map(|c| c.binary.clone())
            .unwrap_or_else(|_| gemini_mcp_core::config::DEFAULT_BINARY.to_string());
        print_version(&binary);
        return ExitCode::SUCCESS;
    }

    // --verbose forces debug mode regardless of DEBUG.
    let debug_mode = cli.verbose > 0 || config_result.as_ref().is_ok_and(|c| c.debug);
    let _guard = match init_logging(log_level(cli.verbose, debug_mode), debug_mode) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = match config_result {
        Ok(config) => config.with_debug(debug_mode),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(config = ?config, "Configuration loaded.");

    match serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0, false), Level::WARN);
        assert_eq!(log_level(0, true), Level::DEBUG);
        assert_eq!(log_level(1, true), Level::DEBUG);
        assert_eq!(log_level(3, true), Level::TRACE);
    }

    #[test]
    fn test_log_dir_is_namespaced() {
        assert!(log_dir().ends_with(SERVER_NAME));
    }
}
