// gemini-mcp-server/src/cli.rs
use clap::{ArgAction, Parser};

/// gemini-cli-mcp: exposes the gemini CLI as MCP tools over stdio.
///
/// Settings are read from the environment (GEMINI_MODEL, GEMINI_ALL_FILES,
/// GEMINI_SANDBOX, GEMINI_API_KEY, QUERY_TIMEOUT, USE_SHELL, PROJECT_ROOT,
/// DEBUG) and from a `.env` file in the current directory.
#[derive(Parser, Debug)]
#[command(author, about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    /// Enable debug mode (same as DEBUG=true).
    ///
    /// Specify multiple times for more verbose output:
    ///  -v:   DEBUG level, log file enabled
    ///  -vvv: TRACE level
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Show version information for this server and the gemini binary.
    #[arg(short = 'V', long)]
    pub version: bool,
}
