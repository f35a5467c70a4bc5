// gemini-mcp-core/src/output.rs

//! Removes known noise lines from gemini's stdout.

const CACHED_CREDENTIALS_NOTICE: &str = "Loaded cached credentials.";
const DEBUG_TAG: &str = "[DEBUG]";
const CLEARCUT_FLUSH_NOTICE: &str = "Flushing log events to Clearcut.";

fn is_noise(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed == CACHED_CREDENTIALS_NOTICE
        || trimmed.starts_with(DEBUG_TAG)
        || line.contains(CLEARCUT_FLUSH_NOTICE)
}

/// Drops startup notices, `[DEBUG]` lines and telemetry flush notices,
/// then trims the result. Order of the surviving lines is kept.
pub fn normalize(raw: &str) -> String {
    raw.lines()
        .filter(|line| !is_noise(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
