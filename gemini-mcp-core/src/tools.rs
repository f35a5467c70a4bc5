// gemini-mcp-core/src/tools.rs

//! The caller-facing tool set.
//!
//! Each tool maps to one [`CommandRequest`]: a command type, a prompt built from
//! a fixed template plus the caller's optional values, and any extra flags.
//! [`run_tool`] never fails; execution errors come back as a result with exit
//! code `-1` and the error message in `stderr`.

use crate::executor::{CommandExecutor, CommandRequest, CommandType, ExecutionResult};
use tracing::{info, warn};

pub const ASK: &str = "gemini_ask";
pub const YOLO: &str = "gemini_yolo";
pub const GIT_DIFF: &str = "gemini_git_diff";
pub const GIT_COMMIT: &str = "gemini_git_commit";
pub const GIT_PR: &str = "gemini_git_pr";

/// Flag that lets the agent run tools without asking for confirmation.
pub const YOLO_FLAG: &str = "--yolo";

const GIT_DIFF_PROMPT: &str = "Summarize the code changes.";
const GIT_COMMIT_PROMPT: &str =
    "Generate a conventional commit message for the current staged changes and commit them.";
const GIT_PR_PROMPT: &str = "Create a pull request with a conventional commit message.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeminiTool {
    Ask {
        question: String,
    },
    Yolo {
        prompt: String,
    },
    GitDiff {
        diff_args: Option<String>,
    },
    GitCommit {
        branch_name: Option<String>,
    },
    GitPr {
        commit_message: Option<String>,
        branch_name: Option<String>,
        pr_title: Option<String>,
    },
}

impl GeminiTool {
    pub fn name(&self) -> &'static str {
        match self {
            GeminiTool::Ask { .. } => ASK,
            GeminiTool::Yolo { .. } => YOLO,
            GeminiTool::GitDiff { .. } => GIT_DIFF,
            GeminiTool::GitCommit { .. } => GIT_COMMIT,
            GeminiTool::GitPr { .. } => GIT_PR,
        }
    }

    /// Human-readable description used in tool listings.
    pub fn description(name: &str) -> Option<&'static str> {
        match name {
            ASK => Some("Ask a simple question to the Gemini model."),
            YOLO => Some("Run a complex prompt with Gemini Agent in auto-execution (--yolo) mode."),
            GIT_DIFF => Some("Summarize code changes using Gemini AI."),
            GIT_COMMIT => Some(
                "Generate a conventional commit message from staged changes and perform a git commit.",
            ),
            GIT_PR => Some(
                "Automatically commit, push, and create a PR with a conventional commit message.",
            ),
            _ => None,
        }
    }

    pub fn names() -> [&'static str; 5] {
        [ASK, YOLO, GIT_DIFF, GIT_COMMIT, GIT_PR]
    }

    pub fn to_request(&self) -> CommandRequest {
        match self {
            GeminiTool::Ask { question } => CommandRequest::new(CommandType::Ask, question.clone()),
            GeminiTool::Yolo { prompt } => {
                CommandRequest::new(CommandType::Agent, prompt.clone()).with_extra_args([YOLO_FLAG])
            }
            GeminiTool::GitDiff { diff_args } => {
                let mut prompt = GIT_DIFF_PROMPT.to_string();
                if let Some(args) = present(diff_args) {
                    prompt.push_str(&format!(" Use git diff arguments: '{}'.", args));
                }
                CommandRequest::new(CommandType::Ask, prompt)
            }
            GeminiTool::GitCommit { branch_name } => {
                let mut prompt = GIT_COMMIT_PROMPT.to_string();
                if let Some(branch) = present(branch_name) {
                    prompt.push_str(&format!(" Use the branch '{}'.", branch));
                }
                CommandRequest::new(CommandType::Ask, prompt)
            }
            GeminiTool::GitPr {
                commit_message,
                branch_name,
                pr_title,
            } => {
                let mut prompt = GIT_PR_PROMPT.to_string();
                if let Some(message) = present(commit_message) {
                    prompt.push_str(&format!(" Use this commit message: '{}'.", message));
                }
                if let Some(branch) = present(branch_name) {
                    prompt.push_str(&format!(" Use the branch '{}'.", branch));
                }
                if let Some(title) = present(pr_title) {
                    prompt.push_str(&format!(" PR title: '{}'.", title));
                }
                CommandRequest::new(CommandType::Ask, prompt)
            }
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Runs `tool` and always returns a structured result.
pub async fn run_tool(executor: &CommandExecutor, tool: &GeminiTool) -> ExecutionResult {
    let request = tool.to_request();
    info!(tool = tool.name(), command_type = %request.command_type, "Running tool");
    match executor.execute(&request).await {
        Ok(result) => result,
        Err(e) => {
            warn!(tool = tool.name(), error = %e, "Tool execution failed");
            ExecutionResult::from_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionConfig;
    use std::sync::Arc;

    #[test]
    fn test_ask_request() {
        let request = GeminiTool::Ask { question: "What is AI?".into() }.to_request();
        assert_eq!(request, CommandRequest::new(CommandType::Ask, "What is AI?"));
    }

    #[test]
    fn test_yolo_uses_agent_and_flag() {
        let request = GeminiTool::Yolo { prompt: "fix the build".into() }.to_request();
        assert_eq!(request.command_type, CommandType::Agent);
        assert_eq!(request.extra_args, vec!["--yolo"]);
        assert_eq!(request.prompt, "fix the build");
    }

    #[test]
    fn test_git_diff_prompt() {
        let bare = GeminiTool::GitDiff { diff_args: None }.to_request();
        assert_eq!(bare.prompt, "Summarize the code changes.");

        let with_args = GeminiTool::GitDiff { diff_args: Some("HEAD~1".into()) }.to_request();
        assert_eq!(
            with_args.prompt,
            "Summarize the code changes. Use git diff arguments: 'HEAD~1'."
        );
        assert_eq!(with_args.command_type, CommandType::Ask);
    }

    #[test]
    fn test_git_commit_prompt() {
        let request = GeminiTool::GitCommit { branch_name: Some("feature/x".into()) }.to_request();
        assert_eq!(
            request.prompt,
            "Generate a conventional commit message for the current staged changes and commit them. Use the branch 'feature/x'."
        );
    }

    #[test]
    fn test_git_pr_prompt_appends_in_order() {
        let request = GeminiTool::GitPr {
            commit_message: Some("feat: add x".into()),
            branch_name: Some("main".into()),
            pr_title: Some("Add X".into()),
        }
        .to_request();
        assert_eq!(
            request.prompt,
            "Create a pull request with a conventional commit message. Use this commit message: 'feat: add x'. Use the branch 'main'. PR title: 'Add X'."
        );
    }

    #[test]
    fn test_empty_optionals_are_skipped() {
        let request = GeminiTool::GitPr {
            commit_message: Some(String::new()),
            branch_name: None,
            pr_title: Some("T".into()),
        }
        .to_request();
        assert_eq!(
            request.prompt,
            "Create a pull request with a conventional commit message. PR title: 'T'."
        );
    }

    #[test]
    fn test_every_name_has_description() {
        for name in GeminiTool::names() {
            assert!(GeminiTool::description(name).is_some(), "{} has no description", name);
        }
        assert!(GeminiTool::description("nope").is_none());
    }

    #[tokio::test]
    async fn test_run_tool_downgrades_failure() {
        let config = ExecutionConfig {
            binary: "this_binary_should_not_exist_qwertyuiop".into(),
            ..Default::default()
        };
        let executor = CommandExecutor::new(Arc::new(config));
        let result = run_tool(&executor, &GeminiTool::Ask { question: "hi".into() }).await;
        assert_eq!(result.stdout, "");
        assert_eq!(result.exit_code, -1);
        assert!(result.stderr.contains("executable not found"));
    }
}
