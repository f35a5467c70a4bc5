// gemini-mcp-server/src/server.rs
use gemini_mcp_core::tools::{ASK, GIT_COMMIT, GIT_DIFF, GIT_PR, YOLO};
use gemini_mcp_core::{CommandExecutor, ExecutionResult, GeminiTool, run_tool};
use rmcp::{Error as McpError, model::*, service::*};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub const SERVER_NAME: &str = "gemini-cli-mcp";

fn create_schema_object(
    properties: Vec<(&str, Value)>,
    required: Vec<&str>,
) -> Arc<Map<String, Value>> {
    let props_map: Map<String, Value> = properties
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    let req_vec: Vec<Value> = required
        .into_iter()
        .map(|s| Value::String(s.to_string()))
        .collect();

    let schema = json!({
        "type": "object",
        "properties": props_map,
        "required": req_vec
    });
    let map = match schema {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Arc::new(map)
}

fn string_property(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn tool_definitions() -> HashMap<String, Tool> {
    let schemas = [
        (
            ASK,
            create_schema_object(
                vec![("question", string_property("The question to ask."))],
                vec!["question"],
            ),
        ),
        (
            YOLO,
            create_schema_object(
                vec![("prompt", string_property("The task for the agent to carry out."))],
                vec!["prompt"],
            ),
        ),
        (
            GIT_DIFF,
            create_schema_object(
                vec![(
                    "diff_args",
                    string_property("Optional git diff arguments, e.g. 'HEAD~1' or '--staged'."),
                )],
                vec![],
            ),
        ),
        (
            GIT_COMMIT,
            create_schema_object(
                vec![("branch_name", string_property("Optional branch to commit on."))],
                vec![],
            ),
        ),
        (
            GIT_PR,
            create_schema_object(
                vec![
                    ("commit_message", string_property("Optional commit message to use.")),
                    ("branch_name", string_property("Optional branch for the pull request.")),
                    ("pr_title", string_property("Optional pull request title.")),
                ],
                vec![],
            ),
        ),
    ];

    schemas
        .into_iter()
        .map(|(name, input_schema)| {
            let tool = Tool {
                name: name.into(),
                description: GeminiTool::description(name).unwrap_or_default().into(),
                input_schema,
            };
            (name.to_string(), tool)
        })
        .collect()
}

#[derive(Deserialize)]
struct AskArgs {
    question: String,
}

#[derive(Deserialize)]
struct YoloArgs {
    prompt: String,
}

#[derive(Deserialize)]
struct GitDiffArgs {
    diff_args: Option<String>,
}

#[derive(Deserialize)]
struct GitCommitArgs {
    branch_name: Option<String>,
}

#[derive(Deserialize)]
struct GitPrArgs {
    commit_message: Option<String>,
    branch_name: Option<String>,
    pr_title: Option<String>,
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: Map<String, Value>) -> Result<T, McpError> {
    serde_json::from_value(Value::Object(args)).map_err(|e| {
        McpError::invalid_params(format!("Invalid arguments for '{}': {}", tool, e), None)
    })
}

fn required(field: &str, value: String) -> Result<String, McpError> {
    if value.trim().is_empty() {
        return Err(McpError::invalid_params(
            format!("Argument '{}' must not be empty", field),
            None,
        ));
    }
    Ok(value)
}

/// Validates a tool call at the protocol boundary.
pub(crate) fn parse_tool(name: &str, args: Map<String, Value>) -> Result<GeminiTool, McpError> {
    let tool = match name {
        ASK => {
            let a: AskArgs = parse_args(name, args)?;
            GeminiTool::Ask { question: required("question", a.question)? }
        }
        YOLO => {
            let a: YoloArgs = parse_args(name, args)?;
            GeminiTool::Yolo { prompt: required("prompt", a.prompt)? }
        }
        GIT_DIFF => {
            let a: GitDiffArgs = parse_args(name, args)?;
            GeminiTool::GitDiff { diff_args: a.diff_args }
        }
        GIT_COMMIT => {
            let a: GitCommitArgs = parse_args(name, args)?;
            GeminiTool::GitCommit { branch_name: a.branch_name }
        }
        GIT_PR => {
            let a: GitPrArgs = parse_args(name, args)?;
            GeminiTool::GitPr {
                commit_message: a.commit_message,
                branch_name: a.branch_name,
                pr_title: a.pr_title,
            }
        }
        _ => return Err(McpError::method_not_found::<CallToolRequestMethod>()),
    };
    Ok(tool)
}

fn to_call_result(result: &ExecutionResult) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string(result).map_err(|e| {
        McpError::internal_error(format!("Failed to serialize tool result: {}", e), None)
    })?;
    let annotated = Annotated {
        raw: RawContent::Text(RawTextContent { text }),
        annotations: None,
    };
    Ok(CallToolResult {
        content: vec![annotated],
        is_error: Some(!result.success()),
    })
}

#[derive(Debug, Clone)]
pub struct GeminiServer {
    peer: Arc<Mutex<Option<Peer<RoleServer>>>>,
    tools: Arc<HashMap<String, Tool>>,
    executor: CommandExecutor,
}

impl GeminiServer {
    pub fn new(executor: CommandExecutor) -> Self {
        Self {
            peer: Arc::new(Mutex::new(None)),
            tools: Arc::new(tool_definitions()),
            executor,
        }
    }

    async fn call_tool(&self, name: &str, args: Map<String, Value>) -> Result<CallToolResult, McpError> {
        let tool = parse_tool(name, args)?;
        debug!(tool = name, "Dispatching tool call");
        let result = run_tool(&self.executor, &tool).await;
        info!(tool = name, exit_code = result.exit_code, "Tool call finished");
        to_call_result(&result)
    }

    fn handle_tool_call(
        &self,
        params: CallToolRequestParam,
    ) -> Pin<Box<dyn Future<Output = Result<CallToolResult, McpError>> + Send + '_>> {
        let name = params.name;
        let args_map = params.arguments.unwrap_or_default();
        Box::pin(async move { self.call_tool(name.as_ref(), args_map).await })
    }
}

impl Service<RoleServer> for GeminiServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                ..Default::default()
            },
            server_info: Implementation {
                name: SERVER_NAME.into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
            instructions: Some(
                "Tools that run the gemini CLI. Each returns JSON with stdout, stderr and exitCode."
                    .into(),
            ),
        }
    }

    fn get_peer(&self) -> Option<Peer<RoleServer>> {
        self.peer.lock().ok().and_then(|p| p.clone())
    }

    fn set_peer(&mut self, peer: Peer<RoleServer>) {
        if let Ok(mut slot) = self.peer.lock() {
            *slot = Some(peer);
        }
    }

    #[allow(refining_impl_trait)]
    fn handle_request(
        &self,
        request: ClientRequest,
        _context: RequestContext<RoleServer>,
    ) -> Pin<Box<dyn Future<Output = Result<ServerResult, McpError>> + Send + '_>> {
        let self_clone = self.clone();
        Box::pin(async move {
            match request {
                ClientRequest::ListToolsRequest(Request { .. }) => {
                    let mut tools: Vec<Tool> = self_clone.tools.values().cloned().collect();
                    tools.sort_by(|a, b| a.name.cmp(&b.name));
                    Ok(ServerResult::ListToolsResult(ListToolsResult {
                        tools,
                        next_cursor: None,
                    }))
                }
                ClientRequest::CallToolRequest(Request { params, .. }) => self_clone
                    .handle_tool_call(params)
                    .await
                    .map(ServerResult::CallToolResult),
                _ => Err(McpError::method_not_found::<InitializeResultMethod>()),
            }
        })
    }

    #[allow(refining_impl_trait)]
    fn handle_notification(
        &self,
        _notification: ClientNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), McpError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}
