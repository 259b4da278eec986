//! MCP (Model Context Protocol) server exposing jq queries over the data directory.
//!
//! ## Tools
//!
//! - `run_jq`: run a jq filter over files selected by paths or globs
//! - `list_data_files`: the registry manifest as pretty JSON
//!
//! Prompts come from the `prompts` section of the settings. After every
//! rescan connected clients receive `notifications/resources/list_changed`
//! through the [`notifications::NotificationBroadcaster`].
//!
//! ## Transports
//!
//! 1. **stdio**: a single session, see [`serve_stdio`]
//! 2. **HTTP**: streamable HTTP with one server instance per session, see
//!    [`http_server::serve_http`]

pub mod auth;
pub mod http_server;
pub mod notifications;

use std::sync::Arc;

use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ErrorData as McpError, *},
    schemars,
    service::{Peer, RequestContext, RoleServer},
    tool, tool_handler, tool_router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::{PromptConfig, Settings};
use crate::query::{JaqEngine, QueryEngine, run_query, split_patterns};
use crate::registry::FileRegistry;

const DEFAULT_INSTRUCTIONS: &str = "This server runs jq filters over the JSON files in its data \
    directory. Call 'list_data_files' to discover files and suggested patterns, then 'run_jq' \
    to query them. When files change the server sends 'notifications/resources/list_changed'.";

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct RunJqRequest {
    /// The jq filter to execute. Use the 'inputs' function for multi-file queries.
    pub jq_filter: String,
    /// Space-separated file paths (relative to the data directory) or glob patterns.
    pub json_file_path: String,
}

#[derive(Debug, Default, Deserialize, Serialize, schemars::JsonSchema)]
pub struct ListDataFilesRequest {}

#[derive(Clone)]
pub struct JqServer {
    registry: Arc<FileRegistry>,
    settings: Arc<Settings>,
    engine: Arc<dyn QueryEngine>,
    tool_router: ToolRouter<Self>,
    peer: Arc<Mutex<Option<Peer<RoleServer>>>>,
}

#[tool_router]
impl JqServer {
    pub fn new(registry: Arc<FileRegistry>, settings: Arc<Settings>) -> Self {
        Self::with_engine(registry, settings, Arc::new(JaqEngine::new()))
    }

    /// Create a server with a custom query engine.
    pub fn with_engine(
        registry: Arc<FileRegistry>,
        settings: Arc<Settings>,
        engine: Arc<dyn QueryEngine>,
    ) -> Self {
        Self {
            registry,
            settings,
            engine,
            tool_router: Self::tool_router(),
            peer: Arc::new(Mutex::new(None)),
        }
    }

    #[tool(
        description = "Queries JSON data using jq syntax. Supports single files, multiple files, and glob patterns.

FILE SELECTION (relative to data directory):
- Single file: \"file.json\"
- Multiple files: \"file1.json file2.json\"
- Glob patterns: \"subdir/*.json\"
- Mixed: \"schema.json segments/*.json\"

JQ FILTER EXAMPLES:
- Extract field: '.name' or '.users[0].email'
- Filter: '.users[] | select(.age > 30)'
- Multi-file collection: '[inputs]'
- Multi-file processing: 'inputs | .name'

TIP: Use 'list_data_files' first to discover available files."
    )]
    pub async fn run_jq(
        &self,
        Parameters(RunJqRequest {
            jq_filter,
            json_file_path,
        }): Parameters<RunJqRequest>,
    ) -> Result<CallToolResult, McpError> {
        let patterns = split_patterns(&json_file_path);
        if patterns.is_empty() {
            return Ok(CallToolResult::error(vec![Content::text(
                "json_file_path cannot be empty",
            )]));
        }

        let engine = Arc::clone(&self.engine);
        let root = self.registry.root().to_path_buf();
        let outcome = tokio::task::spawn_blocking(move || {
            run_query(engine.as_ref(), &jq_filter, &patterns, &root)
        })
        .await;

        match outcome {
            Ok(Ok(output)) => Ok(CallToolResult::success(vec![Content::text(output)])),
            Ok(Err(e)) => {
                crate::debug_event!("mcp", "run_jq failed", "{e}");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Query task failed: {e}"
            ))])),
        }
    }

    #[tool(
        description = "Lists all available JSON data files with metadata.

Returns file paths (relative to data directory), modification times, sizes, and suggested query patterns.

When files change, clients receive 'notifications/resources/list_changed'. Call this tool again for updated information."
    )]
    pub async fn list_data_files(
        &self,
        Parameters(_): Parameters<ListDataFilesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let manifest = self.registry.get_manifest();
        match serde_json::to_string_pretty(&manifest) {
            Ok(output) => Ok(CallToolResult::success(vec![Content::text(output)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Error formatting manifest: {e}"
            ))])),
        }
    }
}

impl JqServer {
    fn find_prompt(&self, name: &str) -> Option<&PromptConfig> {
        self.settings.prompts.iter().find(|p| p.name == name)
    }

    fn prompt_descriptors(&self) -> Vec<Prompt> {
        self.settings
            .prompts
            .iter()
            .map(|p| {
                let arguments: Vec<PromptArgument> = p
                    .arguments
                    .iter()
                    .map(|arg| {
                        PromptArgument::new(arg.name.clone())
                            .with_description(arg.description.clone())
                            .with_required(arg.required)
                    })
                    .collect();
                Prompt::new(
                    p.name.clone(),
                    Some(p.description.clone()),
                    (!arguments.is_empty()).then_some(arguments),
                )
            })
            .collect()
    }
}

/// Text of the single assistant message a prompt expands to.
///
/// Arguments are listed in key order so the output is stable.
pub fn prompt_text(description: &str, arguments: Option<&JsonObject>) -> String {
    let mut text = format!(
        "Prompt: {description}\n\nUse list_data_files to discover available files, then run_jq to query them."
    );

    if let Some(arguments) = arguments.filter(|args| !args.is_empty()) {
        text.push_str("\n\nProvided arguments:");
        let mut keys: Vec<&String> = arguments.keys().collect();
        keys.sort();
        for key in keys {
            let value = match &arguments[key] {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            text.push_str(&format!("\n- {key}: {value}"));
        }
    }

    text
}

#[tool_handler]
impl ServerHandler for JqServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = self
            .settings
            .instructions
            .clone()
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string());

        ServerInfo::new(
            ServerCapabilities::builder()
                .enable_prompts()
                .enable_tools()
                .build(),
        )
        .with_protocol_version(ProtocolVersion::V_2024_11_05)
        .with_server_info(
            Implementation::new("jqdex", env!("CARGO_PKG_VERSION"))
                .with_title("jqdex JSON query server"),
        )
        .with_instructions(instructions)
    }

    async fn initialize(
        &self,
        request: InitializeRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, McpError> {
        if context.peer.peer_info().is_none() {
            context.peer.set_peer_info(request);
        }

        // Needed for list_changed notifications
        let mut peer_guard = self.peer.lock().await;
        *peer_guard = Some(context.peer.clone());

        Ok(self.get_info())
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult::with_all_items(self.prompt_descriptors()))
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        let Some(prompt) = self.find_prompt(&request.name) else {
            return Err(McpError::invalid_params(
                format!("Unknown prompt: {}", request.name),
                None,
            ));
        };

        let text = prompt_text(&prompt.description, request.arguments.as_ref());
        Ok(GetPromptResult::new(vec![PromptMessage::new_text(
            PromptMessageRole::Assistant,
            text,
        )])
        .with_description(prompt.description.clone()))
    }
}

/// Serve a single MCP session over stdin/stdout until the client disconnects.
pub async fn serve_stdio(
    server: JqServer,
    broadcaster: Option<Arc<notifications::NotificationBroadcaster>>,
) -> anyhow::Result<()> {
    use rmcp::{ServiceExt, transport::stdio};

    if let Some(broadcaster) = broadcaster {
        let receiver = broadcaster.subscribe();
        let listener = server.clone();
        tokio::spawn(async move {
            listener.start_notification_listener(receiver).await;
        });
    }

    let service = server
        .serve(stdio())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start MCP server: {e}"))?;

    service
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;

    Ok(())
}
