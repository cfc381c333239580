use crate::client::RagClient;
use crate::error::RagError;
use crate::types::*;

use anyhow::{Context, Result};
use rmcp::{
    ErrorData as McpError, Peer, RoleServer, ServerHandler, ServiceExt,
    handler::server::{router::prompt::PromptRouter, tool::ToolRouter, wrapper::Parameters},
    model::*,
    prompt, prompt_handler, prompt_router,
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct RagMcpServer {
    client: Arc<RagClient>,
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
}

impl RagMcpServer {
    /// Create a new RAG MCP server with default configuration
    pub async fn new() -> Result<Self> {
        let client = RagClient::new().await?;
        Self::with_client(Arc::new(client))
    }

    /// Create a new RAG MCP server with an existing client
    pub fn with_client(client: Arc<RagClient>) -> Result<Self> {
        Ok(Self {
            client,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &RagClient {
        &self.client
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Serialization failed: {}", e))
}

/// Tool error text; failures that are not the caller's fault are also logged
fn tool_error(tool: &str, err: RagError) -> String {
    if err.is_user_error() {
        tracing::debug!("{} rejected: {}", tool, err);
    } else {
        tracing::error!("{} failed: {:#}", tool, err);
    }
    err.to_user_string()
}

#[tool_router(router = tool_router)]
impl RagMcpServer {
    #[tool(
        description = "Build a new named index from PDF, TXT, CSV and JSON files (directories are expanded). Fails if an index with that name already exists. Reports progress per embedded chunk."
    )]
    async fn create_index(
        &self,
        meta: Meta,
        peer: Peer<RoleServer>,
        Parameters(req): Parameters<CreateIndexRequest>,
    ) -> Result<String, String> {
        req.validate().map_err(|e| tool_error("create_index", e))?;

        let progress_token = meta.get_progress_token();

        let (handle, mut progress) = self.client.spawn_create(req);

        while let Some(state) = progress.recv().await {
            if let Some(token) = &progress_token {
                let _ = peer
                    .notify_progress(ProgressNotificationParam {
                        progress_token: token.clone(),
                        progress: state.fraction() * 100.0,
                        total: Some(100.0),
                        message: Some(state.to_string()),
                    })
                    .await;
            }
        }

        let response = handle
            .await
            .map_err(|e| format!("Index build task failed: {}", e))?
            .map_err(|e| tool_error("create_index", e))?;

        to_json(&response)
    }

    #[tool(description = "List the names of all existing indexes")]
    async fn list_indexes(
        &self,
        Parameters(_req): Parameters<ListIndexesRequest>,
    ) -> Result<String, String> {
        let response = self
            .client
            .list_indexes()
            .map_err(|e| tool_error("list_indexes", e))?;

        to_json(&response)
    }

    #[tool(description = "Show the files an index was built from and its build settings")]
    async fn index_info(
        &self,
        Parameters(req): Parameters<IndexNameRequest>,
    ) -> Result<String, String> {
        req.validate().map_err(|e| tool_error("index_info", e))?;

        let response = self
            .client
            .index_info(&req.name)
            .map_err(|e| tool_error("index_info", e))?;

        to_json(&response)
    }

    #[tool(description = "Delete an index and everything stored for it")]
    async fn delete_index(
        &self,
        Parameters(req): Parameters<IndexNameRequest>,
    ) -> Result<String, String> {
        req.validate().map_err(|e| tool_error("delete_index", e))?;

        let response = self
            .client
            .delete_index(&req.name)
            .await
            .map_err(|e| tool_error("delete_index", e))?;

        to_json(&response)
    }

    #[tool(
        description = "Answer a question using the most similar chunks of an index as context. Returns the answer and the cited chunks."
    )]
    async fn ask(&self, Parameters(req): Parameters<AskRequest>) -> Result<String, String> {
        req.validate().map_err(|e| tool_error("ask", e))?;

        let response = self
            .client
            .ask(req)
            .await
            .map_err(|e| tool_error("ask", e))?;

        to_json(&response)
    }
}

// Prompts for slash commands
#[prompt_router]
impl RagMcpServer {
    #[prompt(
        name = "create",
        description = "Build a new index from a list of documents"
    )]
    async fn create_prompt(
        &self,
        Parameters(args): Parameters<serde_json::Value>,
    ) -> Result<GetPromptResult, McpError> {
        let name = args.get("name").and_then(|v| v.as_str()).unwrap_or("docs");
        let paths = args.get("paths").and_then(|v| v.as_str()).unwrap_or(".");

        let messages = vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Please create an index named '{}' from these files: {}",
                name, paths
            ),
        )];

        Ok(GetPromptResult {
            description: Some(format!("Create index '{}'", name)),
            messages,
        })
    }

    #[prompt(name = "ask", description = "Ask a question about an index")]
    async fn ask_prompt(
        &self,
        Parameters(args): Parameters<serde_json::Value>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let index = args.get("index").and_then(|v| v.as_str()).unwrap_or("");
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");

        Ok(vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!("Using the index '{}', answer: {}", index, query),
        )])
    }

    #[prompt(name = "list", description = "List the available indexes")]
    async fn list_prompt(&self) -> Vec<PromptMessage> {
        vec![PromptMessage::new_text(
            PromptMessageRole::User,
            "Please list the available indexes.",
        )]
    }
}

#[tool_handler(router = self.tool_router)]
#[prompt_handler]
impl ServerHandler for RagMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: "ragabond".into(),
                title: Some("Ragabond - Question Answering over Local Documents".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Question answering over local documents. \
                Use create_index to embed a set of files under a name, \
                ask to answer questions from an index, and list_indexes, index_info \
                and delete_index to manage indexes."
                    .into(),
            ),
        }
    }
}

impl RagMcpServer {
    /// Serve MCP over stdio using the default configuration
    pub async fn serve_stdio() -> Result<()> {
        let server = Self::new().await.context("Failed to create MCP server")?;
        server.run_stdio().await
    }

    /// Serve MCP over stdio until the client disconnects
    pub async fn run_stdio(self) -> Result<()> {
        tracing::info!("Starting RAG MCP server");

        let transport = rmcp::transport::io::stdio();

        self.serve(transport).await?.waiting().await?;

        Ok(())
    }
}
