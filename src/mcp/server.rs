//! MCP server implementation using pmcp (Pragmatic AI's rust-mcp-sdk).
//!
//! This module provides the MCP server implementation using the pmcp crate
//! for proper JSON-RPC handling over stdio and streamable HTTP.

use crate::config::Config;
use crate::content::ContentFetcher;
use crate::mcp::tools::{ToolError, ToolRegistry};
use crate::router::QueryRouter;
use async_trait::async_trait;
use pmcp::{
    server::streamable_http_server::StreamableHttpServer, Error, RequestHandlerExtra, Server,
    ServerCapabilities, ToolHandler, ToolInfo,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// The MCP server for Paperclip
///
/// Exposes the preprint search and retrieval tools over stdio or HTTP.
#[derive(Debug, Clone)]
pub struct McpServer {
    server: Arc<Mutex<Server>>,
}

impl McpServer {
    /// Create a new MCP server over a router and content fetcher
    pub fn new(
        router: Arc<QueryRouter>,
        content: Arc<ContentFetcher>,
        default_limit: usize,
    ) -> Result<Self, pmcp::Error> {
        let tools = ToolRegistry::new(router, content, default_limit);
        let server = Self::build_server_impl(tools)?;
        Ok(Self {
            server: Arc::new(Mutex::new(server)),
        })
    }

    /// Build the registry, router and server from configuration
    pub fn from_config(config: &Config) -> Result<Self, pmcp::Error> {
        let router = QueryRouter::from_config(config)
            .map_err(|e| Error::internal(format!("Failed to build providers: {}", e)))?;
        let content = ContentFetcher::from_config(config)
            .map_err(|e| Error::internal(format!("Failed to build HTTP client: {}", e)))?;

        Self::new(
            Arc::new(router),
            Arc::new(content),
            config.search.default_limit,
        )
    }

    /// Build the MCP server with tool handlers (internal implementation)
    fn build_server_impl(tools: ToolRegistry) -> Result<Server, pmcp::Error> {
        let mut builder = Server::builder()
            .name("paperclip")
            .version(crate::VERSION)
            .capabilities(ServerCapabilities::default());

        for tool in tools.all() {
            let tool_handler = ToolWrapper {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                input_schema: tool.input_schema.clone(),
                handler: tool.handler.clone(),
            };
            builder = builder.tool(tool_handler.name.clone(), tool_handler);
        }

        builder.build()
    }

    /// Run the server in stdio mode
    pub async fn run(&self) -> Result<(), pmcp::Error> {
        tracing::info!("Starting MCP server in stdio mode");

        // run_stdio() takes ownership of the Server
        let server = Arc::try_unwrap(self.server.clone())
            .map_err(|_| Error::internal("Cannot unwrap Arc - multiple references exist"))?
            .into_inner();

        server.run_stdio().await
    }

    /// Run the server over streamable HTTP
    pub async fn run_http(&self, addr: &str) -> Result<(SocketAddr, JoinHandle<()>), pmcp::Error> {
        tracing::info!(addr, "Starting MCP server in HTTP mode");

        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::invalid_params(format!("Invalid address: {}", e)))?;

        let http_server = StreamableHttpServer::new(socket_addr, self.server.clone());
        http_server.start().await
    }
}

/// Wrapper for adapting our tools to pmcp's ToolHandler
#[derive(Clone)]
struct ToolWrapper {
    name: String,
    description: Option<String>,
    input_schema: Value,
    handler: Arc<dyn crate::mcp::tools::ToolHandler>,
}

#[async_trait]
impl ToolHandler for ToolWrapper {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> Result<Value, Error> {
        self.handler.execute(args).await.map_err(|e| match e {
            ToolError::InvalidParams(message) => Error::invalid_params(message),
            ToolError::Failed(message) => {
                tracing::warn!(tool = %self.name, error = %message, "tool call failed");
                Error::internal(&message)
            }
        })
    }

    fn metadata(&self) -> Option<ToolInfo> {
        Some(ToolInfo::new(
            self.name.clone(),
            self.description.clone(),
            self.input_schema.clone(),
        ))
    }
}
