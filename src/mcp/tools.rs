//! Tool registry for MCP tools.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::handlers::{
    GetPaperContentByUrlHandler, GetPaperHandler, GetPaperMetadataHandler, ListProvidersHandler,
    SearchPapersHandler,
};
use crate::content::{ContentError, ContentFetcher};
use crate::router::{QueryRouter, RouterError};

/// An MCP tool that can be called by the client
#[derive(Clone)]
pub struct Tool {
    /// Tool name (e.g., "search_papers")
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON Schema for input parameters
    pub input_schema: Value,

    /// Handler function to execute the tool
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Failure of a tool call, split by who is at fault
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The arguments were rejected; reported as `invalid_params`
    #[error("{0}")]
    InvalidParams(String),

    /// The call was valid but could not be completed
    #[error("{0}")]
    Failed(String),
}

impl From<RouterError> for ToolError {
    fn from(err: RouterError) -> Self {
        if err.is_validation() {
            ToolError::InvalidParams(err.to_string())
        } else {
            ToolError::Failed(err.to_string())
        }
    }
}

impl From<ContentError> for ToolError {
    fn from(err: ContentError) -> Self {
        if err.is_invalid_input() {
            ToolError::InvalidParams(err.to_string())
        } else {
            ToolError::Failed(err.to_string())
        }
    }
}

/// Handler for executing a tool
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + std::fmt::Debug {
    /// Execute the tool with the given arguments
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// Registry for all MCP tools
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    /// Create the registry with every paperclip tool
    pub fn new(router: Arc<QueryRouter>, content: Arc<ContentFetcher>, default_limit: usize) -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };

        registry.register(Tool {
            name: "list_providers".to_string(),
            description: "List the available preprint providers, including the community \
                          preprint servers hosted on OSF (e.g. psyarxiv, socarxiv)."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            handler: Arc::new(ListProvidersHandler {
                router: router.clone(),
            }),
        });

        registry.register(Tool {
            name: "search_papers".to_string(),
            description: format!(
                "Search for preprints across {} providers. Results are grouped by provider; \
                 providers that fail are listed under 'failures'.",
                router.registry().len()
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "keywords": {
                        "type": "string",
                        "description": "Search keywords. Empty returns the most recent preprints."
                    },
                    "providers": {
                        "type": "array",
                        "items": { "type": "string", "enum": ["arxiv", "openalex", "osf"] },
                        "description": "Providers to search. If not specified, searches all providers."
                    },
                    "provider": {
                        "type": "string",
                        "description": "A single provider, or an OSF preprint server id such as 'psyarxiv' (see list_providers)"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results per provider (1-100)",
                        "default": default_limit
                    },
                    "offset": {
                        "type": "integer",
                        "description": "Number of results to skip per provider",
                        "default": 0
                    },
                    "subjects": {
                        "type": "string",
                        "description": "Subject filter (arXiv category such as 'cs.LG', OpenAlex concept or OSF subject)"
                    },
                    "published_since": {
                        "type": "string",
                        "description": "Only papers published on or after this date (YYYY-MM-DD)"
                    },
                    "dedup": {
                        "type": "boolean",
                        "description": "Drop papers that duplicate an earlier result (same DOI or title)",
                        "default": false
                    }
                }
            }),
            handler: Arc::new(SearchPapersHandler {
                router: router.clone(),
                default_limit,
            }),
        });

        registry.register(Tool {
            name: "get_paper_metadata_by_id".to_string(),
            description: "Get metadata for a specific paper. The provider is detected from the \
                          id format when not given."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "paper_id": {
                        "type": "string",
                        "description": "Paper identifier (e.g. '2407.06405v1', 'W2741809807', OSF guid)"
                    },
                    "provider": {
                        "type": "string",
                        "description": "Override provider detection"
                    }
                },
                "required": ["paper_id"]
            }),
            handler: Arc::new(GetPaperMetadataHandler {
                router: router.clone(),
            }),
        });

        registry.register(Tool {
            name: "get_paper_by_id".to_string(),
            description: "Download a paper's PDF and return its metadata with the extracted full text."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "paper_id": {
                        "type": "string",
                        "description": "Paper identifier"
                    },
                    "provider": {
                        "type": "string",
                        "description": "Override provider detection"
                    }
                },
                "required": ["paper_id"]
            }),
            handler: Arc::new(GetPaperHandler {
                router,
                content: content.clone(),
            }),
        });

        registry.register(Tool {
            name: "get_paper_content_by_url".to_string(),
            description: "Download a PDF from a URL and return its extracted text.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "http(s) URL of a PDF document"
                    }
                },
                "required": ["url"]
            }),
            handler: Arc::new(GetPaperContentByUrlHandler { content }),
        });

        registry
    }

    /// Register a tool
    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Get all tools
    pub fn all(&self) -> Vec<&Tool> {
        self.tools.values().collect()
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::InvalidParams(format!("Tool '{}' not found", name)))?;

        tool.handler.execute(args).await
    }
}
