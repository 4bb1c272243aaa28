//! MCP server exposing `get_similar_chunks` over stdio.

use docvec_core::{AppError, AppResult};
use docvec_knowledge::{Components, RetrievalTool, SimilarityQuery, VectorStore};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::transport::stdio;
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::to_error_data;

pub const TOOL_NAME: &str = "get_similar_chunks";

/// Arguments of `get_similar_chunks`.
#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct SimilarChunksRequest {
    /// Text to search for
    pub query: String,

    /// Maximum number of chunks to return, a positive integer (default 2)
    #[serde(default)]
    pub k: Option<i64>,
}

/// Tool server bound to a retrieval tool and the store it reads.
#[derive(Clone)]
pub struct McpServer {
    tool: RetrievalTool,
    store: Arc<dyn VectorStore>,
    tool_router: ToolRouter<McpServer>,
}

#[tool_router]
impl McpServer {
    pub fn new(tool: RetrievalTool, store: Arc<dyn VectorStore>) -> Self {
        Self {
            tool,
            store,
            tool_router: Self::tool_router(),
        }
    }

    pub fn from_components(components: &Components) -> Self {
        Self::new(components.retrieval_tool(), Arc::clone(&components.store))
    }

    #[tool(
        description = "Return the stored document chunks most similar to a query, best match first."
    )]
    async fn get_similar_chunks(
        &self,
        Parameters(request): Parameters<SimilarChunksRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let span = info_span!("tool_call", tool = TOOL_NAME, k = ?request.k);
        self.similar_chunks(request).instrument(span).await
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info.name = "docvec".to_string();
        info.server_info.version = env!("CARGO_PKG_VERSION").to_string();
        info.instructions = Some(format!(
            "Call {} with a query to retrieve similar document chunks.",
            TOOL_NAME
        ));
        info
    }
}

impl McpServer {
    async fn similar_chunks(
        &self,
        request: SimilarChunksRequest,
    ) -> Result<CallToolResult, ErrorData> {
        let query =
            SimilarityQuery::from_parts(request.query, request.k).map_err(|e| to_error_data(&e))?;

        let results = self.tool.search(&query).await.map_err(|e| {
            warn!("{} failed: {}", TOOL_NAME, e);
            to_error_data(&e)
        })?;
        info!("{} returned {} results (k={})", TOOL_NAME, results.len(), query.k);

        // Both payloads are rendered from one value so they agree exactly
        let results =
            serde_json::to_value(&results).map_err(|e| to_error_data(&AppError::from(e)))?;
        let mut result = CallToolResult::success(vec![Content::text(results.to_string())]);
        result.structured_content = Some(json!({ "results": results }));
        Ok(result)
    }

    /// Serve stdin/stdout until the client disconnects or Ctrl-C, then close the store.
    pub async fn run_stdio(self) -> AppResult<()> {
        info!("Serving {} over stdio", TOOL_NAME);

        let store = Arc::clone(&self.store);
        let outcome = serve_until_shutdown(self).await;

        store.close().await?;
        debug!("Store closed");
        outcome
    }
}

async fn serve_until_shutdown(server: McpServer) -> AppResult<()> {
    let running = server.serve(stdio()).await.map_err(transport_error)?;

    let token = running.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            token.cancel();
        }
    });

    let quit = running.waiting().await;
    ctrl_c.abort();

    let reason = quit.map_err(transport_error)?;
    info!("Session ended: {:?}", reason);
    Ok(())
}

fn transport_error(err: impl std::fmt::Display) -> AppError {
    AppError::io("<stdio>", std::io::Error::other(err.to_string()))
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("tool", &self.tool)
            .field("store", &self.store)
            .finish()
    }
}
