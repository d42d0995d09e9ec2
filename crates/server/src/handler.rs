//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the running worker and the generation store.
use std::sync::Arc;

use haven_client::{Fetcher, OfflineWorker};
use haven_core::CacheDb;
use url::Url;

use crate::tools::cache::{CacheGetParams, generations_impl, get_impl};
use crate::tools::worker::{
    WorkerClientParams, WorkerFetchParams, WorkerMessageParams, activate_impl, client_impl, fetch_impl, install_impl,
    message_impl, status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for haven.
#[derive(Clone)]
pub struct HavenServer {
    worker: Arc<OfflineWorker>,
    cache: CacheDb,
    network: Arc<dyn Fetcher>,
    origin: Url,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl HavenServer {
    /// Create a new server handler around a running worker.
    ///
    /// `network` carries requests the worker passes through.
    pub fn new(worker: Arc<OfflineWorker>, cache: CacheDb, network: Arc<dyn Fetcher>, origin: Url) -> Self {
        Self { worker, cache, network, origin, tool_router: Self::tool_router() }
    }

    #[tool(description = "Install the worker version: fetch every manifest asset into its cache generation. \
        Activates immediately when no open page is controlled by an older version or skip-waiting is set.")]
    async fn worker_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    #[tool(description = "Activate the installed version: delete every other cache generation and take control of open pages.")]
    async fn worker_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    /// Dispatch a page request through the worker.
    ///
    /// Same-origin GETs go network-first with cache fallback; everything else
    /// is forwarded untouched.
    #[tool(description = "Fetch a URL as a controlled page would. Same-origin GET requests go to the network first \
        and fall back to the cache, then to the offline page. Other requests pass through unchanged.")]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, self.network.as_ref(), &self.origin, params.0).await
    }

    #[tool(description = "Post a message to the worker. {\"type\": \"SKIP_WAITING\"} activates a waiting version now.")]
    async fn worker_message(&self, params: Parameters<WorkerMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.worker, params.0).await
    }

    #[tool(description = "Report a page opening or closing. Closing the last page of an older version lets a waiting version activate.")]
    async fn worker_client(&self, params: Parameters<WorkerClientParams>) -> Result<CallToolResult, McpError> {
        client_impl(&self.worker, params.0).await
    }

    #[tool(description = "Show the worker's lifecycle state, manifest, open pages and pending cache writes.")]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker).await
    }

    #[tool(description = "List stored cache generations with their entry counts.")]
    async fn cache_generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(&self.cache, self.worker.generation_name()).await
    }

    #[tool(description = "Read the cached response for a request from a cache generation (default: the current one).")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.cache, &self.origin, self.worker.generation_name(), params.0).await
    }
}

impl ServerHandler for HavenServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "haven-worker".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::worker::fixture;
    use haven_client::ClientRegistry;

    #[tokio::test]
    async fn test_router_lists_every_tool() {
        let server = fixture::origin().await;
        let config = fixture::config(&server, "v2");
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = fixture::worker(&config, &cache, &ClientRegistry::new());
        let handler = HavenServer::new(worker, cache, fixture::network(&config), config.origin_url().unwrap());

        let mut names: Vec<String> = handler
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "cache_generations",
                "cache_get",
                "worker_activate",
                "worker_client",
                "worker_fetch",
                "worker_install",
                "worker_message",
                "worker_status",
            ]
        );
        assert_eq!(handler.get_info().server_info.name, "haven-worker");
    }
}
