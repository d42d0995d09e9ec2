//! worker_status tool implementation.

use haven_client::OfflineWorker;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Output from the worker_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatusOutput {
    /// Generation owned by the running version.
    pub generation: String,
    pub state: String,
    pub skip_waiting: bool,
    /// Manifest URLs, resolved against the origin.
    pub manifest: Vec<String>,
    /// Generation that controls newly opened clients.
    pub active_generation: Option<String>,
    pub clients: usize,
    /// Write-through copies not yet committed.
    pub pending_writes: usize,
}

/// Implementation of the worker_status tool.
pub async fn status_impl(worker: &OfflineWorker) -> Result<CallToolResult, McpError> {
    let lifecycle = worker.lifecycle();

    json_result(&WorkerStatusOutput {
        generation: worker.generation_name().to_string(),
        state: worker.state().to_string(),
        skip_waiting: lifecycle.is_skip_waiting(),
        manifest: lifecycle.manifest().iter().map(|u| u.to_string()).collect(),
        active_generation: worker.clients().active().await,
        clients: worker.clients().len().await,
        pending_writes: worker.interceptor().pending_writes(),
    })
}
