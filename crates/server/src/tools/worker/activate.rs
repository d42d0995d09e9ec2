//! worker_activate tool implementation.

use haven_client::{OfflineWorker, WorkerEvents};
use rmcp::{ErrorData as McpError, model::CallToolResult};

use super::ActivationOutput;
use crate::tools::json_result;

/// Implementation of the worker_activate tool.
///
/// Deletes every generation but the worker's own and claims open clients.
pub async fn activate_impl(worker: &OfflineWorker) -> Result<CallToolResult, McpError> {
    let report = worker.on_activate().await?;
    json_result(&ActivationOutput::from(report))
}
