//! worker_install tool implementation.
//!
//! Populates the worker's generation from the manifest, then activates it
//! if the handover conditions already hold.

use haven_client::{OfflineWorker, WorkerEvents};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Output from the worker_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerInstallOutput {
    /// Generation populated by the install.
    pub generation: String,
    /// Number of manifest assets stored.
    pub assets: usize,
    /// Whether the version will skip waiting for open clients.
    pub skip_waiting: bool,
    /// Lifecycle state after the install and any handover.
    pub state: String,
}

/// Implementation of the worker_install tool.
pub async fn install_impl(worker: &OfflineWorker) -> Result<CallToolResult, McpError> {
    let report = worker.on_install().await?;

    json_result(&WorkerInstallOutput {
        generation: report.generation,
        assets: report.assets,
        skip_waiting: report.skip_waiting,
        state: worker.state().to_string(),
    })
}
