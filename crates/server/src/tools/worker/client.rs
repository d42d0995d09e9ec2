//! worker_client tool implementation.
//!
//! Registers page open and close events. Closing the last page controlled by
//! an older generation lets a waiting version activate.

use haven_client::{OfflineWorker, WorkerEvents};
use haven_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ActivationOutput;
use crate::tools::json_result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClientAction {
    Open,
    Close,
}

/// Input parameters for the worker_client tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerClientParams {
    /// Page identifier chosen by the host.
    pub client_id: String,
    pub action: ClientAction,
}

/// Output from the worker_client tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerClientOutput {
    pub client_id: String,
    pub action: ClientAction,
    /// Generation controlling the client after an open.
    pub controller: Option<String>,
    /// Open clients remaining.
    pub clients: usize,
    /// Activation triggered by a close, if any.
    pub activation: Option<ActivationOutput>,
}

/// Implementation of the worker_client tool.
pub async fn client_impl(worker: &OfflineWorker, params: WorkerClientParams) -> Result<CallToolResult, McpError> {
    let client_id = params.client_id.trim();
    if client_id.is_empty() {
        return Err(Error::InvalidInput("client_id cannot be empty".into()).into());
    }

    let (controller, activation) = match params.action {
        ClientAction::Open => (worker.on_client_open(client_id).await, None),
        ClientAction::Close => (None, worker.on_client_close(client_id).await?.map(ActivationOutput::from)),
    };

    json_result(&WorkerClientOutput {
        client_id: client_id.to_string(),
        action: params.action,
        controller,
        clients: worker.clients().len().await,
        activation,
    })
}
