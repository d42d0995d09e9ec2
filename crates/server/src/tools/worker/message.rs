//! worker_message tool implementation.
//!
//! Posts a control message to the worker. `{"type": "SKIP_WAITING"}` forces a
//! waiting version to activate; anything else is ignored.

use haven_client::{ControlOutcome, OfflineWorker, WorkerEvents};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ActivationOutput;
use crate::tools::json_result;

/// Input parameters for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Message payload, e.g. `{"type": "SKIP_WAITING"}`.
    pub data: Value,
}

/// Output from the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageOutput {
    /// activated, deferred or ignored.
    pub outcome: String,
    /// Lifecycle state after handling the message.
    pub state: String,
    pub activation: Option<ActivationOutput>,
}

/// Implementation of the worker_message tool.
pub async fn message_impl(worker: &OfflineWorker, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    let (outcome, activation) = match worker.on_message(&params.data).await? {
        ControlOutcome::Activated(report) => ("activated", Some(ActivationOutput::from(report))),
        ControlOutcome::Deferred { .. } => ("deferred", None),
        ControlOutcome::Ignored => ("ignored", None),
    };

    json_result(&WorkerMessageOutput { outcome: outcome.to_string(), state: worker.state().to_string(), activation })
}
