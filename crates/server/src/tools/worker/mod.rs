//! Worker event tools.
//!
//! Each tool forwards one host event to the running [`OfflineWorker`].
//!
//! [`OfflineWorker`]: haven_client::OfflineWorker

pub mod activate;
pub mod client;
pub mod fetch;
pub mod install;
pub mod message;
pub mod status;

use haven_client::ActivateReport;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use activate::activate_impl;
pub use client::{WorkerClientParams, client_impl};
pub use fetch::{WorkerFetchParams, fetch_impl};
pub use install::install_impl;
pub use message::{WorkerMessageParams, message_impl};
pub use status::status_impl;

/// An activation performed while handling a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActivationOutput {
    /// Generation that became current.
    pub generation: String,
    /// Generations deleted by the activation.
    pub pruned: Vec<String>,
    /// Open clients that switched to the new generation.
    pub claimed: usize,
}

impl From<ActivateReport> for ActivationOutput {
    fn from(report: ActivateReport) -> Self {
        Self { generation: report.generation, pruned: report.pruned, claimed: report.claimed }
    }
}
