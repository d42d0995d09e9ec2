//! Out-of-band control messages from pages.
//!
//! The only recognised message is `{"type": "SKIP_WAITING"}`, which promotes
//! a waiting version to active without waiting for open clients to close.
//! Anything else is ignored.

use std::sync::Arc;

use haven_core::Error;
use serde::Deserialize;
use serde_json::Value;

use crate::lifecycle::{ActivateReport, LifecycleController, WorkerState};

/// Recognised control messages, tagged by their `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
}

impl ControlMessage {
    /// Parse a message; None for anything unrecognised.
    ///
    /// Only objects carry a `type` field. Arrays are rejected here because
    /// tagged enums would otherwise read their first element as the tag.
    pub fn parse(data: &Value) -> Option<Self> {
        if !data.is_object() {
            return None;
        }
        serde_json::from_value(data.clone()).ok()
    }
}

/// What a control message did.
#[derive(Debug, Clone)]
pub enum ControlOutcome {
    /// The waiting version was activated immediately.
    Activated(ActivateReport),
    /// Skip-waiting is raised; activation follows once install completes.
    Deferred { state: WorkerState },
    /// Message not recognised.
    Ignored,
}

/// Receives control messages for one version.
pub struct ControlChannel {
    lifecycle: Arc<LifecycleController>,
}

impl ControlChannel {
    pub fn new(lifecycle: Arc<LifecycleController>) -> Self {
        Self { lifecycle }
    }

    /// Handle one message.
    ///
    /// # Errors
    ///
    /// Only activation failures propagate; unrecognised messages never error.
    pub async fn handle(&self, data: &Value) -> Result<ControlOutcome, Error> {
        let Some(message) = ControlMessage::parse(data) else {
            tracing::debug!(%data, "ignoring control message");
            return Ok(ControlOutcome::Ignored);
        };

        match message {
            ControlMessage::SkipWaiting => {
                self.lifecycle.skip_waiting();
                match self.lifecycle.try_handover().await? {
                    Some(report) => {
                        tracing::info!(generation = %report.generation, "forced activation");
                        Ok(ControlOutcome::Activated(report))
                    }
                    None => Ok(ControlOutcome::Deferred { state: self.lifecycle.state() }),
                }
            }
        }
    }
}
