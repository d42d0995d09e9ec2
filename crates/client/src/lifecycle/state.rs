//! Lifecycle states of one deployed version.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a version is in its install → activate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Constructed, install not started.
    Parsed,
    /// Manifest assets are being fetched.
    Installing,
    /// Generation populated; waiting for handover.
    Installed,
    /// Pruning older generations and claiming clients.
    Activating,
    /// Serving; the only current generation.
    Active,
    /// Install failed. Nothing was written; install may be retried.
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        }
    }

    /// States from which `install` may start.
    pub fn can_install(&self) -> bool {
        matches!(self, WorkerState::Parsed | WorkerState::Redundant)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
