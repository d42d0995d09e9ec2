//! Install and activation of one deployed version.
//!
//! ### Install
//! Fetch every manifest asset, then write them all into the version's
//! generation in one transaction. A single failed asset leaves nothing
//! behind and marks the version `redundant`; the previous generation keeps
//! serving and install may be retried.
//!
//! ### Activate
//! Delete every generation whose name differs from this version's, then
//! claim all open clients.
//!
//! ### Handover
//! An installed version activates once skip-waiting is raised or no open
//! client is still controlled by another generation.

pub mod clients;
pub mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::try_join_all;
use haven_core::{CacheDb, CacheEntry, Error, WorkerConfig};
use serde::Serialize;
use tokio::sync::watch;
use url::Url;

pub use clients::ClientRegistry;
pub use state::WorkerState;

use crate::fetch::{Fetcher, Request};

/// Result of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub assets: usize,
    pub skip_waiting: bool,
}

/// Result of an activation.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateReport {
    pub generation: String,
    /// Generations deleted by this activation.
    pub pruned: Vec<String>,
    /// Clients that switched to this generation.
    pub claimed: usize,
}

/// Drives one version through install and activation.
pub struct LifecycleController {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    clients: ClientRegistry,
    generation: String,
    manifest: Vec<Url>,
    skip_waiting_on_install: bool,
    skip_waiting: AtomicBool,
    state: watch::Sender<WorkerState>,
}

impl LifecycleController {
    /// Create a controller for the version named in `config`.
    ///
    /// Manifest entries are resolved against the origin up front.
    pub fn new(
        config: &WorkerConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>, clients: ClientRegistry,
    ) -> Result<Self, Error> {
        let manifest = config
            .static_assets
            .iter()
            .map(|asset| config.resolve(asset).map_err(|e| Error::InvalidUrl(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let (state, _) = watch::channel(WorkerState::Parsed);

        Ok(Self {
            db,
            fetcher,
            clients,
            generation: config.generation_name(),
            manifest,
            skip_waiting_on_install: config.skip_waiting_on_install,
            skip_waiting: AtomicBool::new(false),
            state,
        })
    }

    /// Name of the generation this controller owns.
    pub fn generation_name(&self) -> &str {
        &self.generation
    }

    /// Manifest URLs, resolved.
    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Let an installed version activate without waiting for clients to close.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn is_skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Populate this version's generation with the manifest.
    ///
    /// # Errors
    ///
    /// - `LIFECYCLE_STATE` if an install is running or already succeeded
    /// - `INSTALL_FAILED` if any asset fails to fetch or returns a non-2xx status
    /// - `CACHE_ERROR` if the commit fails
    ///
    /// On any failure the version becomes `redundant` and no generation is created.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let started = self.state.send_if_modified(|state| {
            if state.can_install() {
                *state = WorkerState::Installing;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(Error::InvalidState(format!(
                "{} cannot install while {}",
                self.generation,
                self.state()
            )));
        }

        tracing::info!(generation = %self.generation, assets = self.manifest.len(), "installing");

        match self.populate().await {
            Ok(assets) => {
                if self.skip_waiting_on_install {
                    self.skip_waiting();
                }
                self.state.send_replace(WorkerState::Installed);
                tracing::info!(generation = %self.generation, assets, "installed");
                Ok(InstallReport { generation: self.generation.clone(), assets, skip_waiting: self.is_skip_waiting() })
            }
            Err(e) => {
                self.state.send_replace(WorkerState::Redundant);
                tracing::warn!(generation = %self.generation, error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn populate(&self) -> Result<usize, Error> {
        let batch = try_join_all(self.manifest.iter().map(|url| self.fetch_asset(url))).await?;
        let count = batch.len();
        self.db.commit_generation(&self.generation, batch).await?;
        Ok(count)
    }

    async fn fetch_asset(&self, url: &Url) -> Result<CacheEntry, Error> {
        let request = Request::get(url.clone());
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| Error::InstallFailed(format!("{url}: {e}")))?;

        if !response.status.is_success() {
            return Err(Error::InstallFailed(format!("{url}: status {}", response.status.as_u16())));
        }

        Ok(response.to_cache_entry(&request))
    }

    /// Prune every other generation and claim open clients.
    ///
    /// Calling this again while active re-runs the prune, which is then a no-op.
    ///
    /// # Errors
    ///
    /// `LIFECYCLE_STATE` unless the version is `installed` or `active`.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let Some(previous) = self.begin_activation(&[WorkerState::Installed, WorkerState::Active]) else {
            return Err(Error::InvalidState(format!(
                "{} cannot activate while {}",
                self.generation,
                self.state()
            )));
        };
        self.finish_activation(previous).await
    }

    /// Whether an installed version may activate now.
    pub async fn ready_to_activate(&self) -> bool {
        if self.state() != WorkerState::Installed {
            return false;
        }
        if self.is_skip_waiting() {
            return true;
        }
        self.clients.controlled_by_other(&self.generation).await == 0
    }

    /// Activate if the handover conditions hold.
    ///
    /// Returns None when the version keeps waiting, or when another caller
    /// won the race to activate.
    pub async fn try_handover(&self) -> Result<Option<ActivateReport>, Error> {
        if !self.ready_to_activate().await {
            tracing::debug!(generation = %self.generation, state = %self.state(), "handover deferred");
            return Ok(None);
        }
        match self.begin_activation(&[WorkerState::Installed]) {
            Some(previous) => self.finish_activation(previous).await.map(Some),
            None => Ok(None),
        }
    }

    fn begin_activation(&self, allowed: &[WorkerState]) -> Option<WorkerState> {
        let mut previous = None;
        self.state.send_if_modified(|state| {
            if allowed.contains(state) {
                previous = Some(*state);
                *state = WorkerState::Activating;
                true
            } else {
                false
            }
        });
        previous
    }

    async fn finish_activation(&self, previous: WorkerState) -> Result<ActivateReport, Error> {
        match self.prune().await {
            Ok(pruned) => {
                let claimed = self.clients.claim(&self.generation).await;
                self.state.send_replace(WorkerState::Active);
                tracing::info!(generation = %self.generation, pruned = pruned.len(), claimed, "activated");
                Ok(ActivateReport { generation: self.generation.clone(), pruned, claimed })
            }
            Err(e) => {
                self.state.send_replace(previous);
                tracing::warn!(generation = %self.generation, error = %e, "activation failed");
                Err(e)
            }
        }
    }

    async fn prune(&self) -> Result<Vec<String>, Error> {
        let mut pruned = Vec::new();
        for name in self.db.list_generations().await? {
            if name == self.generation {
                continue;
            }
            tracing::info!(generation = %name, "deleting old cache");
            if self.db.delete_generation(&name).await? {
                pruned.push(name);
            }
        }
        Ok(pruned)
    }
}
