//! Host-facing event interface.
//!
//! A host runtime (browser binding, MCP adapter, test) drives the worker by
//! calling one method per event. [`OfflineWorker`] wires the lifecycle
//! controller, fetch interceptor and control channel for one version.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use haven_core::{CacheDb, Error, WorkerConfig};
use serde_json::Value;

use crate::control::{ControlChannel, ControlOutcome};
use crate::fetch::{FetchClient, FetchConfig, Fetcher, Request};
use crate::intercept::{FetchInterceptor, FetchOutcome};
use crate::lifecycle::{ActivateReport, ClientRegistry, InstallReport, LifecycleController, WorkerState};

/// Events a host dispatches to a worker.
#[async_trait]
pub trait WorkerEvents: Send + Sync {
    /// A new version was registered; populate its generation.
    async fn on_install(&self) -> Result<InstallReport, Error>;

    /// The host hands control to this version.
    async fn on_activate(&self) -> Result<ActivateReport, Error>;

    /// A page issued a request.
    async fn on_fetch(&self, request: Request) -> Result<FetchOutcome, Error>;

    /// A page posted a control message.
    async fn on_message(&self, data: &Value) -> Result<ControlOutcome, Error>;

    /// A page opened. Returns the generation controlling it, if any.
    async fn on_client_open(&self, client_id: &str) -> Option<String>;

    /// A page closed. May let a waiting version activate.
    async fn on_client_close(&self, client_id: &str) -> Result<Option<ActivateReport>, Error>;
}

/// One deployed version of the offline worker.
pub struct OfflineWorker {
    lifecycle: Arc<LifecycleController>,
    interceptor: FetchInterceptor,
    control: ControlChannel,
    clients: ClientRegistry,
}

impl OfflineWorker {
    /// Build a worker over an existing store, network and client registry.
    pub fn new(
        config: &WorkerConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>, clients: ClientRegistry,
    ) -> Result<Self, Error> {
        let lifecycle = Arc::new(LifecycleController::new(config, db.clone(), fetcher.clone(), clients.clone())?);
        let interceptor = FetchInterceptor::new(config, db, fetcher)?;
        let control = ControlChannel::new(lifecycle.clone());

        Ok(Self { lifecycle, interceptor, control, clients })
    }

    /// Build a worker that reaches the network through reqwest.
    pub fn with_http(config: &WorkerConfig, db: CacheDb, clients: ClientRegistry) -> Result<Self, Error> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(FetchClient::new(FetchConfig::from_worker(config)?)?);
        Self::new(config, db, fetcher, clients)
    }

    pub fn generation_name(&self) -> &str {
        self.lifecycle.generation_name()
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn interceptor(&self) -> &FetchInterceptor {
        &self.interceptor
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Let pending cache writes finish, waiting at most `grace`.
    pub async fn shutdown(&self, grace: Duration) {
        self.interceptor.shutdown(grace).await;
    }
}

#[async_trait]
impl WorkerEvents for OfflineWorker {
    async fn on_install(&self) -> Result<InstallReport, Error> {
        let report = self.lifecycle.install().await?;
        self.lifecycle.try_handover().await?;
        Ok(report)
    }

    async fn on_activate(&self) -> Result<ActivateReport, Error> {
        self.lifecycle.activate().await
    }

    /// Pages are only controlled once this version is active; until then
    /// every request goes to the network untouched.
    async fn on_fetch(&self, request: Request) -> Result<FetchOutcome, Error> {
        let state = self.state();
        if state != WorkerState::Active {
            tracing::debug!(%state, url = %request.url, "not controlling, passthrough");
            return Ok(FetchOutcome::Passthrough(request));
        }
        self.interceptor.handle(request).await
    }

    async fn on_message(&self, data: &Value) -> Result<ControlOutcome, Error> {
        self.control.handle(data).await
    }

    async fn on_client_open(&self, client_id: &str) -> Option<String> {
        self.clients.open(client_id).await
    }

    async fn on_client_close(&self, client_id: &str) -> Result<Option<ActivateReport>, Error> {
        self.clients.close(client_id).await;
        self.lifecycle.try_handover().await
    }
}
