//! haven-worker entry point.
//!
//! Boots one worker version from configuration and serves its events as MCP
//! tools on stdio transport. Logging goes to stderr to avoid interfering with
//! the JSON-RPC protocol on stdout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use haven_client::{ClientRegistry, FetchClient, FetchConfig, Fetcher, OfflineWorker};
use haven_core::{CacheDb, WorkerConfig};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

/// How long pending cache writes may delay exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = WorkerConfig::load().context("loading worker configuration")?;
    let origin = config.origin_url()?;

    tracing::info!(
        generation = %config.generation_name(),
        origin = %origin,
        db = %config.db_path.display(),
        "Starting haven-worker on stdio transport"
    );

    let cache = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;
    let network: Arc<dyn Fetcher> = Arc::new(FetchClient::new(FetchConfig::from_worker(&config)?)?);
    let worker = Arc::new(OfflineWorker::new(&config, cache.clone(), network.clone(), ClientRegistry::new())?);

    let handler = handler::HavenServer::new(worker.clone(), cache, network, origin);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    worker.shutdown(SHUTDOWN_GRACE).await;
    tracing::info!("haven-worker stopped");

    Ok(())
}
