//! shellcache server entry point.
//!
//! Loads configuration, opens the partition store, brings the cache
//! controller up and serves MCP on stdio transport. Logging goes to stderr
//! to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{CacheController, FetchConfig, HttpFetcher};
use shellcache_core::{AppConfig, CacheStorage};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        origin = %config.origin,
        version = %config.version,
        db = %config.db_path.display(),
        "starting shellcache"
    );

    let storage = CacheStorage::open(&config.db_path)
        .await
        .map_err(|e| anyhow!("opening cache database {}: {e}", config.db_path.display()))?;
    let fetcher = HttpFetcher::new(FetchConfig::from(&config)).map_err(|e| anyhow!(e.to_string()))?;
    let controller =
        Arc::new(CacheController::new(config, storage, Arc::new(fetcher)).map_err(|e| anyhow!(e.to_string()))?);

    if let Err(e) = tools::lifecycle::bootstrap(&controller).await {
        tracing::warn!(error = %e, "controller not active; requests pass through until sw_install succeeds");
    }

    let handler = handler::ShellCacheServer::new(controller.clone());
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    controller.settle().await;
    tracing::info!("shut down");

    Ok(())
}
