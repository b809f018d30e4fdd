//! offcache host entry point.
//!
//! Boots one worker version and drives it from newline-delimited JSON
//! commands on stdin. Replies and page notifications go to stdout; logging
//! goes to stderr to keep the protocol stream clean.

use std::sync::Arc;

use anyhow::Result;
use offcache_client::{FetchClient, FetchConfig, Network};
use offcache_core::{CacheDb, WorkerConfig};
use offcache_worker::{ServiceWorker, WorkerContext, resume};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = WorkerConfig::load()?;
    tracing::info!(
        version = %config.version,
        store = %config.cache_name(),
        db_path = %config.db_path.display(),
        "Starting offcache host on stdio"
    );

    let cache = CacheDb::open(&config.db_path).await?;
    let network: Arc<dyn Network> = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let ctx = WorkerContext::new(config, cache, network.clone())?;
    let worker = Arc::new(ServiceWorker::new(ctx.clone()));

    // A version activated by an earlier run serves straight from its store.
    let previous = if worker.resume().await? {
        None
    } else {
        resume::previous_controller(&ctx).await?.map(Arc::new)
    };

    let host = handler::Host::new(worker, network).with_previous(previous);
    host.serve(tokio::io::stdin(), tokio::io::stdout()).await?;

    Ok(())
}
