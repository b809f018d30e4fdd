//! Explicit per-worker context handed to every event handler.

use std::sync::Arc;

use offcache_client::{Network, resolve};
use offcache_core::{CacheDb, Error, WorkerConfig};
use url::Url;

use crate::clients::ClientRegistry;
use crate::manifest::PrecacheManifest;
use crate::tasks::BackgroundTasks;

/// Everything a handler needs: configuration and the host capabilities.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<WorkerConfig>,
    pub scope: Url,
    pub offline_url: Url,
    pub manifest: Arc<PrecacheManifest>,
    pub cache: CacheDb,
    pub network: Arc<dyn Network>,
    pub clients: ClientRegistry,
    pub tasks: BackgroundTasks,
}

impl WorkerContext {
    /// Resolve scope, offline URL and precache list from the configuration.
    pub fn new(config: WorkerConfig, cache: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let scope = Url::parse(&config.scope).map_err(|e| Error::InvalidUrl(format!("scope: {e}")))?;
        let offline_url =
            resolve(&scope, &config.offline_url).map_err(|e| Error::InvalidUrl(format!("offline_url: {e}")))?;
        let manifest = PrecacheManifest::resolve(&scope, &config.precache_urls)?;

        if !manifest.contains(&offline_url) {
            tracing::debug!(offline_url = %offline_url, "offline page is not precached");
        }

        Ok(Self {
            config: Arc::new(config),
            clients: ClientRegistry::new(scope.clone()),
            scope,
            offline_url,
            manifest: Arc::new(manifest),
            cache,
            network,
            tasks: BackgroundTasks::new(),
        })
    }

    /// Name of the store this worker version writes to.
    pub fn cache_name(&self) -> String {
        self.config.cache_name()
    }
}
