//! Keeping an earlier version in control while a new one installs.

use offcache_core::{Error, WorkerConfig};

use crate::context::WorkerContext;
use crate::worker::ServiceWorker;

/// Version of the newest store this app owns, other than the current one.
pub async fn previous_version(ctx: &WorkerContext) -> Result<Option<String>, Error> {
    let current = ctx.cache_name();
    let prefix = format!("{}-", ctx.config.app_prefix);
    let names = ctx.cache.store_names().await?;

    Ok(names
        .into_iter()
        .rev()
        .filter(|name| *name != current)
        .find_map(|name| name.strip_prefix(prefix.as_str()).map(str::to_string)))
}

/// Resume the previous version so it serves fetches until this one
/// activates and collects its store.
///
/// Returns `None` when no earlier version left a usable store.
pub async fn previous_controller(ctx: &WorkerContext) -> Result<Option<ServiceWorker>, Error> {
    let Some(version) = previous_version(ctx).await? else {
        return Ok(None);
    };

    let config = WorkerConfig { version, ..(*ctx.config).clone() };
    let previous = ServiceWorker::new(WorkerContext::new(config, ctx.cache.clone(), ctx.network.clone())?);
    if previous.resume().await? {
        tracing::info!(version = %previous.context().config.version, "previous version kept in control");
        Ok(Some(previous))
    } else {
        Ok(None)
    }
}
