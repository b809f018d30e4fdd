//! Stale store garbage collection run on activate.

use futures_util::future::join_all;

use crate::context::WorkerContext;

/// Delete every store carrying the application prefix except the current one.
///
/// Deletions run concurrently. A failed deletion is logged and left for the
/// next activation. Returns the names actually deleted.
pub async fn collect_stale(ctx: &WorkerContext) -> Vec<String> {
    let current = ctx.cache_name();
    let names = match ctx.cache.store_names().await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(error = %e, "could not list cache stores");
            return Vec::new();
        }
    };

    let stale: Vec<String> = names
        .into_iter()
        .filter(|name| ctx.config.owns_store(name) && *name != current)
        .collect();

    let deletions = stale.into_iter().map(|name| async move {
        tracing::info!(store = %name, "deleting old cache");
        let result = ctx.cache.delete_store(&name).await;
        (name, result)
    });

    let mut deleted = Vec::new();
    for (name, result) in join_all(deletions).await {
        match result {
            Ok(true) => deleted.push(name),
            Ok(false) => tracing::debug!(store = %name, "store already gone"),
            Err(e) => tracing::warn!(store = %name, error = %e, "failed to delete old cache"),
        }
    }
    deleted
}
