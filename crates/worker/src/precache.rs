//! Precache loader run on install.
//!
//! All URLs are fetched concurrently; the current store is written only if
//! every one of them succeeded, in a single transaction.

use futures_util::future::try_join_all;
use offcache_core::{Error, Request, Response};
use url::Url;

use crate::context::WorkerContext;

/// Fetch and store the whole precache list.
///
/// Returns the number of entries stored. Any failure leaves the store
/// untouched and is reported as [`Error::PrecacheFailed`].
pub async fn install(ctx: &WorkerContext) -> Result<usize, Error> {
    let store = ctx.cache_name();
    tracing::info!(store = %store, urls = ctx.manifest.len(), "caching app shell");

    let fetches = ctx.manifest.urls().iter().cloned().map(|url| fetch_one(ctx, url));
    let entries = try_join_all(fetches).await?;

    ctx.cache.put_entries(&store, &entries).await?;

    tracing::info!(store = %store, stored = entries.len(), "precache complete");
    Ok(entries.len())
}

async fn fetch_one(ctx: &WorkerContext, url: Url) -> Result<(Request, Response), Error> {
    let request = Request::get(url);
    let response = ctx.network.fetch(&request).await.map_err(|e| {
        tracing::warn!(url = %request.url, error = %e, "precache fetch failed");
        Error::PrecacheFailed { url: request.url.to_string(), reason: e.to_string() }
    })?;

    if !response.ok() {
        tracing::warn!(url = %request.url, status = response.status, "precache fetch returned non-2xx");
        return Err(Error::PrecacheFailed {
            url: request.url.to_string(),
            reason: format!("status {}", response.status),
        });
    }

    Ok((request, response))
}
