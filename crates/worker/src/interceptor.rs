//! Request interception: cache first, then network, then offline page.

use offcache_core::{LookupScope, Request, Response, cache::CachedEntry};

use crate::context::WorkerContext;

/// How an intercepted request was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not handled; the host should use its default network path.
    PassThrough,
    /// Served from a cache store; no network activity.
    Cache(Response),
    /// Served from the network, unmodified whatever its status.
    Network(Response),
    /// Network failed on an HTML request; the offline page was served.
    Offline(Response),
    /// Network failed and there is nothing to substitute.
    Failed(String),
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Cache(r) | FetchOutcome::Network(r) | FetchOutcome::Offline(r) => Some(r),
            FetchOutcome::PassThrough | FetchOutcome::Failed(_) => None,
        }
    }

    /// Short label for logs and host replies.
    pub fn source(&self) -> &'static str {
        match self {
            FetchOutcome::PassThrough => "pass_through",
            FetchOutcome::Cache(_) => "cache",
            FetchOutcome::Network(_) => "network",
            FetchOutcome::Offline(_) => "offline",
            FetchOutcome::Failed(_) => "failed",
        }
    }
}

/// Answer one request.
///
/// Only GET requests are handled. A 200 network response is copied into the
/// current store by a tracked background task; the caller does not wait for
/// the write.
pub async fn handle(ctx: &WorkerContext, request: Request) -> FetchOutcome {
    if !request.is_get() {
        return FetchOutcome::PassThrough;
    }

    if let Some(entry) = lookup(ctx, &request).await {
        tracing::debug!(url = %request.url, store = %entry.store_name, "serving from cache");
        return FetchOutcome::Cache(entry.response);
    }

    match ctx.network.fetch(&request).await {
        Ok(response) => {
            if response.status != 200 {
                tracing::debug!(url = %request.url, status = response.status, "not caching response");
                return FetchOutcome::Network(response);
            }

            let copy = response.clone();
            let cache = ctx.cache.clone();
            let store = ctx.cache_name();
            ctx.tasks.spawn(async move {
                if let Err(e) = cache.put_entry(&store, &request, &copy).await {
                    tracing::warn!(url = %request.url, error = %e, "runtime cache write failed");
                }
            });

            FetchOutcome::Network(response)
        }
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "network fetch failed");
            if request.accepts_html() {
                let offline = Request::get(ctx.offline_url.clone());
                if let Some(entry) = lookup(ctx, &offline).await {
                    return FetchOutcome::Offline(entry.response);
                }
                tracing::warn!(offline_url = %ctx.offline_url, "offline page missing from cache");
            }
            FetchOutcome::Failed(e.to_string())
        }
    }
}

/// A failed cache read counts as a miss.
async fn lookup(ctx: &WorkerContext, request: &Request) -> Option<CachedEntry> {
    let result = match ctx.config.lookup_scope {
        LookupScope::AllStores => ctx.cache.match_any(request).await,
        LookupScope::CurrentStore => ctx.cache.match_entry(&ctx.cache_name(), request).await,
    };
    result.unwrap_or_else(|e| {
        tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
        None
    })
}
