//! Update broadcast to controlled pages.

use offcache_core::OutboundMessage;

use crate::context::WorkerContext;

/// Post one `APP_UPDATED` message to every controlled page.
///
/// Best effort: pages that went away are skipped. Returns the number of
/// pages the message was queued for.
pub async fn broadcast_update(ctx: &WorkerContext) -> usize {
    let message = OutboundMessage::AppUpdated {
        version: ctx.config.version.clone(),
        message: ctx.config.update_message.clone(),
    };

    let mut delivered = 0;
    for id in ctx.clients.match_all().await {
        match ctx.clients.post_message(id, message.clone()).await {
            Ok(()) => delivered += 1,
            Err(e) => tracing::debug!(client = id, error = %e, "update notification dropped"),
        }
    }

    tracing::info!(version = %ctx.config.version, delivered, "notified clients of update");
    delivered
}
