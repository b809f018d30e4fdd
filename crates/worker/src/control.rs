//! Inbound control channel from pages.

use offcache_core::ControlMessage;

/// Recognize a control message; anything unrecognized is ignored.
pub fn recognize(data: &serde_json::Value) -> Option<ControlMessage> {
    let message = ControlMessage::parse(data);
    if message.is_none() {
        tracing::debug!(%data, "ignoring unrecognized message");
    }
    message
}
