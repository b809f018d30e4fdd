//! Messages exchanged between the worker and its page clients.
//!
//! Inbound: `{ "type": "SKIP_WAITING" }`.
//! Outbound: `{ "type": "APP_UPDATED", "version": ..., "message": ... }`.

use serde::{Deserialize, Serialize};

/// Control messages a page may send to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Leave the waiting state and activate now.
    SkipWaiting,
}

impl ControlMessage {
    /// Recognize a control message, returning `None` for any other shape.
    pub fn parse(data: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }
}

/// Notifications the worker posts to its page clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    /// A new version finished activating.
    AppUpdated { version: String, message: String },
}
