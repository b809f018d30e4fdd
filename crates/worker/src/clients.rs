//! Page clients connected to the worker.
//!
//! Each open page registers once and receives posted messages on its own
//! channel. A page is *controlled* once the worker has claimed it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use offcache_core::{Error, OutboundMessage};
use tokio::sync::{RwLock, mpsc};
use url::Url;

pub type ClientId = u64;

struct ClientEntry {
    url: Url,
    controlled: bool,
    sender: mpsc::UnboundedSender<OutboundMessage>,
}

/// Receiving end held by a page.
pub struct ClientHandle {
    pub id: ClientId,
    receiver: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl ClientHandle {
    /// Wait for the next message from the worker.
    pub async fn recv(&mut self) -> Option<OutboundMessage> {
        self.receiver.recv().await
    }

    /// Take a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<OutboundMessage> {
        self.receiver.try_recv().ok()
    }
}

/// Registry of open pages, shared between the worker and its host.
#[derive(Clone)]
pub struct ClientRegistry {
    scope: Url,
    clients: Arc<RwLock<BTreeMap<ClientId, ClientEntry>>>,
    next_id: Arc<AtomicU64>,
}

impl ClientRegistry {
    pub fn new(scope: Url) -> Self {
        Self { scope, clients: Arc::new(RwLock::new(BTreeMap::new())), next_id: Arc::new(AtomicU64::new(1)) }
    }

    /// Register an open page. New pages start uncontrolled.
    pub async fn register(&self, url: Url) -> ClientHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.clients
            .write()
            .await
            .insert(id, ClientEntry { url, controlled: false, sender });
        tracing::debug!(client = id, "client registered");
        ClientHandle { id, receiver }
    }

    /// Forget a page that was closed.
    pub async fn close(&self, id: ClientId) {
        if self.clients.write().await.remove(&id).is_some() {
            tracing::debug!(client = id, "client closed");
        }
    }

    /// Take control of every open in-scope page.
    ///
    /// Returns how many pages changed hands.
    pub async fn claim(&self) -> usize {
        let mut clients = self.clients.write().await;
        let mut claimed = 0;
        for entry in clients.values_mut() {
            if !entry.controlled && self.in_scope(&entry.url) {
                entry.controlled = true;
                claimed += 1;
            }
        }
        tracing::debug!(claimed, "claimed clients");
        claimed
    }

    /// Ids of every controlled page, in registration order.
    pub async fn match_all(&self) -> Vec<ClientId> {
        self.clients
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.controlled)
            .map(|(id, _)| *id)
            .collect()
    }

    pub async fn is_controlled(&self, id: ClientId) -> bool {
        self.clients.read().await.get(&id).is_some_and(|entry| entry.controlled)
    }

    /// Post a message to one page. Nothing is awaited beyond queueing it.
    pub async fn post_message(&self, id: ClientId, message: OutboundMessage) -> Result<(), Error> {
        let clients = self.clients.read().await;
        let entry = clients.get(&id).ok_or(Error::ClientGone(id))?;
        entry.sender.send(message).map_err(|_| Error::ClientGone(id))
    }

    fn in_scope(&self, url: &Url) -> bool {
        url.as_str().starts_with(self.scope.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn registry() -> ClientRegistry {
        ClientRegistry::new(url("https://app.example.com/"))
    }

    fn update() -> OutboundMessage {
        OutboundMessage::AppUpdated { version: "4.0.0".into(), message: "hi".into() }
    }

    #[tokio::test]
    async fn test_register_starts_uncontrolled() {
        let clients = registry();
        let page = clients.register(url("https://app.example.com/index.html")).await;
        assert!(!clients.is_controlled(page.id).await);
        assert!(clients.match_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_claim_only_in_scope() {
        let clients = registry();
        let inside = clients.register(url("https://app.example.com/books")).await;
        let outside = clients.register(url("https://other.example.com/")).await;

        assert_eq!(clients.claim().await, 1);
        assert!(clients.is_controlled(inside.id).await);
        assert!(!clients.is_controlled(outside.id).await);
        assert_eq!(clients.claim().await, 0);
    }

    #[tokio::test]
    async fn test_post_message_delivers() {
        let clients = registry();
        let mut page = clients.register(url("https://app.example.com/")).await;

        clients.post_message(page.id, update()).await.unwrap();
        assert_eq!(page.recv().await, Some(update()));
    }

    #[tokio::test]
    async fn test_post_message_to_closed_client() {
        let clients = registry();
        let page = clients.register(url("https://app.example.com/")).await;
        let id = page.id;
        clients.close(id).await;

        let result = clients.post_message(id, update()).await;
        assert!(matches!(result, Err(Error::ClientGone(gone)) if gone == id));
    }

    #[tokio::test]
    async fn test_post_message_receiver_dropped() {
        let clients = registry();
        let page = clients.register(url("https://app.example.com/")).await;
        let id = page.id;
        drop(page);

        assert!(clients.post_message(id, update()).await.is_err());
    }
}
