//! Test doubles shared by the worker's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use offcache_client::{Network, NetworkError};
use offcache_core::{CacheDb, Request, Response, WorkerConfig};

use crate::context::WorkerContext;
use crate::worker::ServiceWorker;

pub(crate) const SCOPE: &str = "https://app.example.com/";

/// Scriptable network that records every call.
#[derive(Default)]
pub(crate) struct MockNetwork {
    routes: Mutex<HashMap<String, Result<Response, NetworkError>>>,
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl MockNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Network that serves every precache URL of [`test_config`].
    pub(crate) fn serving_precache() -> Self {
        let network = Self::new();
        network.respond("https://app.example.com/", 200, "<html>shell</html>");
        network.respond("https://app.example.com/index.html", 200, "<html>index</html>");
        network.respond("https://app.example.com/offline.html", 200, "<html>offline</html>");
        network.respond("https://cdn.example.com/lib.js", 200, "console.log('lib')");
        network
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: &str) {
        let response = Response::new(url, status, body.to_string()).with_header("content-type", "text/html");
        self.routes.lock().unwrap().insert(url.to_string(), Ok(response));
    }

    pub(crate) fn fail(&self, url: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(NetworkError::Offline(format!("unreachable: {url}"))));
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Offline("network down".into()));
        }
        let url = request.url.to_string();
        match self.routes.lock().unwrap().get(&url) {
            Some(result) => result.clone(),
            None => Ok(Response::new(url, 404, "not found")),
        }
    }
}

pub(crate) fn test_config() -> WorkerConfig {
    WorkerConfig {
        scope: SCOPE.into(),
        precache_urls: vec![
            "./".into(),
            "./index.html".into(),
            "./offline.html".into(),
            "https://cdn.example.com/lib.js".into(),
        ],
        ..Default::default()
    }
}

pub(crate) async fn test_context(config: WorkerConfig, network: Arc<MockNetwork>) -> WorkerContext {
    let cache = CacheDb::open_in_memory().await.unwrap();
    WorkerContext::new(config, cache, network).unwrap()
}

pub(crate) async fn test_worker(config: WorkerConfig, network: Arc<MockNetwork>) -> ServiceWorker {
    ServiceWorker::new(test_context(config, network).await)
}

pub(crate) fn html_request(url: &str) -> Request {
    Request::get(url::Url::parse(url).unwrap()).with_header("accept", "text/html,application/xhtml+xml")
}

pub(crate) fn asset_request(url: &str) -> Request {
    Request::get(url::Url::parse(url).unwrap()).with_header("accept", "*/*")
}
