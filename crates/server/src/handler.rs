//! Stdio host shell.
//!
//! Each stdin line is one JSON command; each reply is one JSON line on
//! stdout. The shell registers a single page client at the worker scope and
//! forwards whatever the worker posts to it as `notification` lines.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use offcache_client::{Network, resolve};
use offcache_core::{Error, OutboundMessage, Request, Response};
use offcache_worker::{EventOutcome, FetchOutcome, ServiceWorker, WorkerEvent};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::error::ShellError;

/// Commands accepted on stdin.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostCommand {
    Install,
    Activate,
    Fetch {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        accept: Option<String>,
    },
    Message {
        data: serde_json::Value,
    },
    Settle,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Lines written to stdout.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostReply {
    Installed { stored: usize, activated: bool },
    Activated { deleted: Vec<String>, claimed: usize, notified: usize },
    /// Textual UTF-8 bodies travel as `body`; anything else as `body_base64`.
    Response {
        source: &'static str,
        url: String,
        status: u16,
        content_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        body_base64: Option<String>,
    },
    Failed { reason: String },
    SkippedWaiting { activated: bool },
    Ignored,
    Settled { tasks: usize },
    Notification { client: u64, message: OutboundMessage },
    Error { code: &'static str, message: String },
}

/// Drives one worker from line-delimited commands.
pub struct Host {
    worker: Arc<ServiceWorker>,
    previous: Option<Arc<ServiceWorker>>,
    network: Arc<dyn Network>,
}

impl Host {
    pub fn new(worker: Arc<ServiceWorker>, network: Arc<dyn Network>) -> Self {
        Self { worker, previous: None, network }
    }

    /// Serve fetches from an earlier version until `worker` activates.
    pub fn with_previous(mut self, previous: Option<Arc<ServiceWorker>>) -> Self {
        self.previous = previous;
        self
    }

    fn fetch_target(&self) -> &ServiceWorker {
        if self.worker.state().can_intercept_fetch() {
            return self.worker.as_ref();
        }
        match &self.previous {
            Some(previous) if previous.state().can_intercept_fetch() => previous.as_ref(),
            _ => self.worker.as_ref(),
        }
    }

    async fn settle(&self) -> usize {
        let mut settled = self.worker.settle().await;
        if let Some(previous) = &self.previous {
            settled += previous.settle().await;
        }
        settled
    }

    /// Run until `input` reaches EOF, then settle background writes.
    pub async fn serve<R, W>(&self, input: R, mut output: W) -> Result<(), ShellError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<HostReply>();

        let writer = tokio::spawn(async move {
            while let Some(reply) = rx.recv().await {
                let line = match serde_json::to_string(&reply) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode reply");
                        continue;
                    }
                };
                output.write_all(line.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        });

        let mut page = self.worker.clients().register(self.worker.context().scope.clone()).await;
        let page_id = page.id;
        if self.worker.state().can_intercept_fetch() {
            self.worker.clients().claim().await;
        }
        let notify = tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(message) = page.recv().await {
                if notify.send(HostReply::Notification { client: page_id, message }).is_err() {
                    break;
                }
            }
        });

        let mut lines = BufReader::new(input).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let reply = self.handle_line(&line).await;
            if tx.send(reply).is_err() {
                break;
            }
        }

        let settled = self.settle().await;
        tracing::info!(settled, "input closed, shutting down");

        self.worker.clients().close(page_id).await;
        if let Err(e) = forwarder.await {
            tracing::warn!(error = %e, "notification forwarder failed");
        }
        drop(tx);

        writer.await.map_err(|e| ShellError::Io(std::io::Error::other(e)))??;
        Ok(())
    }

    /// Handle one command line. Failures become `error` replies.
    pub async fn handle_line(&self, line: &str) -> HostReply {
        match self.try_handle(line).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "command failed");
                e.into()
            }
        }
    }

    async fn try_handle(&self, line: &str) -> Result<HostReply, ShellError> {
        let command: HostCommand =
            serde_json::from_str(line).map_err(|e| ShellError::InvalidCommand(e.to_string()))?;

        let mut pending = None;
        let event = match command {
            HostCommand::Settle => return Ok(HostReply::Settled { tasks: self.settle().await }),
            HostCommand::Install => WorkerEvent::Install,
            HostCommand::Activate => WorkerEvent::Activate,
            HostCommand::Message { data } => WorkerEvent::Message(data),
            HostCommand::Fetch { url, method, accept } => {
                let request = self.build_request(&url, &method, accept.as_deref())?;
                pending = Some(request.clone());
                WorkerEvent::Fetch(request)
            }
        };

        let target = match event {
            WorkerEvent::Fetch(_) => self.fetch_target(),
            _ => self.worker.as_ref(),
        };

        let reply = match target.dispatch(event).await? {
            EventOutcome::Installed(report) => {
                HostReply::Installed { stored: report.stored, activated: report.activated.is_some() }
            }
            EventOutcome::Activated(report) => {
                HostReply::Activated { deleted: report.deleted, claimed: report.claimed, notified: report.notified }
            }
            EventOutcome::SkippedWaiting(report) => HostReply::SkippedWaiting { activated: report.is_some() },
            EventOutcome::Ignored => HostReply::Ignored,
            EventOutcome::Fetched(FetchOutcome::PassThrough) => match pending {
                Some(request) => self.pass_through(&request).await,
                None => HostReply::Ignored,
            },
            EventOutcome::Fetched(FetchOutcome::Failed(reason)) => HostReply::Failed { reason },
            EventOutcome::Fetched(outcome) => match outcome.response() {
                Some(response) => response_reply(outcome.source(), response),
                None => HostReply::Ignored,
            },
        };
        Ok(reply)
    }

    fn build_request(&self, url: &str, method: &str, accept: Option<&str>) -> Result<Request, ShellError> {
        let url = resolve(&self.worker.context().scope, url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let request = Request::new(method, url);
        Ok(match accept {
            Some(accept) => request.with_header("accept", accept),
            None => request,
        })
    }

    /// The worker declined the request; fetch it as a page would without one.
    async fn pass_through(&self, request: &Request) -> HostReply {
        match self.network.fetch(request).await {
            Ok(response) => response_reply("pass_through", &response),
            Err(e) => HostReply::Failed { reason: e.to_string() },
        }
    }
}

fn response_reply(source: &'static str, response: &Response) -> HostReply {
    let content_type = response.content_type().map(str::to_string);
    let text = content_type
        .as_deref()
        .filter(|ct| is_textual(ct))
        .and_then(|_| std::str::from_utf8(&response.body).ok());

    let (body, body_base64) = match text {
        Some(text) => (Some(text.to_string()), None),
        None => (None, Some(STANDARD.encode(&response.body))),
    };

    HostReply::Response { source, url: response.url.clone(), status: response.status, content_type, body, body_base64 }
}

fn is_textual(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence.starts_with("text/")
        || essence.ends_with("+json")
        || essence.ends_with("+xml")
        || matches!(essence.as_str(), "application/json" | "application/javascript" | "application/xml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use offcache_client::NetworkError;
    use offcache_core::{CacheDb, WorkerConfig};
    use offcache_worker::{WorkerContext, WorkerState};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::io::AsyncReadExt;

    #[derive(Default)]
    struct StubNetwork {
        pages: Mutex<HashMap<String, &'static str>>,
        offline: AtomicBool,
    }

    impl StubNetwork {
        fn with_site() -> Self {
            let network = Self::default();
            {
                let mut pages = network.pages.lock().unwrap();
                pages.insert("https://app.example.com/".into(), "<h1>home</h1>");
                pages.insert("https://app.example.com/offline.html".into(), "<h1>offline</h1>");
                pages.insert("https://app.example.com/api/save".into(), "saved");
            }
            network
        }
    }

    #[async_trait]
    impl Network for StubNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(NetworkError::Offline("network down".into()));
            }
            let url = request.url.to_string();
            match self.pages.lock().unwrap().get(&url) {
                Some(body) => Ok(Response::new(url, 200, *body).with_header("content-type", "text/html")),
                None => Ok(Response::new(url, 404, "not found")),
            }
        }
    }

    fn config() -> WorkerConfig {
        WorkerConfig {
            scope: "https://app.example.com/".into(),
            precache_urls: vec!["./".into(), "./offline.html".into()],
            ..Default::default()
        }
    }

    async fn host(config: WorkerConfig, network: Arc<StubNetwork>) -> (Host, Arc<ServiceWorker>) {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let ctx = WorkerContext::new(config, cache, network.clone()).unwrap();
        let worker = Arc::new(ServiceWorker::new(ctx));
        (Host::new(worker.clone(), network), worker)
    }

    #[tokio::test]
    async fn test_install_then_cached_fetch() {
        let network = Arc::new(StubNetwork::with_site());
        let (host, worker) = host(config(), network.clone()).await;

        let reply = host.handle_line(r#"{"event":"install"}"#).await;
        assert_eq!(reply, HostReply::Installed { stored: 2, activated: true });
        assert_eq!(worker.state(), WorkerState::Activated);

        network.offline.store(true, Ordering::SeqCst);
        let reply = host.handle_line(r#"{"event":"fetch","url":"/"}"#).await;
        match reply {
            HostReply::Response { source, status, body, content_type, .. } => {
                assert_eq!(source, "cache");
                assert_eq!(status, 200);
                assert_eq!(body.as_deref(), Some("<h1>home</h1>"));
                assert_eq!(content_type.as_deref(), Some("text/html"));
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_offline_html_fallback() {
        let network = Arc::new(StubNetwork::with_site());
        let (host, _) = host(config(), network.clone()).await;
        host.handle_line(r#"{"event":"install"}"#).await;

        network.offline.store(true, Ordering::SeqCst);
        let reply = host
            .handle_line(r#"{"event":"fetch","url":"/books","accept":"text/html,application/xhtml+xml"}"#)
            .await;
        assert!(matches!(reply, HostReply::Response { source: "offline", ref body, .. } if body.as_deref() == Some("<h1>offline</h1>")));

        let reply = host.handle_line(r#"{"event":"fetch","url":"/app.js"}"#).await;
        assert!(matches!(reply, HostReply::Failed { .. }));
    }

    #[tokio::test]
    async fn test_post_passes_through_to_network() {
        let network = Arc::new(StubNetwork::with_site());
        let (host, _) = host(config(), network).await;
        host.handle_line(r#"{"event":"install"}"#).await;

        let reply = host.handle_line(r#"{"event":"fetch","url":"/api/save","method":"POST"}"#).await;
        assert!(matches!(reply, HostReply::Response { source: "pass_through", status: 200, .. }));
    }

    #[tokio::test]
    async fn test_waiting_worker_skips_on_message() {
        let network = Arc::new(StubNetwork::with_site());
        let (host, worker) = host(WorkerConfig { skip_waiting_on_install: false, ..config() }, network).await;

        let reply = host.handle_line(r#"{"event":"install"}"#).await;
        assert_eq!(reply, HostReply::Installed { stored: 2, activated: false });
        assert_eq!(worker.state(), WorkerState::Installed);

        let reply = host.handle_line(r#"{"event":"message","data":{"type":"PING"}}"#).await;
        assert_eq!(reply, HostReply::Ignored);

        let reply = host.handle_line(r#"{"event":"message","data":{"type":"SKIP_WAITING"}}"#).await;
        assert_eq!(reply, HostReply::SkippedWaiting { activated: true });
        assert_eq!(worker.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_bad_lines_become_error_replies() {
        let network = Arc::new(StubNetwork::with_site());
        let (host, _) = host(config(), network).await;

        let reply = host.handle_line("not json").await;
        assert!(matches!(reply, HostReply::Error { code: "INVALID_INPUT", .. }));

        let reply = host.handle_line(r#"{"event":"fetch","url":"ftp://files.example.com/a"}"#).await;
        assert!(matches!(reply, HostReply::Error { code: "INVALID_URL", .. }));

        let reply = host.handle_line(r#"{"event":"activate"}"#).await;
        assert!(matches!(reply, HostReply::Error { code: "INVALID_STATE", .. }));
    }

    #[tokio::test]
    async fn test_serve_writes_replies_and_notification() {
        let network = Arc::new(StubNetwork::with_site());
        let (host, _) = host(config(), network).await;
        let input: &[u8] = b"{\"event\":\"install\"}\n\n{\"event\":\"settle\"}\n";
        let (mut reader, writer) = tokio::io::duplex(64 * 1024);

        host.serve(input, writer).await.unwrap();

        let mut output = String::new();
        reader.read_to_string(&mut output).await.unwrap();
        let lines: Vec<serde_json::Value> =
            output.lines().map(|line| serde_json::from_str(line).unwrap()).collect();

        assert_eq!(lines.len(), 3);
        assert!(lines.iter().any(|l| l["kind"] == "installed" && l["activated"] == true));
        assert!(lines.iter().any(|l| l["kind"] == "settled"));
        let note = lines.iter().find(|l| l["kind"] == "notification").unwrap();
        assert_eq!(note["message"]["type"], "APP_UPDATED");
        assert_eq!(note["message"]["version"], "4.0.0");
    }

    #[tokio::test]
    async fn test_failed_upgrade_served_by_previous_version() {
        let network = Arc::new(StubNetwork::with_site());
        let cache = CacheDb::open_in_memory().await.unwrap();
        let v3 = WorkerConfig { version: "3.0.0".into(), ..config() };
        let old = ServiceWorker::new(WorkerContext::new(v3, cache.clone(), network.clone()).unwrap());
        old.install().await.unwrap();

        network.offline.store(true, Ordering::SeqCst);
        let ctx = WorkerContext::new(config(), cache, network.clone()).unwrap();
        let previous = offcache_worker::resume::previous_controller(&ctx).await.unwrap().map(Arc::new);
        let host = Host::new(Arc::new(ServiceWorker::new(ctx)), network).with_previous(previous);

        let reply = host.handle_line(r#"{"event":"install"}"#).await;
        assert!(matches!(reply, HostReply::Error { code: "PRECACHE_FAILED", .. }));

        let reply = host.handle_line(r#"{"event":"fetch","url":"/books","accept":"text/html"}"#).await;
        assert!(matches!(reply, HostReply::Response { source: "offline", .. }));
    }

    #[test]
    fn test_binary_body_is_base64() {
        let png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0xff];
        let response =
            Response::new("https://app.example.com/icons/icon-192.png", 200, png.clone()).with_header("content-type", "image/png");

        match response_reply("cache", &response) {
            HostReply::Response { body, body_base64, .. } => {
                assert!(body.is_none());
                assert_eq!(STANDARD.decode(body_base64.unwrap()).unwrap(), png);
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_text_body_is_plain() {
        let response = Response::new("https://app.example.com/books.json", 200, "[]")
            .with_header("content-type", "application/json; charset=utf-8");
        let reply = response_reply("network", &response);
        assert!(matches!(reply, HostReply::Response { ref body, body_base64: None, .. } if body.as_deref() == Some("[]")));

        let mislabelled = Response::new("https://app.example.com/blob", 200, vec![0xff, 0xfe]).with_header("content-type", "text/plain");
        assert!(matches!(response_reply("network", &mislabelled), HostReply::Response { body: None, body_base64: Some(_), .. }));
    }

    #[test]
    fn test_fetch_command_defaults() {
        let command: HostCommand = serde_json::from_str(r#"{"event":"fetch","url":"/"}"#).unwrap();
        match command {
            HostCommand::Fetch { method, accept, .. } => {
                assert_eq!(method, "GET");
                assert!(accept.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
