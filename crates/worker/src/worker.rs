//! The worker state machine and event dispatch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use offcache_core::{ControlMessage, Error, Request};
use tokio::sync::Mutex;

use crate::clients::ClientRegistry;
use crate::context::WorkerContext;
use crate::control;
use crate::gc;
use crate::interceptor::{self, FetchOutcome};
use crate::notifier;
use crate::precache;
use crate::state::WorkerState;

/// Events delivered by the host runtime.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Message(serde_json::Value),
}

/// Result of a completed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Entries written to the current store.
    pub stored: usize,
    /// Present when the worker skipped waiting and activated right away.
    pub activated: Option<ActivateReport>,
}

/// Result of a completed activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub claimed: usize,
    pub notified: usize,
}

/// What handling an event produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetched(FetchOutcome),
    /// `SKIP_WAITING` received; carries the activation it triggered, if any.
    SkippedWaiting(Option<ActivateReport>),
    Ignored,
}

/// One worker version.
pub struct ServiceWorker {
    ctx: WorkerContext,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    lifecycle: Mutex<()>,
}

impl ServiceWorker {
    pub fn new(ctx: WorkerContext) -> Self {
        Self {
            ctx,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.ctx.clients
    }

    /// Whether skip waiting has been requested for this version.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Route an event to its handler.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        match event {
            WorkerEvent::Install => self.install().await.map(EventOutcome::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => self.fetch(request).await.map(EventOutcome::Fetched),
            WorkerEvent::Message(data) => self.message(&data).await,
        }
    }

    /// Precache, then skip waiting if configured to.
    ///
    /// A failed precache makes this version redundant; whatever version was
    /// active before keeps serving from its own store.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let stored = {
            let _lifecycle = self.lifecycle.lock().await;
            self.transition(WorkerState::Parsed, WorkerState::Installing)?;
            tracing::info!(version = %self.ctx.config.version, "worker installing");

            match precache::install(&self.ctx).await {
                Ok(stored) => {
                    self.set_state(WorkerState::Installed);
                    stored
                }
                Err(e) => {
                    self.set_state(WorkerState::Redundant);
                    tracing::error!(version = %self.ctx.config.version, error = %e, "install failed");
                    return Err(e);
                }
            }
        };

        tracing::info!(version = %self.ctx.config.version, stored, "worker installed");

        let activated = if self.ctx.config.skip_waiting_on_install || self.skip_waiting_requested() {
            self.skip_waiting().await?
        } else {
            None
        };

        Ok(InstallReport { stored, activated })
    }

    /// Put back in control a version that an earlier run of the host
    /// activated.
    ///
    /// A store only exists once a full precache has committed, so finding
    /// this version's store is enough. When the offline page is precached it
    /// must be in the store too. Returns `false` when there is nothing to
    /// resume; the worker then stays parsed and can still install.
    pub async fn resume(&self) -> Result<bool, Error> {
        let _lifecycle = self.lifecycle.lock().await;
        let state = self.state();
        if state != WorkerState::Parsed {
            return Err(Error::InvalidState { expected: WorkerState::Parsed.to_string(), actual: state.to_string() });
        }

        let store = self.ctx.cache_name();
        if !self.ctx.cache.has_store(&store).await? {
            return Ok(false);
        }
        if self.ctx.manifest.contains(&self.ctx.offline_url) {
            let offline = Request::get(self.ctx.offline_url.clone());
            if self.ctx.cache.match_entry(&store, &offline).await?.is_none() {
                tracing::warn!(store = %store, "persisted store lacks the offline page");
                return Ok(false);
            }
        }

        self.set_state(WorkerState::Activated);
        let claimed = self.ctx.clients.claim().await;
        tracing::info!(version = %self.ctx.config.version, store = %store, claimed, "worker resumed");
        Ok(true)
    }

    /// Host-driven activation of an installed worker.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let _lifecycle = self.lifecycle.lock().await;
        self.transition(WorkerState::Installed, WorkerState::Activating)?;
        Ok(self.run_activation().await)
    }

    /// Leave the waiting state now instead of waiting for pages to close.
    ///
    /// Activates immediately if installed; otherwise the request is only
    /// recorded.
    pub async fn skip_waiting(&self) -> Result<Option<ActivateReport>, Error> {
        self.skip_waiting.store(true, Ordering::SeqCst);

        let _lifecycle = self.lifecycle.lock().await;
        if !self.state().is_waiting() {
            tracing::debug!(state = %self.state(), "skip waiting recorded");
            return Ok(None);
        }
        self.transition(WorkerState::Installed, WorkerState::Activating)?;
        Ok(Some(self.run_activation().await))
    }

    /// Intercept a request. Only an activated worker handles fetches.
    pub async fn fetch(&self, request: Request) -> Result<FetchOutcome, Error> {
        if !self.state().can_intercept_fetch() {
            return Ok(FetchOutcome::PassThrough);
        }
        Ok(interceptor::handle(&self.ctx, request).await)
    }

    /// Handle a message posted by a page.
    pub async fn message(&self, data: &serde_json::Value) -> Result<EventOutcome, Error> {
        match control::recognize(data) {
            Some(ControlMessage::SkipWaiting) => self.skip_waiting().await.map(EventOutcome::SkippedWaiting),
            None => Ok(EventOutcome::Ignored),
        }
    }

    /// Wait for background cache writes to finish.
    pub async fn settle(&self) -> usize {
        self.ctx.tasks.settle().await
    }

    /// Garbage collection and claim run together; pages hear about the
    /// update only once both have settled. Caller holds the lifecycle lock.
    async fn run_activation(&self) -> ActivateReport {
        tracing::info!(version = %self.ctx.config.version, "worker activating");

        let (deleted, claimed) = tokio::join!(gc::collect_stale(&self.ctx), self.ctx.clients.claim());
        self.set_state(WorkerState::Activated);
        tracing::info!(version = %self.ctx.config.version, deleted = deleted.len(), claimed, "worker activated");

        let notified = notifier::broadcast_update(&self.ctx).await;

        ActivateReport { deleted, claimed, notified }
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *state != from {
            return Err(Error::InvalidState { expected: from.to_string(), actual: state.to_string() });
        }
        *state = to;
        Ok(())
    }

    fn set_state(&self, to: WorkerState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = to;
    }
}
