//! Offline-caching worker for offcache.
//!
//! The worker owns one versioned cache store. Its lifecycle:
//!
//! 1. **install**: fetch every precache URL, store them atomically
//! 2. **activate**: delete stale stores, claim open pages, notify them
//! 3. **fetch**: cache-first, network fallback, offline page for HTML
//! 4. **message**: `SKIP_WAITING` forces a waiting worker to activate
//!
//! Events are routed through [`ServiceWorker::dispatch`]; every handler is
//! an async function the host awaits before treating the event as settled.

pub mod clients;
pub mod context;
pub mod control;
pub mod gc;
pub mod interceptor;
pub mod manifest;
pub mod notifier;
pub mod precache;
pub mod resume;
pub mod state;
pub mod tasks;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use clients::{ClientHandle, ClientId, ClientRegistry};
pub use context::WorkerContext;
pub use interceptor::FetchOutcome;
pub use manifest::PrecacheManifest;
pub use state::WorkerState;
pub use tasks::BackgroundTasks;
pub use worker::{ActivateReport, EventOutcome, InstallReport, ServiceWorker, WorkerEvent};
