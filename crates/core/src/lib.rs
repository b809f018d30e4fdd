//! Core types and shared functionality for offcache.
//!
//! This crate provides:
//! - Versioned cache storage with SQLite backend
//! - Request/response value types
//! - Control and notification message protocol
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod protocol;

pub use cache::CacheDb;
pub use config::{ConfigError, LookupScope, WorkerConfig};
pub use error::Error;
pub use http::{Request, Response};
pub use protocol::{ControlMessage, OutboundMessage};
