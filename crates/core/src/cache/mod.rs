//! SQLite-backed versioned cache storage.
//!
//! This module provides named request/response stores persisted in SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named stores created on first write and deleted as a whole
//! - Entries keyed by SHA-256 of method and URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedEntry;
