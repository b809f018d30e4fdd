//! Network layer for offcache.
//!
//! This crate provides URL resolution against the worker scope and the
//! HTTP fetch pipeline the worker falls back to on a cache miss.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network, NetworkError, UrlError, resolve};
