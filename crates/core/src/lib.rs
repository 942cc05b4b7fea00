//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Partition storage with SQLite backend
//! - Request classification policy
//! - Request/response snapshots
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod policy;
pub mod request;
pub mod url;

pub use cache::{CacheStorage, EntryKey, Partition};
pub use config::AppConfig;
pub use error::Error;
pub use policy::{PassReason, RequestPolicy, Route};
pub use request::{CacheRequest, CachedResponse};
