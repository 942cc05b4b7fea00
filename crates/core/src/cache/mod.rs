//! SQLite-backed partition store.
//!
//! This module provides persistent, named cache partitions using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Request identities hashed with SHA-256 (method, URL, vary headers)
//! - Lazy partition creation and cascading partition deletes
//! - Atomic multi-entry writes for precaching
//! - Cross-partition matching and quota-style eviction

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod partitions;

pub use crate::Error;

pub use connection::CacheStorage;
pub use hash::EntryKey;
pub use partitions::{EntryMeta, MatchedEntry, Partition, PartitionStats};
