//! Cache inspection tools.
//!
//! This module provides tools for looking into and reclaiming the partition
//! store without going through a fetch strategy.

pub mod get;
pub mod list;
pub mod purge;

pub use get::{CacheGetParams, get_impl};
pub use list::{CacheListParams, list_impl};
pub use purge::{CachePurgeParams, purge_impl};
