//! Client code for shellcache.
//!
//! This crate provides the network fetcher and the cache controller that
//! sits between a host and the network, shared by the server and tests.

pub mod controller;
pub mod fetch;

pub use controller::{
    ActivateReport, BackgroundWork, CacheController, ControllerStatus, FetchOutcome, InstallReport, LifecycleState,
    Source,
};

pub use fetch::{FetchConfig, Fetcher, HttpFetcher};
