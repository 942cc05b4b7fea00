//! The cache controller.
//!
//! Owns the static and dynamic partitions of one version, runs the install
//! and activate events, and answers intercepted requests with one of three
//! strategies:
//!
//! | route | strategy |
//! |-------|----------|
//! | hashed/bundled assets | cache-first against the static partition |
//! | HTML navigation | stale-while-revalidate against the dynamic partition |
//! | everything else | network-first, falling back to any partition |
//!
//! Passthrough requests (non-GET, API, non-HTTP) go to the network untouched,
//! as does everything while the controller is not yet active.

mod background;
mod lifecycle;
mod strategy;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shellcache_core::{
    AppConfig, CacheRequest, CacheStorage, CachedResponse, EntryKey, Error, PassReason, RequestPolicy, Route,
};
use tokio::sync::RwLock;
use url::Url;

use crate::fetch::Fetcher;

pub use background::BackgroundWork;
pub use lifecycle::{ActivateReport, InstallReport, LifecycleState};

/// Where a returned response came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "partition")]
pub enum Source {
    Network,
    Cache(String),
}

/// Answer to an intercepted request.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub route: Route,
    pub source: Source,
    pub response: CachedResponse,
}

/// Snapshot of controller state for hosts.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ControllerStatus {
    pub state: LifecycleState,
    pub version: String,
    pub origin: String,
    pub static_partition: String,
    pub dynamic_partition: String,
    pub pending_writes: usize,
}

/// Request-intercepting cache controller for one version of the app shell.
pub struct CacheController {
    config: AppConfig,
    origin: Url,
    static_partition: String,
    dynamic_partition: String,
    storage: CacheStorage,
    policy: RequestPolicy,
    fetcher: Arc<dyn Fetcher>,
    state: RwLock<LifecycleState>,
    background: BackgroundWork,
}

impl std::fmt::Debug for CacheController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheController")
            .field("version", &self.config.version)
            .field("origin", &self.origin.as_str())
            .field("background", &self.background)
            .finish_non_exhaustive()
    }
}

impl CacheController {
    /// Build a controller for the version named in `config`.
    ///
    /// Partition names derive from `cache_prefix` and `version`; nothing is
    /// read or written until an event arrives.
    pub fn new(config: AppConfig, storage: CacheStorage, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        let policy = RequestPolicy::from_config(&config).map_err(|e| Error::InvalidInput(e.to_string()))?;

        Ok(Self {
            static_partition: config.static_partition(),
            dynamic_partition: config.dynamic_partition(),
            origin,
            storage,
            policy,
            fetcher,
            state: RwLock::new(LifecycleState::Parsed),
            background: BackgroundWork::new(),
            config,
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub async fn status(&self) -> ControllerStatus {
        ControllerStatus {
            state: self.state().await,
            version: self.config.version.clone(),
            origin: self.origin.to_string(),
            static_partition: self.static_partition.clone(),
            dynamic_partition: self.dynamic_partition.clone(),
            pending_writes: self.background.pending(),
        }
    }

    /// Identity under which `request` is stored.
    pub fn key_for(&self, request: &CacheRequest) -> EntryKey {
        EntryKey::for_request(request, &self.config.vary_headers)
    }

    /// Resolve a possibly relative URL against the origin into a request.
    pub fn request(&self, method: &str, url: &str) -> Result<CacheRequest, Error> {
        CacheRequest::resolve(method, &self.origin, url)
    }

    /// Handle the fetch event.
    ///
    /// Errors are network failures with no cached fallback; storage failures
    /// never surface here.
    pub async fn handle_fetch(&self, request: &CacheRequest) -> Result<FetchOutcome, Error> {
        if self.state().await != LifecycleState::Activated {
            tracing::debug!(url = %request.url, "controller inactive; passing through");
            return self.passthrough(request, PassReason::Inactive).await;
        }

        let route = self.policy.classify(request);
        tracing::debug!(url = %request.url, method = %request.method, %route, "classified request");

        match route {
            Route::Passthrough(reason) => self.passthrough(request, reason).await,
            Route::CacheFirst => self.cache_first(request).await,
            Route::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            Route::NetworkFirst => self.network_first(request).await,
        }
    }

    /// Wait for all detached cache writes to finish.
    pub async fn settle(&self) {
        self.background.settle().await;
    }
}
