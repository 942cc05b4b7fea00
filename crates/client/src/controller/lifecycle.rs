//! Install and activate events.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use shellcache_core::{CacheRequest, EntryKey, Error};

use super::CacheController;

/// Where the controller is in its lifecycle.
///
/// `Installed` is the waiting state: the shell is stored but requests are not
/// yet intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

/// Outcome of a successful install.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub version: String,
    pub partition: String,
    pub precached: Vec<String>,
    /// The controller asks to activate without waiting for old clients to close.
    pub skip_waiting: bool,
}

/// Outcome of a successful activation.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivateReport {
    pub version: String,
    pub deleted: Vec<String>,
    /// Open clients were taken over without a reload.
    pub claimed: bool,
}

impl CacheController {
    /// Move from `from` to `to`, failing if another event got there first.
    async fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(Error::InvalidState(format!("expected {from:?}, controller is {:?}", *state)));
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: LifecycleState) {
        *self.state.write().await = to;
    }

    /// Handle the install event.
    ///
    /// Fetches the whole precache manifest and stores it in the static
    /// partition in one transaction. A single failed fetch (transport error or
    /// non-2xx status) aborts the install with nothing written and returns
    /// the controller to `Parsed` so the host can retry.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(LifecycleState::Parsed, LifecycleState::Installing).await?;
        tracing::info!(version = %self.config.version, entries = self.config.precache.len(), "install started");

        match self.precache().await {
            Ok(precached) => {
                self.set_state(LifecycleState::Installed).await;
                tracing::info!(version = %self.config.version, "install complete; skipping wait");
                Ok(InstallReport {
                    version: self.config.version.clone(),
                    partition: self.static_partition.clone(),
                    precached,
                    skip_waiting: true,
                })
            }
            Err(e) => {
                self.set_state(LifecycleState::Parsed).await;
                tracing::error!(version = %self.config.version, error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<Vec<String>, Error> {
        let requests = self
            .config
            .precache
            .iter()
            .map(|path| {
                CacheRequest::resolve("GET", &self.origin, path).map_err(|e| Error::InstallFailed {
                    url: path.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let fetched = join_all(requests.iter().map(|request| self.fetcher.fetch(request))).await;

        let mut entries = Vec::with_capacity(requests.len());
        for (request, result) in requests.iter().zip(fetched) {
            let response =
                result.map_err(|e| Error::InstallFailed { url: request.url.to_string(), reason: e.to_string() })?;
            if !response.is_success() {
                return Err(Error::InstallFailed {
                    url: request.url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            entries.push((EntryKey::for_request(request, &self.config.vary_headers), response));
        }

        let urls = requests.iter().map(|r| r.url.to_string()).collect();
        self.storage.open_partition(&self.static_partition).put_all(entries).await?;
        Ok(urls)
    }

    /// Handle the activate event.
    ///
    /// Deletes every partition that does not belong to the current version,
    /// then claims open clients. Requests are intercepted only once this
    /// completes.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.transition(LifecycleState::Installed, LifecycleState::Activating).await?;

        match self.evict_stale_partitions().await {
            Ok(deleted) => {
                self.set_state(LifecycleState::Activated).await;
                tracing::info!(version = %self.config.version, deleted = deleted.len(), "activated; clients claimed");
                Ok(ActivateReport { version: self.config.version.clone(), deleted, claimed: true })
            }
            Err(e) => {
                self.set_state(LifecycleState::Installed).await;
                tracing::error!(version = %self.config.version, error = %e, "activation failed");
                Err(e)
            }
        }
    }

    async fn evict_stale_partitions(&self) -> Result<Vec<String>, Error> {
        let current = self.config.current_partitions();
        let mut deleted = Vec::new();
        for name in self.storage.partition_names().await? {
            if current.contains(&name) {
                continue;
            }
            if self.storage.delete_partition(&name).await? {
                tracing::info!(partition = %name, "deleted stale partition");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Pick up where a previous process left off.
    ///
    /// If the current version's shell is already fully stored, the install
    /// fetches are skipped and the controller goes straight to activation
    /// (which still evicts stale partitions). Returns `None` when a fresh
    /// install is needed.
    pub async fn resume(&self) -> Result<Option<ActivateReport>, Error> {
        if !self.storage.has_partition(&self.static_partition).await? {
            return Ok(None);
        }

        let partition = self.storage.open_partition(&self.static_partition);
        for path in &self.config.precache {
            let request = CacheRequest::resolve("GET", &self.origin, path)?;
            if partition.lookup(&EntryKey::for_request(&request, &self.config.vary_headers)).await?.is_none() {
                tracing::info!(url = %request.url, "stored shell incomplete; full install required");
                return Ok(None);
            }
        }

        self.transition(LifecycleState::Parsed, LifecycleState::Installed).await?;
        tracing::info!(version = %self.config.version, "stored shell found; resuming");
        self.activate().await.map(Some)
    }
}
