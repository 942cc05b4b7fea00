//! Request-handling strategies.
//!
//! Every write to a partition is handed to [`BackgroundWork`] rather than
//! awaited, and its failure is logged. Lookup failures count as misses.

use shellcache_core::{CacheRequest, CachedResponse, EntryKey, Error, PassReason, Partition, Route};

use super::{BackgroundWork, CacheController, FetchOutcome, Source};

/// Store `response` in `partition` without holding up the response path.
fn store_detached(background: &BackgroundWork, partition: Partition, key: EntryKey, response: CachedResponse) {
    background.wait_until(async move {
        match partition.put(&key, &response).await {
            Ok(()) => tracing::debug!(partition = %partition.name(), url = %key.url, "stored response"),
            Err(e) => tracing::warn!(partition = %partition.name(), url = %key.url, error = %e, "cache write failed"),
        }
    });
}

async fn lookup_or_miss(partition: &Partition, key: &EntryKey) -> Option<CachedResponse> {
    match partition.lookup(key).await {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!(
                partition = %partition.name(),
                url = %key.url,
                error = %e,
                "cache read failed; treating as miss"
            );
            None
        }
    }
}

impl CacheController {
    pub(super) async fn passthrough(&self, request: &CacheRequest, reason: PassReason) -> Result<FetchOutcome, Error> {
        let response = self.fetcher.fetch(request).await?;
        Ok(FetchOutcome { route: Route::Passthrough(reason), source: Source::Network, response })
    }

    /// Serve from the static partition; fetch and store on a miss.
    pub(super) async fn cache_first(&self, request: &CacheRequest) -> Result<FetchOutcome, Error> {
        let key = self.key_for(request);
        let partition = self.storage.open_partition(&self.static_partition);

        if let Some(response) = lookup_or_miss(&partition, &key).await {
            tracing::debug!(url = %request.url, "static hit");
            return Ok(FetchOutcome {
                route: Route::CacheFirst,
                source: Source::Cache(self.static_partition.clone()),
                response,
            });
        }

        let response = self.fetcher.fetch(request).await?;
        if response.is_success() {
            store_detached(&self.background, partition, key, response.clone());
        }

        Ok(FetchOutcome { route: Route::CacheFirst, source: Source::Network, response })
    }

    /// Serve the cached page at once while a network fetch refreshes it.
    ///
    /// With no cached page the caller waits for the network instead.
    pub(super) async fn stale_while_revalidate(&self, request: &CacheRequest) -> Result<FetchOutcome, Error> {
        let key = self.key_for(request);
        let partition = self.storage.open_partition(&self.dynamic_partition);

        let revalidate = {
            let fetcher = self.fetcher.clone();
            let background = self.background.clone();
            let partition = partition.clone();
            let key = key.clone();
            let request = request.clone();
            tokio::spawn(async move {
                let response = fetcher.fetch(&request).await?;
                if response.is_success() {
                    store_detached(&background, partition, key, response.clone());
                }
                Ok::<_, Error>(response)
            })
        };

        if let Some(response) = lookup_or_miss(&partition, &key).await {
            tracing::debug!(url = %request.url, "serving stale page; revalidating");
            let url = request.url.clone();
            self.background.wait_until(async move {
                match revalidate.await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::debug!(%url, error = %e, "revalidation failed; stale page kept"),
                    Err(e) => tracing::warn!(%url, error = %e, "revalidation task aborted"),
                }
            });
            return Ok(FetchOutcome {
                route: Route::StaleWhileRevalidate,
                source: Source::Cache(self.dynamic_partition.clone()),
                response,
            });
        }

        let response = revalidate
            .await
            .map_err(|e| Error::Network(format!("revalidation task aborted: {e}")))??;

        Ok(FetchOutcome { route: Route::StaleWhileRevalidate, source: Source::Network, response })
    }

    /// Prefer the network; fall back to a copy in any partition when it fails.
    pub(super) async fn network_first(&self, request: &CacheRequest) -> Result<FetchOutcome, Error> {
        let key = self.key_for(request);

        let err = match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    let partition = self.storage.open_partition(&self.dynamic_partition);
                    store_detached(&self.background, partition, key, response.clone());
                }
                return Ok(FetchOutcome { route: Route::NetworkFirst, source: Source::Network, response });
            }
            Err(e) => e,
        };

        match self.storage.match_any(&key).await {
            Ok(Some(hit)) => {
                tracing::debug!(
                    url = %request.url,
                    partition = %hit.partition,
                    error = %err,
                    "network failed; serving cached copy"
                );
                Ok(FetchOutcome {
                    route: Route::NetworkFirst,
                    source: Source::Cache(hit.partition),
                    response: hit.response,
                })
            }
            Ok(None) => Err(err),
            Err(storage_err) => {
                tracing::warn!(url = %request.url, error = %storage_err, "cache read failed during fallback");
                Err(err)
            }
        }
    }
}
