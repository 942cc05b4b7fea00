//! Request identity hashing.

use sha2::{Digest, Sha256};

use crate::request::CacheRequest;

/// Compute the cache key for a request identity.
///
/// `vary` is the already-rendered list of `name:value` lines for the headers
/// that participate in matching.
pub fn compute_cache_key(method: &str, url: &str, vary: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(vary.as_bytes());
    hex::encode(hasher.finalize())
}

/// Identity of a stored entry: its hash plus the method and URL kept for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryKey {
    pub hash: String,
    pub method: String,
    pub url: String,
}

impl EntryKey {
    /// Derive the key for `request`, folding in the listed headers.
    ///
    /// Header names are matched case-insensitively; absent headers contribute
    /// an empty value so "missing" and "present" never collide.
    pub fn for_request(request: &CacheRequest, vary_headers: &[String]) -> Self {
        let vary = vary_headers
            .iter()
            .map(|name| {
                let name = name.to_ascii_lowercase();
                let value = request.header(&name).unwrap_or_default();
                format!("{name}:{value}")
            })
            .collect::<Vec<_>>()
            .join("\n");

        let url = request.url.as_str();
        Self {
            hash: compute_cache_key(&request.method, url, &vary),
            method: request.method.clone(),
            url: url.to_string(),
        }
    }
}
