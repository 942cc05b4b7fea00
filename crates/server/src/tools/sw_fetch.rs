//! sw_fetch tool implementation.
//!
//! Delivers a fetch event to the controller and reports which strategy
//! answered and where the response came from.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{CacheController, Source};
use shellcache_core::Route;

use super::json_result;
use crate::error::HostError;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Accept header; `text/html` marks a navigation request.
    #[serde(default)]
    pub accept: Option<String>,

    /// Additional request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body, sent as-is. Only meaningful for non-GET methods.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    pub route: Route,
    pub source: Source,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub body: String,
    pub body_bytes: usize,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(controller: &CacheController, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(HostError::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() {
        return Err(HostError::InvalidInput("method cannot be empty".into()).into());
    }

    let mut request = controller.request(&params.method, &params.url)?;
    for (name, value) in params.headers {
        request = request.with_header(&name, value);
    }
    if let Some(accept) = params.accept {
        request = request.with_header("accept", accept);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let outcome = controller.handle_fetch(&request).await?;
    let response = outcome.response;

    json_result(&SwFetchOutput {
        url: request.url.to_string(),
        route: outcome.route,
        source: outcome.source,
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
        body_bytes: response.body.len(),
        headers: response.headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::lifecycle::install_impl;
    use shellcache_core::PassReason;
    use crate::tools::testing::{controller, output, shell};

    fn params(url: &str, accept: Option<&str>) -> SwFetchParams {
        SwFetchParams {
            url: url.into(),
            method: default_method(),
            accept: accept.map(String::from),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let controller = controller(shell()).await;
        let err = fetch_impl(&controller, params("  ", None)).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_fetch_navigation_after_install() {
        let fetcher = shell();
        let controller = controller(fetcher.clone()).await;
        install_impl(&controller).await.unwrap();

        let first: SwFetchOutput = output(&fetch_impl(&controller, params("/app", Some("text/html"))).await.unwrap());
        assert_eq!(first.route, Route::StaleWhileRevalidate);
        assert_eq!(first.source, Source::Network);
        assert_eq!(first.body, "<h1>app</h1>");
        assert_eq!(first.url, "https://reset.example/app");
        controller.settle().await;

        fetcher.pages.lock().unwrap().clear();
        let second: SwFetchOutput = output(&fetch_impl(&controller, params("/app", Some("text/html"))).await.unwrap());
        controller.settle().await;
        assert_eq!(second.source, Source::Cache("metabolic-reset-dynamic-v1".into()));
        assert_eq!(second.body_bytes, 12);
    }

    #[tokio::test]
    async fn test_fetch_post_passes_body_through() {
        let fetcher = shell();
        fetcher.serve("/api/meals", "created");
        let controller = controller(fetcher.clone()).await;
        install_impl(&controller).await.unwrap();

        let post = SwFetchParams {
            method: "POST".into(),
            body: Some(r#"{"kcal":420}"#.into()),
            ..params("/api/meals", None)
        };
        let out: SwFetchOutput = output(&fetch_impl(&controller, post).await.unwrap());
        assert_eq!(out.route, Route::Passthrough(PassReason::Method));
        assert_eq!(out.body, "created");

        let received = fetcher.received.lock().unwrap();
        let sent = received.last().unwrap();
        assert_eq!(sent.method, "POST");
        assert_eq!(sent.body.as_deref(), Some(br#"{"kcal":420}"#.as_slice()));
    }

    #[tokio::test]
    async fn test_fetch_network_failure_maps_error() {
        let controller = controller(shell()).await;
        install_impl(&controller).await.unwrap();

        let err = fetch_impl(&controller, params("/api/habits", None)).await.unwrap_err();
        assert_eq!(err.code.0, -32008);
    }
}
