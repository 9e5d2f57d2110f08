//! HTTP client for fetching task targets

use parking_lot::Mutex;
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Proxy, redirect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::classify::{self, FailureKind};
use super::response::HttpResponse;
use crate::task::{HeadersMap, Task};

#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("Invalid proxy '{proxy}': {message}")]
    InvalidProxy { proxy: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// A fetch that did not succeed
///
/// `response` is present when the server answered (non-2xx status) so the
/// caller can still inspect status, headers and body.
#[derive(Debug, Error)]
#[error("{kind} ({detail})")]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub response: Option<HttpResponse>,
    pub detail: String,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            response: None,
            detail: detail.into(),
        }
    }
}

/// Performs one GET for a task. Implementations never panic on network
/// errors; every outcome is either a response or a classified failure.
pub trait Fetch: Send + Sync {
    fn fetch(&self, task: &Task) -> Result<HttpResponse, FetchFailure>;
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Proxy applied to every task that does not carry its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            proxy: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    format!("fetchpool/{}", env!("CARGO_PKG_VERSION"))
}

/// Blocking HTTP fetcher shared by all workers
///
/// Holds one client for the default route plus a lazily filled cache of
/// clients for per-task proxies.
pub struct HttpFetcher {
    client: Client,
    config: HttpConfig,
    proxied: Mutex<HashMap<String, Client>>,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher
    pub fn new(config: HttpConfig) -> Result<Self, FetcherError> {
        let mut builder = Self::builder(&config);

        if let Some(url) = config.proxy.as_deref() {
            let proxy = Proxy::all(url).map_err(|e| FetcherError::InvalidProxy {
                proxy: url.to_string(),
                message: e.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| FetcherError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            config,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_defaults() -> Result<Self, FetcherError> {
        Self::new(HttpConfig::default())
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// One-off fetch of `target` with no task metadata
    pub fn get(&self, target: &str) -> Result<HttpResponse, FetchFailure> {
        self.fetch(&Task::new(target))
    }

    fn builder(config: &HttpConfig) -> ClientBuilder {
        Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .redirect(redirect::Policy::limited(config.max_redirects))
    }

    /// Client routed through `proxy`, built on first use
    fn client_for_proxy(&self, proxy: &str) -> Result<Client, FetchFailure> {
        if let Some(client) = self.proxied.lock().get(proxy) {
            return Ok(client.clone());
        }

        let route = Proxy::all(proxy).map_err(|e| {
            FetchFailure::new(
                FailureKind::InvalidProxyUrl,
                format!("invalid proxy '{}': {}", proxy, classify::describe(&e)),
            )
        })?;

        let client = Self::builder(&self.config)
            .proxy(route)
            .build()
            .map_err(|e| {
                FetchFailure::new(FailureKind::InvalidProxyUrl, classify::describe(&e))
            })?;

        let client = self
            .proxied
            .lock()
            .entry(proxy.to_string())
            .or_insert(client)
            .clone();
        Ok(client)
    }

    fn request_headers(headers: &HeadersMap) -> Result<HeaderMap, FetchFailure> {
        classify::validate_headers(headers).map_err(|name| {
            FetchFailure::new(
                FailureKind::InvalidHeader,
                format!("invalid header '{}'", name),
            )
        })?;

        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            // Both parse: validated above
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                map.insert(name, value);
            }
        }
        Ok(map)
    }

    fn send(
        &self,
        client: &Client,
        url: Url,
        headers: HeaderMap,
        via_proxy: bool,
    ) -> Result<HttpResponse, FetchFailure> {
        debug!(url = %url, "Starting download");

        let response = client
            .get(url.clone())
            .headers(headers)
            .send()
            .map_err(|e| transport_failure(&e, via_proxy))?;

        let status = response.status();
        let final_url = response.url().clone();
        let response_headers = response.headers().clone();

        let body = response
            .bytes()
            .map_err(|e| transport_failure(&e, via_proxy))?;

        debug!(url = %url, status = status.as_u16(), size = body.len(), "Download completed");

        let response = HttpResponse::new(status, final_url, response_headers, body);

        if !status.is_success() {
            return Err(FetchFailure {
                kind: FailureKind::HttpStatus,
                detail: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
                response: Some(response),
            });
        }

        Ok(response)
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, task: &Task) -> Result<HttpResponse, FetchFailure> {
        let target = task.target().unwrap_or_default();
        let url = classify::parse_target(target)
            .map_err(|kind| FetchFailure::new(kind, format!("rejected target '{}'", target)))?;

        let headers = Self::request_headers(task.headers())?;

        match task.proxy() {
            Some(proxy) => {
                let client = self.client_for_proxy(proxy)?;
                self.send(&client, url, headers, true)
            }
            None => self.send(&self.client, url, headers, self.config.proxy.is_some()),
        }
    }
}

fn transport_failure(err: &reqwest::Error, via_proxy: bool) -> FetchFailure {
    let kind = classify::classify(err, via_proxy);
    let detail = if kind == FailureKind::Unexpected {
        format!("{}; {:?}", classify::describe(err), err)
    } else {
        classify::describe(err)
    };
    FetchFailure::new(kind, detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.max_redirects, 10);
        assert!(config.user_agent.starts_with("fetchpool/"));
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_invalid_default_proxy_is_rejected() {
        let config = HttpConfig {
            proxy: Some("not a proxy url".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            HttpFetcher::new(config),
            Err(FetcherError::InvalidProxy { .. })
        ));
    }

    #[test]
    fn test_request_errors_are_classified_before_sending() {
        let fetcher = HttpFetcher::with_defaults().unwrap();

        let kind = |task: Task| fetcher.fetch(&task).unwrap_err().kind;

        assert_eq!(kind(Task::untargeted()), FailureKind::UrlRequired);
        assert_eq!(kind(Task::new("")), FailureKind::UrlRequired);
        assert_eq!(kind(Task::new("example.com/x")), FailureKind::MissingUrlScheme);
        assert_eq!(kind(Task::new("ftp://example.com/x")), FailureKind::InvalidUrlScheme);
        assert_eq!(kind(Task::new("http://")), FailureKind::InvalidUrl);
        assert_eq!(
            kind(Task::new("http://example.com/").with_header("bad header", "x")),
            FailureKind::InvalidHeader
        );
        assert_eq!(
            kind(Task::new("http://example.com/").with_proxy("not a proxy url")),
            FailureKind::InvalidProxyUrl
        );
    }

    #[test]
    fn test_request_errors_carry_no_response() {
        let fetcher = HttpFetcher::with_defaults().unwrap();
        let failure = fetcher.get("nope").unwrap_err();
        assert!(failure.response.is_none());
        assert!(failure.detail.contains("nope"));
    }
}
