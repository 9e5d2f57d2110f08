//! Failure taxonomy and the single function mapping transport errors onto it

use reqwest::header::{HeaderName, HeaderValue};
use std::error::Error as StdError;
use std::io;
use thiserror::Error;
use url::Url;

use crate::task::HeadersMap;

/// Why a fetch did not succeed. Closed: every failure maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum FailureKind {
    #[error("the server answered with a non-success HTTP status")]
    HttpStatus,

    #[error("a proxy error occurred")]
    Proxy,

    #[error("a TLS error occurred")]
    Tls,

    #[error("timed out while connecting to the remote server")]
    ConnectTimeout,

    #[error("the server sent no data in the allotted time")]
    ReadTimeout,

    #[error("the request deadline expired while the body was being read")]
    Timeout,

    #[error("a connection error occurred")]
    Connection,

    #[error("the URL scheme (e.g. http or https) is missing")]
    MissingUrlScheme,

    #[error("the URL scheme is not supported")]
    InvalidUrlScheme,

    #[error("the URL is invalid")]
    InvalidUrl,

    #[error("a request header is invalid")]
    InvalidHeader,

    #[error("the proxy URL is invalid")]
    InvalidProxyUrl,

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("a URL is required to make a request")]
    UrlRequired,

    #[error("an unexpected error occurred")]
    Unexpected,
}

impl FailureKind {
    /// Stable identifier used in log fields and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::HttpStatus => "http_status",
            FailureKind::Proxy => "proxy",
            FailureKind::Tls => "tls",
            FailureKind::ConnectTimeout => "connect_timeout",
            FailureKind::ReadTimeout => "read_timeout",
            FailureKind::Timeout => "timeout",
            FailureKind::Connection => "connection",
            FailureKind::MissingUrlScheme => "missing_url_scheme",
            FailureKind::InvalidUrlScheme => "invalid_url_scheme",
            FailureKind::InvalidUrl => "invalid_url",
            FailureKind::InvalidHeader => "invalid_header",
            FailureKind::InvalidProxyUrl => "invalid_proxy_url",
            FailureKind::TooManyRedirects => "too_many_redirects",
            FailureKind::UrlRequired => "url_required",
            FailureKind::Unexpected => "unexpected",
        }
    }

    /// Whether the failure was detected before any network I/O
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            FailureKind::MissingUrlScheme
                | FailureKind::InvalidUrlScheme
                | FailureKind::InvalidUrl
                | FailureKind::InvalidHeader
                | FailureKind::InvalidProxyUrl
                | FailureKind::UrlRequired
        )
    }
}

/// Validate a task target before it reaches the transport
pub fn parse_target(target: &str) -> Result<Url, FailureKind> {
    let target = target.trim();
    if target.is_empty() {
        return Err(FailureKind::UrlRequired);
    }

    let url = Url::parse(target).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => FailureKind::MissingUrlScheme,
        _ => FailureKind::InvalidUrl,
    })?;

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(FailureKind::InvalidUrlScheme),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(FailureKind::InvalidUrl);
    }

    Ok(url)
}

/// Validate task headers. Returns the first offending header name on failure.
pub fn validate_headers(headers: &HeadersMap) -> Result<(), String> {
    for (name, value) in headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err()
            || HeaderValue::from_str(value).is_err()
        {
            return Err(name.clone());
        }
    }
    Ok(())
}

/// Map a transport error onto the taxonomy
///
/// `via_proxy` tells whether the request was routed through a proxy, in which
/// case a failure to connect is a failure to reach the proxy.
pub fn classify(err: &reqwest::Error, via_proxy: bool) -> FailureKind {
    if err.is_redirect() {
        return FailureKind::TooManyRedirects;
    }

    if err.is_timeout() || chain_has_io_kind(err, &[io::ErrorKind::TimedOut]) {
        // Connected but no response in time is a read timeout; the deadline
        // running out while the body streams in is the overall timeout
        return if err.is_connect() {
            FailureKind::ConnectTimeout
        } else if err.is_body() || err.is_decode() {
            FailureKind::Timeout
        } else {
            FailureKind::ReadTimeout
        };
    }

    let chain = chain_text(err);
    if ["certificate", "tls", "ssl", "handshake"]
        .iter()
        .any(|needle| chain.contains(needle))
    {
        return FailureKind::Tls;
    }

    if chain.contains("proxy") || (via_proxy && err.is_connect()) {
        return FailureKind::Proxy;
    }

    if err.is_connect()
        || chain_has_io_kind(
            err,
            &[
                io::ErrorKind::ConnectionRefused,
                io::ErrorKind::ConnectionReset,
                io::ErrorKind::ConnectionAborted,
                io::ErrorKind::NotConnected,
                io::ErrorKind::AddrNotAvailable,
                io::ErrorKind::BrokenPipe,
                io::ErrorKind::UnexpectedEof,
            ],
        )
    {
        return FailureKind::Connection;
    }

    FailureKind::Unexpected
}

/// Every message below the top-level error, lowercased and joined. The top
/// level is skipped because it embeds the request URL.
fn chain_text(err: &reqwest::Error) -> String {
    let mut text = String::new();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(" | ");
        text.push_str(&cause.to_string().to_lowercase());
        source = cause.source();
    }
    text
}

fn chain_has_io_kind(err: &reqwest::Error, kinds: &[io::ErrorKind]) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if kinds.contains(&io_err.kind()) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Full diagnostic rendering of an error: display text plus every source
pub fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_accepts_http_and_https() {
        assert!(parse_target("http://example.com/a.png").is_ok());
        assert!(parse_target("https://example.com:8443/x?y=1").is_ok());
        assert!(parse_target("  https://example.com/  ").is_ok());
    }

    #[test]
    fn test_parse_target_empty() {
        assert_eq!(parse_target(""), Err(FailureKind::UrlRequired));
        assert_eq!(parse_target("   "), Err(FailureKind::UrlRequired));
    }

    #[test]
    fn test_parse_target_missing_scheme() {
        assert_eq!(
            parse_target("example.com/page/1"),
            Err(FailureKind::MissingUrlScheme)
        );
        assert_eq!(parse_target("/relative"), Err(FailureKind::MissingUrlScheme));
    }

    #[test]
    fn test_parse_target_invalid_scheme() {
        assert_eq!(
            parse_target("ftp://example.com/file"),
            Err(FailureKind::InvalidUrlScheme)
        );
        assert_eq!(
            parse_target("mailto:someone@example.com"),
            Err(FailureKind::InvalidUrlScheme)
        );
    }

    #[test]
    fn test_parse_target_invalid_url() {
        assert_eq!(parse_target("http://"), Err(FailureKind::InvalidUrl));
        assert_eq!(
            parse_target("http://exa mple.com/"),
            Err(FailureKind::InvalidUrl)
        );
        assert_eq!(parse_target("http://[::1/"), Err(FailureKind::InvalidUrl));
    }

    #[test]
    fn test_validate_headers() {
        let mut headers = HeadersMap::new();
        headers.insert("Referer".to_string(), "https://example.com/".to_string());
        assert!(validate_headers(&headers).is_ok());

        headers.insert("Bad Header".to_string(), "x".to_string());
        assert_eq!(validate_headers(&headers), Err("Bad Header".to_string()));

        let mut headers = HeadersMap::new();
        headers.insert("X-Value".to_string(), "line\nbreak".to_string());
        assert_eq!(validate_headers(&headers), Err("X-Value".to_string()));
    }

    #[test]
    fn test_failure_kind_identifiers_are_unique() {
        let kinds = [
            FailureKind::HttpStatus,
            FailureKind::Proxy,
            FailureKind::Tls,
            FailureKind::ConnectTimeout,
            FailureKind::ReadTimeout,
            FailureKind::Timeout,
            FailureKind::Connection,
            FailureKind::MissingUrlScheme,
            FailureKind::InvalidUrlScheme,
            FailureKind::InvalidUrl,
            FailureKind::InvalidHeader,
            FailureKind::InvalidProxyUrl,
            FailureKind::TooManyRedirects,
            FailureKind::UrlRequired,
            FailureKind::Unexpected,
        ];
        let ids: std::collections::HashSet<_> = kinds.iter().map(FailureKind::as_str).collect();
        assert_eq!(ids.len(), kinds.len());
    }

    #[test]
    fn test_request_errors() {
        assert!(FailureKind::UrlRequired.is_request_error());
        assert!(FailureKind::InvalidHeader.is_request_error());
        assert!(!FailureKind::HttpStatus.is_request_error());
        assert!(!FailureKind::Connection.is_request_error());
    }
}
