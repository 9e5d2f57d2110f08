//! Fetch outcomes handed to completion handlers

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use mime::Mime;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

use super::classify::FailureKind;
use super::http::FetchFailure;
use crate::task::Task;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("No response was received")]
    NoResponse,

    #[error("Response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A fully buffered HTTP response
///
/// The body is read on the worker thread so the response can be inspected
/// from any handler, on success and on HTTP status failures alike.
#[derive(Debug)]
pub struct HttpResponse {
    status: StatusCode,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
    text: OnceLock<String>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, url: Url, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            url,
            headers,
            body,
            text: OnceLock::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Final URL after redirects
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// `charset` parameter of the `Content-Type` header, if any
    pub fn charset(&self) -> Option<String> {
        let content_type = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let mime: Mime = content_type.parse().ok()?;
        mime.get_param(mime::CHARSET)
            .map(|charset| charset.as_str().to_string())
    }

    /// Body decoded with the charset announced by the server, UTF-8 when
    /// absent or unknown. Malformed sequences are replaced. Decoded on first
    /// access and cached.
    pub fn text(&self) -> &str {
        self.text.get_or_init(|| {
            let label = self.charset().unwrap_or_else(|| "utf-8".to_string());
            decode(&self.body, &label)
        })
    }

    /// Body decoded with an explicit charset label, ignoring the headers
    pub fn text_with_charset(&self, charset: &str) -> String {
        decode(&self.body, charset)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

fn decode(body: &[u8], label: &str) -> String {
    let encoding = Encoding::for_label(label.trim().as_bytes()).unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

/// Immutable outcome of processing one task
///
/// `failure_kind()` is `Some` exactly when `is_success()` is false. A response
/// may be present either way.
#[derive(Debug)]
pub struct FetchResult {
    task: Task,
    response: Option<HttpResponse>,
    failure: Option<FailureKind>,
    detail: Option<String>,
}

impl FetchResult {
    pub fn succeeded(task: Task, response: HttpResponse) -> Self {
        Self {
            task,
            response: Some(response),
            failure: None,
            detail: None,
        }
    }

    pub fn failed(task: Task, failure: FetchFailure) -> Self {
        Self {
            task,
            response: failure.response,
            failure: Some(failure.kind),
            detail: Some(failure.detail),
        }
    }

    pub fn from_outcome(task: Task, outcome: Result<HttpResponse, FetchFailure>) -> Self {
        match outcome {
            Ok(response) => Self::succeeded(task, response),
            Err(failure) => Self::failed(task, failure),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Consume the result, giving back the task it was produced for
    pub fn into_task(self) -> Task {
        self.task
    }

    pub fn target(&self) -> Option<&str> {
        self.task.target()
    }

    pub fn payload(&self) -> &Map<String, Value> {
        self.task.payload()
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
    }

    /// Transport-level description of the failure, if any
    pub fn failure_detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(HttpResponse::status)
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        self.response.as_ref().map(HttpResponse::bytes)
    }

    pub fn text(&self) -> Option<&str> {
        self.response.as_ref().map(HttpResponse::text)
    }

    pub fn text_with_charset(&self, charset: &str) -> Option<String> {
        self.response
            .as_ref()
            .map(|response| response.text_with_charset(charset))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
        let response = self.response.as_ref().ok_or(BodyError::NoResponse)?;
        Ok(response.json()?)
    }
}
