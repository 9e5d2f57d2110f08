//! Task descriptors handed to the pool by producers

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::worker::response::FetchResult;

/// Completion handler invoked once per processed task, on the worker thread
/// that produced the result.
///
/// Handlers for different tasks may run concurrently on different workers, so
/// any state they share must carry its own synchronization.
pub type Callback = Arc<dyn Fn(FetchResult) + Send + Sync + 'static>;

/// Request headers attached to a task
pub type HeadersMap = BTreeMap<String, String>;

/// One unit of requested work
///
/// A task without a target is accepted by the queue but skipped by the
/// workers: no result is produced for it.
#[derive(Clone, Default)]
pub struct Task {
    id: Uuid,
    target: Option<String>,
    payload: Map<String, Value>,
    headers: HeadersMap,
    proxy: Option<String>,
    callback: Option<Callback>,
}

impl Task {
    /// Create a task fetching `target`
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            target: Some(target.into()),
            ..Default::default()
        }
    }

    /// Create a task with no target set
    pub fn untargeted() -> Self {
        Self {
            id: Uuid::now_v7(),
            ..Default::default()
        }
    }

    /// Attach a metadata entry carried through to the result
    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Add a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Route this task through `proxy` instead of the fetcher's default
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Set the task-specific handler. It takes precedence over the pool default.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(FetchResult) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn with_shared_callback(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn headers(&self) -> &HeadersMap {
        &self.headers
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    pub fn callback(&self) -> Option<&Callback> {
        self.callback.as_ref()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("payload", &self.payload)
            .field("headers", &self.headers)
            .field("proxy", &self.proxy)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
