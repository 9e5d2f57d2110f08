#![allow(dead_code)]

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use fetchpool::observability::{DiagnosticSink, PoolEvent};
use fetchpool::pool::FetchPool;
use fetchpool::task::{Callback, Task};
use fetchpool::worker::{FetchResult, HttpConfig, HttpFetcher};

/// Embedded mock HTTP server running on its own runtime thread
pub struct MockServer {
    addr: SocketAddr,
}

impl MockServer {
    pub fn start() -> Self {
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("mock-server".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();

                runtime.block_on(async move {
                    // Bind to random available port
                    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                    tx.send(listener.local_addr().unwrap()).unwrap();
                    axum::serve(listener, router()).await.unwrap();
                });
            })
            .unwrap();

        let addr = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        Self { addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

fn router() -> Router {
    Router::new()
        .route("/ok", get(|| async { "hello" }))
        .route("/files/{name}", get(serve_file))
        .route("/json", get(serve_json))
        .route("/status/{code}", get(serve_status))
        .route("/loop", get(|| async { Redirect::temporary("/loop") }))
        .route("/moved", get(|| async { Redirect::permanent("/ok") }))
        .route("/slow", get(serve_slow))
        .route("/echo-header", get(echo_header))
        .route("/latin1", get(serve_latin1))
}

async fn serve_file(Path(name): Path<String>) -> String {
    format!("contents of {}", name)
}

async fn serve_json() -> Json<Value> {
    Json(json!({ "name": "fetchpool", "items": [1, 2, 3] }))
}

async fn serve_status(Path(code): Path<u16>) -> (StatusCode, &'static str) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, "status body")
}

async fn serve_slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(3)).await;
    "finally"
}

async fn serve_latin1() -> ([(&'static str, &'static str); 1], &'static [u8]) {
    (
        [("content-type", "text/plain; charset=iso-8859-1")],
        &b"caf\xe9"[..],
    )
}

async fn echo_header(headers: HeaderMap) -> String {
    headers
        .get("x-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("missing")
        .to_string()
}

/// Address nothing listens on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/unreachable", addr)
}

/// Sink that keeps the Debug rendering of every event
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn count(&self, variant: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.starts_with(variant))
            .count()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, event: PoolEvent<'_>) {
        self.events.lock().push(format!("{:?}", event));
    }
}

/// Callback collecting every result it sees
pub fn collector() -> (Callback, Arc<Mutex<Vec<FetchResult>>>) {
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    let callback: Callback = Arc::new(move |result: FetchResult| sink.lock().push(result));
    (callback, results)
}

pub fn fast_http_config() -> HttpConfig {
    HttpConfig {
        connect_timeout_ms: 2_000,
        request_timeout_ms: 10_000,
        ..Default::default()
    }
}

pub fn pool_with(
    tasks: Vec<Task>,
    workers: usize,
    default_callback: Option<Callback>,
    config: HttpConfig,
    sink: Arc<RecordingSink>,
) -> FetchPool {
    FetchPool::with_parts(
        tasks,
        workers,
        default_callback,
        Arc::new(HttpFetcher::new(config).unwrap()),
        sink,
    )
    .unwrap()
}
