//! Download workers
//!
//! Each worker is an OS thread that pulls tasks from the shared queue,
//! fetches them over HTTP, and hands the classified outcome to a callback.

pub mod classify;
pub mod http;
pub mod response;
pub mod runner;

pub use classify::FailureKind;
pub use http::{Fetch, FetchFailure, FetcherError, HttpConfig, HttpFetcher};
pub use response::{BodyError, FetchResult, HttpResponse};
