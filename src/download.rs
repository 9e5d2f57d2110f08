//! Batch download driver used by the `fetch` command

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::config::Config;
use crate::pool::{FetchPool, PoolError};
use crate::task::{Callback, Task};
use crate::worker::FetchResult;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("No URLs given")]
    NoTargets,

    #[error("Failed to read URL list {path}: {source}")]
    Input { path: PathBuf, source: io::Error },

    #[error("Failed to create output directory {path}: {source}")]
    Output { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub targets: Vec<String>,
    pub producers: usize,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub saved: usize,
    pub write_errors: usize,
    pub elapsed: Duration,
}

impl Summary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && self.write_errors == 0
    }
}

/// URLs from a list file: one per line, blank lines and `#` comments skipped
pub fn parse_targets(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn read_targets(path: &Path) -> Result<Vec<String>, DownloadError> {
    let text = fs::read_to_string(path).map_err(|source| DownloadError::Input {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_targets(&text))
}

/// File name for the `index`-th download: `<index>-<last path segment>`
pub fn output_name(index: u64, url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("index");

    let safe: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!("{}-{}", index, safe)
}

struct Reporter {
    output: Option<PathBuf>,
    saved: AtomicUsize,
    write_errors: AtomicUsize,
}

impl Reporter {
    fn new(output: Option<PathBuf>) -> Self {
        Self {
            output,
            saved: AtomicUsize::new(0),
            write_errors: AtomicUsize::new(0),
        }
    }

    fn handle(&self, result: FetchResult) {
        let index = result
            .payload()
            .get("index")
            .and_then(|v| v.as_u64())
            .unwrap_or_default();
        let target = result.target().unwrap_or_default();

        match (result.response(), result.failure_kind()) {
            (Some(response), None) => {
                println!(
                    "ok      {} {} ({} bytes)",
                    response.status().as_u16(),
                    target,
                    response.bytes().len()
                );
                if let Some(dir) = &self.output {
                    self.save(dir, index, &result);
                }
            }
            (_, kind) => {
                let status = result
                    .status()
                    .map(|s| s.as_u16().to_string())
                    .unwrap_or_else(|| "---".to_string());
                println!(
                    "failed  {} {} [{}] {}",
                    status,
                    target,
                    kind.map(|k| k.as_str()).unwrap_or("unknown"),
                    result.failure_detail().unwrap_or_default()
                );
            }
        }
    }

    fn save(&self, dir: &Path, index: u64, result: &FetchResult) {
        let Some(response) = result.response() else {
            return;
        };
        let path = dir.join(output_name(index, response.url()));

        match fs::write(&path, response.bytes()) {
            Ok(()) => {
                self.saved.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to save download");
                self.write_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Download every target with a pool sized from `config`, then drain
///
/// Targets are split across `options.producers` threads that feed the
/// already running pool.
pub fn run(config: &Config, options: FetchOptions) -> Result<Summary, DownloadError> {
    if options.targets.is_empty() {
        return Err(DownloadError::NoTargets);
    }

    if let Some(dir) = &options.output {
        fs::create_dir_all(dir).map_err(|source| DownloadError::Output {
            path: dir.clone(),
            source,
        })?;
    }

    let reporter = Arc::new(Reporter::new(options.output.clone()));
    let callback: Callback = {
        let reporter = reporter.clone();
        Arc::new(move |result: FetchResult| reporter.handle(result))
    };

    let started = Instant::now();
    let pool = FetchPool::from_config(Vec::new(), config, Some(callback))?;
    pool.start()?;

    let tasks: Vec<Task> = options
        .targets
        .iter()
        .enumerate()
        .map(|(index, target)| Task::new(target.as_str()).with_payload("index", index))
        .collect();

    let producers = options.producers.max(1);
    let chunk = tasks.len().div_ceil(producers);
    info!(
        targets = tasks.len(),
        producers,
        workers = pool.worker_count(),
        "Queueing downloads"
    );

    thread::scope(|scope| {
        for batch in tasks.chunks(chunk) {
            let pool = &pool;
            scope.spawn(move || pool.add_tasks(batch.iter().cloned()));
        }
    });

    pool.stop_after_drain();

    let metrics = pool.metrics();
    let summary = Summary {
        succeeded: metrics.tasks_succeeded,
        failed: metrics.tasks_failed,
        skipped: metrics.tasks_skipped,
        saved: reporter.saved.load(Ordering::Relaxed),
        write_errors: reporter.write_errors.load(Ordering::Relaxed),
        elapsed: started.elapsed(),
    };

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = summary.skipped,
        saved = summary.saved,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Downloads finished"
    );

    Ok(summary)
}
