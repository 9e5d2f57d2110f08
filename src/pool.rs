//! Fixed-size pool of download worker threads
//!
//! # Usage
//!
//! ```no_run
//! use fetchpool::pool::FetchPool;
//! use fetchpool::task::Task;
//! use fetchpool::worker::FetchResult;
//! use std::sync::Arc;
//!
//! let tasks = vec![Task::new("https://example.com/1.png")];
//! let pool = FetchPool::new(
//!     tasks,
//!     3,
//!     Some(Arc::new(|result: FetchResult| {
//!         println!("{:?} {}", result.target(), result.is_success())
//!     })),
//! )?;
//!
//! pool.start()?;
//! pool.add_task(Task::new("https://example.com/2.png"));
//! pool.stop_after_drain();
//! # Ok::<(), fetchpool::pool::PoolError>(())
//! ```

use parking_lot::{Mutex, RwLock};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

use crate::config::Config;
use crate::observability::{
    DiagnosticSink, MetricsSnapshot, PoolEvent, PoolMetrics, StopMode, TracingSink,
};
use crate::queue::{Shutdown, TaskQueue};
use crate::task::{Callback, Task};
use crate::worker::runner::{self, SharedCallback, WorkerContext};
use crate::worker::{Fetch, FetcherError, HttpFetcher};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("A pool needs at least one worker")]
    NoWorkers,

    #[error("Pool has already been started")]
    AlreadyStarted,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("Failed to create fetcher: {0}")]
    Fetcher(#[from] FetcherError),
}

pub type Result<T> = std::result::Result<T, PoolError>;

#[derive(Debug, Default)]
struct Workers {
    started: bool,
    handles: Vec<JoinHandle<()>>,
}

/// FetchPool owns N worker threads sharing one queue and two shutdown latches
///
/// All methods take `&self`; wrap the pool in an `Arc` to add tasks from
/// several producer threads while workers are running.
pub struct FetchPool {
    queue: Arc<TaskQueue>,
    shutdown: Arc<Shutdown>,
    default_callback: SharedCallback,
    fetcher: Arc<dyn Fetch>,
    sink: Arc<dyn DiagnosticSink>,
    metrics: Arc<PoolMetrics>,
    worker_count: usize,
    workers: Mutex<Workers>,
}

impl FetchPool {
    /// Create a pool backed by a default [`HttpFetcher`] that logs through
    /// `tracing`
    pub fn new(
        initial_tasks: impl IntoIterator<Item = Task>,
        worker_count: usize,
        default_callback: Option<Callback>,
    ) -> Result<Self> {
        Self::with_parts(
            initial_tasks,
            worker_count,
            default_callback,
            Arc::new(HttpFetcher::with_defaults()?),
            Arc::new(TracingSink),
        )
    }

    /// Create a pool sized and configured from loaded settings
    pub fn from_config(
        initial_tasks: impl IntoIterator<Item = Task>,
        config: &Config,
        default_callback: Option<Callback>,
    ) -> Result<Self> {
        Self::with_parts(
            initial_tasks,
            config.pool.workers,
            default_callback,
            Arc::new(HttpFetcher::new(config.http.clone())?),
            Arc::new(TracingSink),
        )
    }

    /// Create a pool with explicit collaborators
    pub fn with_parts(
        initial_tasks: impl IntoIterator<Item = Task>,
        worker_count: usize,
        default_callback: Option<Callback>,
        fetcher: Arc<dyn Fetch>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self> {
        if worker_count == 0 {
            return Err(PoolError::NoWorkers);
        }

        let queue = TaskQueue::with_tasks(initial_tasks);
        sink.record(PoolEvent::PoolCreated {
            tasks: queue.len(),
            workers: worker_count,
            has_default_callback: default_callback.is_some(),
        });

        Ok(Self {
            queue: Arc::new(queue),
            shutdown: Arc::new(Shutdown::new()),
            default_callback: Arc::new(RwLock::new(default_callback)),
            fetcher,
            sink,
            metrics: Arc::new(PoolMetrics::new()),
            worker_count,
            workers: Mutex::new(Workers::default()),
        })
    }

    /// Queue more tasks. Safe to call at any time, from any thread.
    pub fn add_tasks(&self, tasks: impl IntoIterator<Item = Task>) -> usize {
        self.queue.extend(tasks)
    }

    pub fn add_task(&self, task: Task) {
        self.queue.push(task);
    }

    /// Replace the handler used for tasks without their own. Running workers
    /// pick it up for the next result they deliver.
    pub fn set_default_callback(&self, callback: Option<Callback>) {
        *self.default_callback.write() = callback;
    }

    /// Spawn the worker threads
    ///
    /// If the pool was hard-stopped before being started no worker is spawned
    /// and the queued tasks are never processed.
    pub fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        if workers.started {
            return Err(PoolError::AlreadyStarted);
        }
        workers.started = true;

        if self.shutdown.is_killed() {
            self.sink.record(PoolEvent::StartAfterKill);
            return Ok(());
        }

        self.sink.record(PoolEvent::PoolStarted {
            workers: self.worker_count,
        });

        for id in 0..self.worker_count {
            let ctx = WorkerContext {
                id,
                queue: self.queue.clone(),
                shutdown: self.shutdown.clone(),
                fetcher: self.fetcher.clone(),
                default_callback: self.default_callback.clone(),
                sink: self.sink.clone(),
                metrics: self.metrics.clone(),
            };

            let spawned = thread::Builder::new()
                .name(format!("fetch-worker-{}", id))
                .spawn(move || {
                    runner::run(ctx);
                });

            match spawned {
                Ok(handle) => workers.handles.push(handle),
                Err(e) => {
                    // Take down whatever did start rather than leave a partial pool
                    self.shutdown.kill();
                    self.queue.wake_all();
                    let handles = std::mem::take(&mut workers.handles);
                    drop(workers);
                    self.join(handles);
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        Ok(())
    }

    /// Stop as soon as every worker finishes its current task
    ///
    /// In-flight fetches are not interrupted. Tasks still queued are abandoned
    /// and never reach a callback.
    pub fn stop_hard(&self) {
        self.sink.record(PoolEvent::StopRequested {
            mode: StopMode::Hard,
            pending: self.queue.len(),
        });
        self.shutdown.kill();
        self.queue.wake_all();
        self.join_workers();
    }

    /// Let workers empty the queue, then wait for all of them to exit
    ///
    /// Without running workers there is nobody to drain the queue, so this
    /// returns immediately and a later `start()` drains it.
    pub fn stop_after_drain(&self) {
        self.sink.record(PoolEvent::StopRequested {
            mode: StopMode::Drain,
            pending: self.queue.len(),
        });
        self.shutdown.drain();
        self.queue.wake_all();

        if !self.workers.lock().started {
            self.sink.record(PoolEvent::DrainWithoutWorkers {
                pending: self.queue.len(),
            });
            return;
        }
        self.join_workers();
    }

    /// Tasks waiting to be picked up (advisory)
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn is_killed(&self) -> bool {
        self.shutdown.is_killed()
    }

    pub fn is_draining(&self) -> bool {
        self.shutdown.is_draining()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn join_workers(&self) {
        let handles = std::mem::take(&mut self.workers.lock().handles);
        self.join(handles);
    }

    fn join(&self, handles: Vec<JoinHandle<()>>) {
        for (worker, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                self.sink.record(PoolEvent::WorkerPanicked { worker });
            }
        }
    }
}

impl Drop for FetchPool {
    fn drop(&mut self) {
        // Workers would otherwise stay parked on the condvar forever
        let running = !self.workers.get_mut().handles.is_empty();
        if running {
            self.stop_hard();
        }
    }
}
