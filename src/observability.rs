//! Diagnostic sink and pool counters
//!
//! The pool never logs through a global: every event goes to the
//! [`DiagnosticSink`] it was constructed with. [`TracingSink`] forwards to
//! `tracing`, which is what the binary and most embedders want.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::worker::FailureKind;

/// Why a worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Killed,
    Drained,
}

/// Which shutdown the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    Hard,
    Drain,
}

/// Everything the pool reports about itself
#[derive(Debug, Clone, Copy)]
pub enum PoolEvent<'a> {
    PoolCreated {
        tasks: usize,
        workers: usize,
        has_default_callback: bool,
    },
    PoolStarted {
        workers: usize,
    },
    /// `start()` after the kill latch was set; no worker is spawned
    StartAfterKill,
    StopRequested {
        mode: StopMode,
        pending: usize,
    },
    /// `stop_after_drain()` on a pool whose workers were never started
    DrainWithoutWorkers {
        pending: usize,
    },
    WorkerStarted {
        worker: usize,
    },
    WorkerStopped {
        worker: usize,
        reason: StopReason,
    },
    WorkerPanicked {
        worker: usize,
    },
    TaskSucceeded {
        worker: usize,
        task_id: Uuid,
        url: &'a str,
        status: u16,
    },
    TaskFailed {
        worker: usize,
        task_id: Uuid,
        url: &'a str,
        kind: FailureKind,
        status: Option<u16>,
        detail: &'a str,
    },
    TaskMissingTarget {
        worker: usize,
        task_id: Uuid,
    },
    CallbackMissing {
        task_id: Uuid,
        url: &'a str,
    },
    CallbackPanicked {
        task_id: Uuid,
        url: &'a str,
        message: &'a str,
    },
}

/// Write-only destination for pool diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: PoolEvent<'_>);
}

/// Forwards pool events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, event: PoolEvent<'_>) {
        match event {
            PoolEvent::PoolCreated {
                tasks,
                workers,
                has_default_callback,
            } => tracing::debug!(tasks, workers, has_default_callback, "Pool created"),
            PoolEvent::PoolStarted { workers } => {
                tracing::info!(workers, "Starting downloads")
            }
            PoolEvent::StartAfterKill => {
                tracing::info!("Pool was stopped before start, no workers spawned")
            }
            PoolEvent::StopRequested { mode, pending } => match mode {
                StopMode::Hard => tracing::info!(
                    pending,
                    "Stopping downloads, waiting for active downloads to finish"
                ),
                StopMode::Drain => {
                    tracing::info!(pending, "Waiting for all downloads to finish")
                }
            },
            PoolEvent::DrainWithoutWorkers { pending } => {
                tracing::warn!(pending, "Drain requested but no workers are running")
            }
            PoolEvent::WorkerStarted { worker } => tracing::debug!(worker, "Worker started"),
            PoolEvent::WorkerStopped { worker, reason } => {
                tracing::debug!(worker, ?reason, "Worker stopped")
            }
            PoolEvent::WorkerPanicked { worker } => {
                tracing::error!(worker, "Worker thread panicked")
            }
            PoolEvent::TaskSucceeded {
                worker,
                task_id,
                url,
                status,
            } => tracing::debug!(worker, %task_id, url, status, "Downloaded"),
            PoolEvent::TaskFailed {
                worker,
                task_id,
                url,
                kind: FailureKind::Unexpected,
                status,
                detail,
            } => tracing::error!(
                worker,
                %task_id,
                url,
                kind = FailureKind::Unexpected.as_str(),
                ?status,
                detail,
                "Failed to download, unexpected error"
            ),
            PoolEvent::TaskFailed {
                worker,
                task_id,
                url,
                kind,
                status,
                detail,
            } => tracing::error!(
                worker,
                %task_id,
                url,
                kind = kind.as_str(),
                ?status,
                detail,
                "Failed to download: {}",
                kind
            ),
            PoolEvent::TaskMissingTarget { worker, task_id } => {
                tracing::error!(worker, %task_id, "Task has no target URL, skipping")
            }
            PoolEvent::CallbackMissing { task_id, url } => {
                tracing::warn!(%task_id, url, "There is no callback for task")
            }
            PoolEvent::CallbackPanicked {
                task_id,
                url,
                message,
            } => tracing::error!(%task_id, url, message, "Callback panicked"),
        }
    }
}

/// Pool counters, updated by workers
#[derive(Debug, Default)]
pub struct PoolMetrics {
    tasks_succeeded: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_skipped: AtomicU64,
    callbacks_missing: AtomicU64,
    callbacks_panicked: AtomicU64,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_succeeded(&self) {
        self.tasks_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_skipped(&self) {
        self.tasks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn callback_missing(&self) {
        self.callbacks_missing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn callback_panicked(&self) {
        self.callbacks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_succeeded: self.tasks_succeeded.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_skipped: self.tasks_skipped.load(Ordering::Relaxed),
            callbacks_missing: self.callbacks_missing.load(Ordering::Relaxed),
            callbacks_panicked: self.callbacks_panicked.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub tasks_skipped: u64,
    pub callbacks_missing: u64,
    pub callbacks_panicked: u64,
}

impl MetricsSnapshot {
    /// Tasks that produced a result
    pub fn completed(&self) -> u64 {
        self.tasks_succeeded + self.tasks_failed
    }
}
