//! Worker loop - processes tasks until a shutdown latch says otherwise

use parking_lot::RwLock;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::classify::FailureKind;
use super::http::{Fetch, FetchFailure};
use super::response::FetchResult;
use crate::observability::{DiagnosticSink, PoolEvent, PoolMetrics, StopReason};
use crate::queue::{Next, Shutdown, TaskQueue};
use crate::task::{Callback, Task};

/// Pool default handler, shared with every worker so later updates are seen
pub type SharedCallback = Arc<RwLock<Option<Callback>>>;

/// Everything one worker thread needs, cloned per worker
#[derive(Clone)]
pub struct WorkerContext {
    pub id: usize,
    pub queue: Arc<TaskQueue>,
    pub shutdown: Arc<Shutdown>,
    pub fetcher: Arc<dyn Fetch>,
    pub default_callback: SharedCallback,
    pub sink: Arc<dyn DiagnosticSink>,
    pub metrics: Arc<PoolMetrics>,
}

/// Run until killed, or until draining and the queue is empty
pub fn run(ctx: WorkerContext) -> StopReason {
    ctx.sink.record(PoolEvent::WorkerStarted { worker: ctx.id });

    let reason = loop {
        match ctx.queue.next_task(&ctx.shutdown) {
            Next::Task(task) => process_task(&ctx, task),
            Next::Killed => break StopReason::Killed,
            Next::Drained => break StopReason::Drained,
        }
    };

    ctx.sink.record(PoolEvent::WorkerStopped {
        worker: ctx.id,
        reason,
    });
    reason
}

/// Fetch one task and deliver its result
///
/// Never panics: a panicking fetcher becomes an `Unexpected` failure and a
/// panicking callback is logged and swallowed.
pub fn process_task(ctx: &WorkerContext, task: Task) {
    let Some(url) = task.target().map(str::to_string) else {
        ctx.sink.record(PoolEvent::TaskMissingTarget {
            worker: ctx.id,
            task_id: task.id(),
        });
        ctx.metrics.task_skipped();
        return;
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| ctx.fetcher.fetch(&task)))
        .unwrap_or_else(|payload| {
            Err(FetchFailure::new(
                FailureKind::Unexpected,
                format!("fetcher panicked: {}", panic_message(payload.as_ref())),
            ))
        });

    match &outcome {
        Ok(response) => {
            ctx.metrics.task_succeeded();
            ctx.sink.record(PoolEvent::TaskSucceeded {
                worker: ctx.id,
                task_id: task.id(),
                url: &url,
                status: response.status().as_u16(),
            });
        }
        Err(failure) => {
            ctx.metrics.task_failed();
            ctx.sink.record(PoolEvent::TaskFailed {
                worker: ctx.id,
                task_id: task.id(),
                url: &url,
                kind: failure.kind,
                status: failure.response.as_ref().map(|r| r.status().as_u16()),
                detail: &failure.detail,
            });
        }
    }

    let callback = {
        let default = ctx.default_callback.read();
        resolve_callback(&task, (*default).as_ref())
    };
    let task_id = task.id();
    let result = FetchResult::from_outcome(task, outcome);

    let Some(callback) = callback else {
        ctx.metrics.callback_missing();
        ctx.sink.record(PoolEvent::CallbackMissing { task_id, url: &url });
        return;
    };

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(result))) {
        ctx.metrics.callback_panicked();
        ctx.sink.record(PoolEvent::CallbackPanicked {
            task_id,
            url: &url,
            message: &panic_message(payload.as_ref()),
        });
    }
}

/// The task's own handler wins, then the pool default, then nothing
pub fn resolve_callback(task: &Task, default: Option<&Callback>) -> Option<Callback> {
    task.callback().or(default).cloned()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
