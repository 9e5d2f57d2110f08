use crate::queue::shutdown::Shutdown;
use crate::task::Task;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// What a worker should do next, as decided by [`TaskQueue::next_task`]
#[derive(Debug)]
pub enum Next {
    /// Process this task
    Task(Task),
    /// The kill latch is set; stop without touching the queue
    Killed,
    /// The drain latch is set and the queue is empty
    Drained,
}

/// TaskQueue is the only state mutated by more than one thread
///
/// Architecture:
/// - `pending`: FIFO of tasks behind a mutex, the single point of removal
/// - `activity`: condvar signalled on every enqueue and every latch change
///
/// Producers never wait on anything but the mutex. Idle workers park on the
/// condvar instead of polling, and are woken either by new work or by
/// [`TaskQueue::wake_all`] after a shutdown latch has been set.
#[derive(Debug, Default)]
pub struct TaskQueue {
    pending: Mutex<VecDeque<Task>>,
    activity: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue pre-filled with `tasks`, in order
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            pending: Mutex::new(tasks.into_iter().collect()),
            activity: Condvar::new(),
        }
    }

    /// Append one task and wake one idle worker
    pub fn push(&self, task: Task) {
        self.pending.lock().push_back(task);
        self.activity.notify_one();
    }

    /// Append tasks in order. Returns how many were added.
    pub fn extend(&self, tasks: impl IntoIterator<Item = Task>) -> usize {
        let added = {
            let mut pending = self.pending.lock();
            let before = pending.len();
            pending.extend(tasks);
            pending.len() - before
        };

        match added {
            0 => {}
            1 => {
                self.activity.notify_one();
            }
            _ => {
                self.activity.notify_all();
            }
        }
        added
    }

    /// Remove and return the oldest task without blocking
    pub fn try_pop(&self) -> Option<Task> {
        self.pending.lock().pop_front()
    }

    /// Advisory: may be stale by the time the caller looks at it
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Advisory: may be stale by the time the caller looks at it
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Block until there is something for a worker to do
    ///
    /// Checks, in order: kill latch, a pending task, drain latch. If none
    /// applies the caller parks until the next enqueue or latch change.
    pub fn next_task(&self, shutdown: &Shutdown) -> Next {
        let mut pending = self.pending.lock();
        loop {
            if shutdown.is_killed() {
                return Next::Killed;
            }
            if let Some(task) = pending.pop_front() {
                return Next::Task(task);
            }
            if shutdown.is_draining() {
                return Next::Drained;
            }
            self.activity.wait(&mut pending);
        }
    }

    /// Wake every parked worker so it re-reads the shutdown latches
    ///
    /// Takes the lock first: a worker between its latch check and `wait`
    /// still holds it, so the notification cannot slip past.
    pub fn wake_all(&self) {
        let _pending = self.pending.lock();
        self.activity.notify_all();
    }
}
