use std::sync::atomic::{AtomicBool, Ordering};

/// Two independent one-way latches observed by every worker
///
/// - `kill`: stop as soon as the current task is done, abandoning the queue
/// - `drain`: stop once the queue has been observed empty
///
/// Neither latch is ever cleared. When both are set, `kill` wins.
#[derive(Debug, Default)]
pub struct Shutdown {
    kill: AtomicBool,
    drain: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the kill latch. Returns `true` if this call set it.
    pub fn kill(&self) -> bool {
        !self.kill.swap(true, Ordering::SeqCst)
    }

    /// Set the drain latch. Returns `true` if this call set it.
    pub fn drain(&self) -> bool {
        !self.drain.swap(true, Ordering::SeqCst)
    }

    pub fn is_killed(&self) -> bool {
        self.kill.load(Ordering::SeqCst)
    }

    pub fn is_draining(&self) -> bool {
        self.drain.load(Ordering::SeqCst)
    }
}
