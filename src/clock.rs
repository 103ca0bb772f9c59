//! Injectable clock and cancellable-timer abstraction.
//!
//! Production code only ever uses [`SystemClock`], which wraps `tokio::time`.
//! Because `tokio::time::sleep` respects `tokio::time::pause`/`advance`, tests
//! get deterministic timing for free by running under a paused runtime
//! instead of needing a bespoke virtual clock implementation.

use std::fmt;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A callback scheduled to run once a timer elapses.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Abstracts time so the rest of the crate never calls `tokio::time` or
/// `Instant::now` directly.
pub trait Clock: Send + Sync + fmt::Debug + 'static {
    /// Current time, per this clock's notion of "now".
    fn now(&self) -> Instant;

    /// Schedule `callback` to run after `delay`. Returns a handle that
    /// cancels the timer when dropped or when [`TimerHandle::cancel`] is
    /// called explicitly.
    fn set_timer(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
}

/// Cancels its associated timer on drop. Holding one is the only way to keep
/// a scheduled callback alive; every component that owns a timer stores
/// exactly one handle per the "at most one active timer" invariant.
#[must_use = "dropping a TimerHandle cancels its timer immediately"]
pub struct TimerHandle {
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Cancel the timer. Equivalent to dropping the handle, spelled out for
    /// call sites where the intent should read explicitly.
    pub fn cancel(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle").finish_non_exhaustive()
    }
}

/// The production [`Clock`], backed by the tokio runtime's timer wheel.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn set_timer(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        TimerHandle::new(task)
    }
}
