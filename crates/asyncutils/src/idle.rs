//! Idle-time scheduling.
//!
//! Work handed to an [`Idle`] scheduler is opportunistic: it may run late, it
//! may not run at all (no runtime, process exiting), and its outcome is never
//! reported back to whoever scheduled it.

use futures::future::{BoxFuture, join_all};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A unit of background work.
pub type Task = BoxFuture<'static, ()>;
/// Shared, type-erased idle scheduler.
pub type IdleHandle = Arc<dyn Idle>;

/// Schedules low-priority work to run once foreground work has settled.
pub trait Idle: Send + Sync {
    /// Hand `task` over to the scheduler. Never blocks, never fails.
    fn schedule(&self, task: Task);
}

/// Runs each task on the current Tokio runtime after a fixed delay.
///
/// The delay stands in for "the page has finished its own startup work";
/// after it elapses the task also yields once so anything woken in the
/// meantime gets to run first.
#[derive(Clone, Debug)]
pub struct Deferred {
    delay: Duration,
}
impl Deferred {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}
impl Default for Deferred {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}
impl Idle for Deferred {
    fn schedule(&self, task: Task) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime available; dropping idle task");
            return;
        };
        let delay = self.delay;
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::task::yield_now().await;
            task.await;
        });
    }
}

/// Queues tasks until the owner explicitly runs them.
///
/// Useful in tests, and for embedders that get their own idle signal (a UI
/// event loop's "nothing pending" callback, for instance).
///
/// # Examples
///
/// ```
/// use ondemand_asyncutils::{Idle, Manual};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let idle = Manual::new();
/// idle.schedule(Box::pin(async { println!("idle!") }));
/// assert_eq!(idle.pending(), 1);
/// assert_eq!(idle.run_pending().await, 1);
/// assert_eq!(idle.pending(), 0);
/// # }
/// ```
#[derive(Default)]
pub struct Manual {
    queue: Mutex<Vec<Task>>,
}
impl Manual {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to be run.
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Run everything queued so far, concurrently, and return how many tasks
    /// ran. Tasks scheduled while these run stay queued for the next call.
    pub async fn run_pending(&self) -> usize {
        let tasks = std::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner));
        let count = tasks.len();
        join_all(tasks).await;
        count
    }
}
impl Idle for Manual {
    fn schedule(&self, task: Task) {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).push(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = Arc::clone(counter);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_manual_runs_only_when_asked() {
        let counter = Arc::new(AtomicUsize::new(0));
        let idle = Manual::new();
        idle.schedule(counting_task(&counter));
        idle.schedule(counting_task(&counter));
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(idle.pending(), 2);

        assert_eq!(idle.run_pending().await, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        // Nothing left over.
        assert_eq!(idle.run_pending().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_waits_for_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let idle = Deferred::new(Duration::from_millis(50));
        idle.schedule(counting_task(&counter));

        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deferred_without_runtime_drops_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        Deferred::default().schedule(counting_task(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_deferred_default_delay() {
        assert_eq!(Deferred::default().delay(), Deferred::DEFAULT_DELAY);
    }
}
