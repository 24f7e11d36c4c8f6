//! One-shot deferred actions.
//!
//! A scheduled action runs exactly once, after its delay, as a task on the
//! ambient Tokio runtime. There is no cancellation and no persistence: a
//! restart before the delay elapses loses the action.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, Instrument};

/// Receipt for a scheduled action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledHandle {
    /// Process-unique id, for log correlation.
    pub id: u64,
    /// Requested delay.
    pub delay: Duration,
    /// Wall-clock time the action is due.
    pub due_at: DateTime<Utc>,
}

/// Fires one-shot callbacks after a delay.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    next_id: Arc<AtomicU64>,
    pending: Arc<AtomicUsize>,
}

impl Scheduler {
    /// Create a scheduler with no pending actions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` once after `delay`.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn schedule<F, Fut>(&self, delay: Duration, action: F) -> ScheduledHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let due_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.pending.fetch_add(1, Ordering::Relaxed);

        let pending = Arc::clone(&self.pending);
        let span = tracing::debug_span!("deferred_action", id, delay_s = delay.as_secs());
        tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                pending.fetch_sub(1, Ordering::Relaxed);
                debug!("Deferred action firing");
                action().await;
            }
            .instrument(span),
        );

        debug!(id, delay_s = delay.as_secs(), %due_at, "Deferred action scheduled");
        ScheduledHandle { id, delay, due_at }
    }

    /// Actions scheduled but not yet fired.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let handle = scheduler.schedule(Duration::from_secs(300), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(handle.delay, Duration::from_secs(300));
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn handles_get_distinct_ids() {
        let scheduler = Scheduler::new();
        let a = scheduler.schedule(Duration::from_secs(1), || async {});
        let b = scheduler.schedule(Duration::from_secs(1), || async {});
        assert_ne!(a.id, b.id);
        assert!(b.due_at >= a.due_at);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_fires_promptly() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        scheduler.schedule(Duration::ZERO, move || async move {
            flag.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
