//! Shared progress counter for one controller run
//!
//! The controller is the only writer of `total`; session tasks only ever
//! decrement `active`. All mutations go through the watch channel's lock, so a
//! snapshot always reflects a consistent `(total, active)` pair.

use serde::Serialize;
use tokio::sync::watch;
use tracing::error;

/// Point-in-time view of a run's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Tasks admitted so far (never decreases)
    pub total: usize,

    /// Tasks admitted but not yet finished
    pub active: usize,
}

/// Launched/active counter shared between the controller and its tasks
#[derive(Debug)]
pub struct ProgressCounter {
    state: watch::Sender<ProgressSnapshot>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ProgressSnapshot::default());
        Self { state }
    }

    /// Record one admission. Returns the counters after the update; `total`
    /// is the admitted task's sequence number.
    pub fn increment(&self) -> ProgressSnapshot {
        let mut after = ProgressSnapshot::default();
        self.state.send_modify(|s| {
            s.total += 1;
            s.active += 1;
            after = *s;
        });
        after
    }

    /// Record one completion. Returns the counters after the update.
    pub fn decrement(&self) -> ProgressSnapshot {
        self.decrement_then(|_| {})
    }

    /// Record one completion and run `on_update` with the new counters before
    /// waiters are woken, so whatever it reports is ordered before anything a
    /// `wait_idle` caller does next.
    pub fn decrement_then<F>(&self, on_update: F) -> ProgressSnapshot
    where
        F: FnOnce(ProgressSnapshot),
    {
        let mut after = ProgressSnapshot::default();
        let mut underflow = false;
        self.state.send_modify(|s| {
            match s.active.checked_sub(1) {
                Some(active) => s.active = active,
                None => underflow = true,
            }
            after = *s;
            on_update(after);
        });

        if underflow {
            error!("Progress counter decremented with no active tasks (total={})", after.total);
        }

        after
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.state.borrow()
    }

    /// Resolve once no admitted task is still running
    pub async fn wait_idle(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|s| s.active == 0).await;
    }
}

impl Default for ProgressCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn increment_assigns_consecutive_totals() {
        let counter = ProgressCounter::new();
        assert_eq!(counter.increment(), ProgressSnapshot { total: 1, active: 1 });
        assert_eq!(counter.increment(), ProgressSnapshot { total: 2, active: 2 });
        assert_eq!(counter.decrement(), ProgressSnapshot { total: 2, active: 1 });
        assert_eq!(counter.snapshot(), ProgressSnapshot { total: 2, active: 1 });
    }

    #[test]
    fn concurrent_decrements_are_not_lost() {
        let counter = Arc::new(ProgressCounter::new());
        for _ in 0..64 {
            counter.increment();
        }

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    counter.decrement();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.snapshot(), ProgressSnapshot { total: 64, active: 0 });
    }

    #[tokio::test]
    async fn wait_idle_resolves_after_last_completion() {
        let counter = Arc::new(ProgressCounter::new());
        counter.increment();
        counter.increment();

        let worker = Arc::clone(&counter);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            worker.decrement();
            std::thread::sleep(Duration::from_millis(20));
            worker.decrement();
        });

        tokio::time::timeout(Duration::from_secs(5), counter.wait_idle())
            .await
            .expect("counter never went idle");
        assert_eq!(counter.snapshot().active, 0);
    }

    #[tokio::test]
    async fn wait_idle_is_immediate_when_nothing_is_running() {
        let counter = ProgressCounter::new();
        tokio::time::timeout(Duration::from_millis(100), counter.wait_idle())
            .await
            .expect("idle counter should not block");
    }
}
