//! One-shot completion latch.

use std::sync::atomic::{AtomicBool, Ordering};

/// Runs a completion callback at most once.
///
/// Every path that reaches the terminal stage trips the latch; only the
/// first trip runs its callback.
#[derive(Debug, Default)]
pub struct CompletionLatch {
    tripped: AtomicBool,
}

impl CompletionLatch {
    /// Creates an untripped latch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tripped: AtomicBool::new(false),
        }
    }

    /// Trips the latch, running `callback` if this is the first trip.
    ///
    /// Returns `true` if the callback ran.
    pub fn trip<F: FnOnce()>(&self, callback: F) -> bool {
        if self
            .tripped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        callback();
        true
    }

    /// Returns whether the latch has been tripped.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_first_trip_runs_callback() {
        let latch = CompletionLatch::new();
        let mut calls = 0;
        assert!(latch.trip(|| calls += 1));
        assert!(latch.is_tripped());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_later_trips_are_noops() {
        let latch = CompletionLatch::new();
        let mut calls = 0;
        latch.trip(|| calls += 1);
        assert!(!latch.trip(|| calls += 1));
        assert!(!latch.trip(|| calls += 1));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_concurrent_trips_run_once() {
        let latch = Arc::new(CompletionLatch::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..10 {
            let l = Arc::clone(&latch);
            let c = Arc::clone(&calls);
            handles.push(thread::spawn(move || {
                l.trip(|| {
                    c.fetch_add(1, Ordering::SeqCst);
                })
            }));
        }

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
