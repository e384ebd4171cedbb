//! Timer registry
//!
//! Tracks every outstanding timed callback so that none can fire after
//! its owner is disposed, and so a stage change can cancel only the
//! timers scheduled for the stage being left.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::SequencerError;

/// Unique identifier of a scheduled timer. Never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Reference to a scheduled callback.
///
/// The `consumed` flag is shared between the fire path and the cancel
/// path; whichever swaps it first wins, so a callback either fires or is
/// cancelled, never both.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: TimerId,
    tag: u64,
    consumed: Arc<AtomicBool>,
    token: CancellationToken,
}

impl TimerHandle {
    /// Returns the timer id.
    #[must_use]
    pub const fn id(&self) -> TimerId {
        self.id
    }

    /// Returns the owner tag the timer was scheduled with.
    #[must_use]
    pub const fn tag(&self) -> u64 {
        self.tag
    }

    /// Returns whether the timer has fired or been cancelled.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::SeqCst)
    }

    /// Claims the handle. Returns `true` for the single winning caller.
    fn try_consume(&self) -> bool {
        !self.consumed.swap(true, Ordering::SeqCst)
    }
}

/// Ownership-scoped collection of pending timers.
///
/// Each timer runs as a tokio task racing its delay against a child of
/// the registry's cancellation token. Dropping the registry cancels every
/// timer it still owns.
#[derive(Debug)]
pub struct TimerRegistry {
    next_id: AtomicU64,
    live: Arc<DashMap<TimerId, TimerHandle>>,
    root: CancellationToken,
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            live: Arc::new(DashMap::new()),
            root: CancellationToken::new(),
        }
    }

    /// Returns the current tokio runtime handle.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::NoRuntime` when called outside a runtime.
    pub fn ensure_runtime(&self) -> Result<Handle, SequencerError> {
        Handle::try_current().map_err(|_| SequencerError::NoRuntime)
    }

    /// Schedules `callback` to run once after `delay`.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::NoRuntime` when called outside a runtime.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> Result<TimerHandle, SequencerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_tagged(0, delay, callback)
    }

    /// Schedules `callback` under an owner `tag`, for use with
    /// [`cancel_tagged`](Self::cancel_tagged).
    ///
    /// After [`shutdown`](Self::shutdown) the returned handle is already
    /// consumed and the callback never runs.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::NoRuntime` when called outside a runtime.
    pub fn schedule_tagged<F>(
        &self,
        tag: u64,
        delay: Duration,
        callback: F,
    ) -> Result<TimerHandle, SequencerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = self.ensure_runtime()?;
        let id = TimerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let handle = TimerHandle {
            id,
            tag,
            consumed: Arc::new(AtomicBool::new(false)),
            token: self.root.child_token(),
        };

        if self.root.is_cancelled() {
            debug!(%id, "registry shut down; timer cancelled on creation");
            handle.try_consume();
            return Ok(handle);
        }

        self.live.insert(id, handle.clone());
        trace!(%id, tag, delay_ms = delay.as_millis(), "timer scheduled");

        // Deadline is fixed here, not when the task is first polled.
        let sleep = {
            let _guard = runtime.enter();
            tokio::time::sleep(delay)
        };
        let live = Arc::clone(&self.live);
        let task_handle = handle.clone();
        runtime.spawn(async move {
            tokio::select! {
                () = task_handle.token.cancelled() => {}
                () = sleep => {
                    if task_handle.try_consume() {
                        trace!(id = %task_handle.id, "timer fired");
                        callback();
                    }
                    // Stays live until the callback returns, so a zero
                    // live count means every fired callback has finished.
                    live.remove(&task_handle.id);
                }
            }
        });

        Ok(handle)
    }

    /// Cancels a single timer.
    ///
    /// Returns `true` if this call cancelled it, `false` if it had
    /// already fired or been cancelled.
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        let won = handle.try_consume();
        handle.token.cancel();
        // A timer that lost the race is firing and removes itself.
        if won {
            self.live.remove(&handle.id);
            trace!(id = %handle.id, "timer cancelled");
        }
        won
    }

    /// Cancels every live timer scheduled under `tag`.
    ///
    /// Returns the number of timers cancelled.
    pub fn cancel_tagged(&self, tag: u64) -> usize {
        let doomed: Vec<TimerHandle> = self
            .live
            .iter()
            .filter(|entry| entry.value().tag == tag)
            .map(|entry| entry.value().clone())
            .collect();
        doomed.iter().filter(|h| self.cancel(h)).count()
    }

    /// Cancels every live timer.
    ///
    /// Returns the number of timers cancelled.
    pub fn cancel_all(&self) -> usize {
        let doomed: Vec<TimerHandle> = self
            .live
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        doomed.iter().filter(|h| self.cancel(h)).count()
    }

    /// Cancels every live timer and refuses later schedules.
    ///
    /// Returns the number of timers cancelled.
    pub fn shutdown(&self) -> usize {
        self.root.cancel();
        self.cancel_all()
    }

    /// Returns whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Number of timers that are pending, or firing and not yet returned.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
