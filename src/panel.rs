//! Dashboard panel loader
//!
//! A dashboard tab waits for its data in `Loading`, shows `Errored` when
//! the load fails or times out, and can retry back into `Loading`. Each
//! attempt has a [`PanelAttempt`] token; results carrying an older token
//! are dropped even when the panel is `Loading` again.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::error::SequencerError;
use crate::sequencer::{Sequencer, Stage};

/// Stages of a dashboard panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelStage {
    /// Waiting for data
    Loading,
    /// Load failed or timed out
    Errored,
    /// Data shown
    Ready,
}

impl Stage for PanelStage {
    fn name(&self) -> &str {
        match self {
            Self::Loading => "loading",
            Self::Errored => "errored",
            Self::Ready => "ready",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Identifies one load attempt. Results must carry the attempt they
/// answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelAttempt(u64);

impl PanelAttempt {
    /// Attempt number, starting at zero.
    #[must_use]
    pub const fn number(self) -> u64 {
        self.0
    }
}

/// Loading state machine for one dashboard panel.
#[derive(Debug)]
pub struct PanelLoader {
    sequencer: Sequencer<PanelStage>,
    ready: watch::Receiver<bool>,
    /// Current attempt; held across each gate so a retry cannot slip in
    /// between the attempt check and the stage check.
    attempt: Mutex<u64>,
}

impl PanelLoader {
    /// Creates a loader. With a `timeout`, every `Loading` entry moves to
    /// `Errored` once the timeout passes without a result.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::Configuration` if the stage plan is
    /// rejected; this does not happen for the built-in stages.
    pub fn new(label: impl Into<String>, timeout: Option<Duration>) -> Result<Self, SequencerError> {
        let (tx, rx) = watch::channel(false);
        let mut builder = Sequencer::builder(vec![
            PanelStage::Loading,
            PanelStage::Errored,
            PanelStage::Ready,
        ])
        .label(label)
        .on_complete(move || {
            tx.send_replace(true);
        });
        if let Some(timeout) = timeout {
            builder = builder.timed(PanelStage::Loading, PanelStage::Errored, timeout);
        }
        Ok(Self {
            sequencer: builder.build()?,
            ready: rx,
            attempt: Mutex::new(0),
        })
    }

    fn lock_attempt(&self) -> MutexGuard<'_, u64> {
        self.attempt.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the first load attempt and returns its token.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::NoRuntime` if a timeout is configured and
    /// no tokio runtime is running.
    pub fn start(&self) -> Result<PanelAttempt, SequencerError> {
        let attempt = self.lock_attempt();
        self.sequencer.start()?;
        Ok(PanelAttempt(*attempt))
    }

    /// Delivers the data for `attempt`.
    ///
    /// Ignored unless the panel is `Loading` that same attempt.
    ///
    /// # Errors
    ///
    /// Propagates sequencer errors, which indicate a defect.
    pub fn resolve(&self, attempt: PanelAttempt) -> Result<bool, SequencerError> {
        self.settle_attempt(attempt, PanelStage::Ready)
    }

    /// Reports that `attempt` failed.
    ///
    /// Ignored unless the panel is `Loading` that same attempt.
    ///
    /// # Errors
    ///
    /// Propagates sequencer errors, which indicate a defect.
    pub fn fail(&self, attempt: PanelAttempt) -> Result<bool, SequencerError> {
        self.settle_attempt(attempt, PanelStage::Errored)
    }

    fn settle_attempt(&self, attempt: PanelAttempt, to: PanelStage) -> Result<bool, SequencerError> {
        let current = self.lock_attempt();
        if attempt.0 != *current {
            debug!(
                label = self.sequencer.label(),
                attempt = attempt.0,
                current = *current,
                "result from an abandoned attempt dropped"
            );
            return Ok(false);
        }
        self.sequencer
            .gate(&PanelStage::Loading, |s| s.advance_to(&to))
    }

    /// Starts a new attempt and returns its token, or `None` unless the
    /// panel is `Errored`.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::NoRuntime` if a timeout is configured and
    /// no tokio runtime is running.
    pub fn retry(&self) -> Result<Option<PanelAttempt>, SequencerError> {
        let mut current = self.lock_attempt();
        let accepted = self
            .sequencer
            .gate(&PanelStage::Errored, |s| s.advance_to(&PanelStage::Loading))?;
        if !accepted {
            return Ok(None);
        }
        *current += 1;
        Ok(Some(PanelAttempt(*current)))
    }

    /// Current attempt.
    #[must_use]
    pub fn attempt(&self) -> PanelAttempt {
        PanelAttempt(*self.lock_attempt())
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> PanelStage {
        self.sequencer.current()
    }

    /// Whether the data has been shown.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.sequencer.is_complete()
    }

    /// Waits until the panel is ready. Returns `false` if it was disposed first.
    pub async fn ready(&self) -> bool {
        let mut rx = self.ready.clone();
        rx.wait_for(|ready| *ready).await.is_ok()
    }

    /// Stops the loader; pending timeouts are cancelled.
    pub fn dispose(&self) {
        self.sequencer.dispose();
    }
}

impl Drop for PanelLoader {
    fn drop(&mut self) {
        self.sequencer.dispose();
    }
}
