//! Stage sequencer orchestration
//!
//! The [`Sequencer`] owns the current stage of one running experience,
//! drives timed transitions through its [`TimerRegistry`], accepts gated
//! user actions only in the stage they belong to, and reports completion
//! through its [`CompletionLatch`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SequencerError;
use crate::observability::metrics as obs;

use super::latch::CompletionLatch;
use super::stage::{Stage, StageSet};
use super::timer::{TimerHandle, TimerRegistry};

type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Why a stage change happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    /// A scheduled timed transition fired.
    Timer,
    /// A gate action accepted in the previous stage advanced the sequence.
    Gate,
    /// The host called `advance_to` directly.
    Direct,
}

impl std::fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timer => "timer",
            Self::Gate => "gate",
            Self::Direct => "direct",
        };
        f.write_str(s)
    }
}

/// Record of a committed stage change, delivered to observers in commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTransition<S> {
    /// Stage that was left
    pub from: S,
    /// Stage that was entered
    pub to: S,
    /// What drove the change
    pub cause: TransitionCause,
    /// Whether `to` completed the sequence
    pub completed: bool,
}

#[derive(Debug, Clone, Copy)]
struct TimedTransition {
    target: usize,
    delay: Duration,
}

/// Builder for a [`Sequencer`] with a timing plan.
///
/// The timing plan gives each stage at most one timed transition; it is
/// scheduled automatically whenever that stage is entered.
pub struct SequencerBuilder<S: Stage> {
    stages: Vec<S>,
    initial: Option<S>,
    timed: Vec<(S, S, Duration)>,
    on_complete: Option<CompletionCallback>,
    label: Option<String>,
}

impl<S: Stage> SequencerBuilder<S> {
    /// Overrides the initial stage (defaults to the first stage).
    #[must_use]
    pub fn initial(mut self, stage: S) -> Self {
        self.initial = Some(stage);
        self
    }

    /// Adds a timed transition from `from` to `to` after `delay`,
    /// measured from entry into `from`.
    #[must_use]
    pub fn timed(mut self, from: S, to: S, delay: Duration) -> Self {
        self.timed.push((from, to, delay));
        self
    }

    /// Sets the callback invoked once when the terminal stage is reached.
    #[must_use]
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Sets a label used in log output.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Validates the configuration and builds the sequencer.
    ///
    /// No timers are started; call [`Sequencer::start`] to run the plan.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::Configuration` if the stage list is
    /// malformed, the timing plan names a stage outside the list, a stage
    /// has two timed transitions, or the terminal stage has one.
    pub fn build(self) -> Result<Sequencer<S>, SequencerError> {
        let stages = StageSet::new(self.stages, self.initial.as_ref())?;

        let mut plan = HashMap::with_capacity(self.timed.len());
        for (from, to, delay) in &self.timed {
            let (Some(from_idx), Some(to_idx)) = (stages.position(from), stages.position(to))
            else {
                return Err(SequencerError::configuration(format!(
                    "timed transition {} -> {} names a stage outside the list",
                    from.name(),
                    to.name()
                )));
            };
            if stages.is_terminal(from_idx) {
                return Err(SequencerError::configuration(format!(
                    "terminal stage '{}' cannot have a timed transition",
                    from.name()
                )));
            }
            let timed = TimedTransition {
                target: to_idx,
                delay: *delay,
            };
            if plan.insert(from_idx, timed).is_some() {
                return Err(SequencerError::configuration(format!(
                    "stage '{}' has more than one timed transition",
                    from.name()
                )));
            }
        }

        let id = Uuid::new_v4();
        let label = self.label.unwrap_or_else(|| id.to_string());
        let initial = stages.initial();
        debug!(%label, stages = stages.len(), timed = plan.len(), "sequencer created");
        obs::sequencer_created();

        Ok(Sequencer {
            shared: Arc::new(Shared {
                label,
                stages,
                plan,
                timers: TimerRegistry::new(),
                latch: CompletionLatch::new(),
                state: Mutex::new(SequencerState {
                    current: initial,
                    generation: 0,
                    started: false,
                    disposed: false,
                    gating: false,
                    on_complete: self.on_complete,
                    observer: None,
                }),
            }),
        })
    }
}

/// Timed stage sequencer.
///
/// Cheap to clone; all clones drive the same instance. Exactly one stage
/// is current at any time. Timed transitions are keyed to the stage entry
/// that scheduled them, so leaving a stage (by timer, gate, or
/// `advance_to`) cancels them before the new stage is committed.
///
/// Dropping every clone cancels all pending timers.
pub struct Sequencer<S: Stage> {
    shared: Arc<Shared<S>>,
}

impl<S: Stage> Clone for Sequencer<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<S: Stage> {
    label: String,
    stages: StageSet<S>,
    plan: HashMap<usize, TimedTransition>,
    timers: TimerRegistry,
    latch: CompletionLatch,
    state: Mutex<SequencerState<S>>,
}

struct SequencerState<S> {
    /// Index of the current stage
    current: usize,
    /// Bumped on every stage entry and every accepted gate; timers carry
    /// the generation they were scheduled in.
    generation: u64,
    started: bool,
    disposed: bool,
    /// A gate action is running
    gating: bool,
    on_complete: Option<CompletionCallback>,
    observer: Option<mpsc::UnboundedSender<StageTransition<S>>>,
}

impl<S: Stage> Sequencer<S> {
    /// Creates a sequencer without a timing plan.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::Configuration` if the stage list is malformed.
    pub fn new(stages: Vec<S>, initial: Option<S>) -> Result<Self, SequencerError> {
        let builder = Self::builder(stages);
        match initial {
            Some(stage) => builder.initial(stage).build(),
            None => builder.build(),
        }
    }

    /// Starts building a sequencer over `stages`.
    #[must_use]
    pub fn builder(stages: Vec<S>) -> SequencerBuilder<S> {
        SequencerBuilder {
            stages,
            initial: None,
            timed: Vec::new(),
            on_complete: None,
            label: None,
        }
    }

    /// Starts the timing plan for the initial stage.
    ///
    /// If the initial stage is terminal the sequence completes immediately.
    /// Calling `start` again, or after `dispose`, does nothing.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::NoRuntime` if the initial stage has a timed
    /// transition and no tokio runtime is running.
    pub fn start(&self) -> Result<(), SequencerError> {
        let callback = {
            let mut state = self.shared.lock();
            if state.started || state.disposed {
                return Ok(());
            }
            if self.shared.plan.contains_key(&state.current) {
                self.shared.timers.ensure_runtime()?;
            }
            state.started = true;
            let initial = state.current;
            info!(label = %self.shared.label, stage = self.shared.stages.at(initial).name(), "sequence started");

            if self.shared.stages.is_terminal(initial) {
                warn!(label = %self.shared.label, "initial stage is terminal; completing immediately");
                self.shared.complete(&mut state)
            } else {
                self.shared.schedule_planned(&state)?;
                None
            }
        };
        run_completion(callback);
        Ok(())
    }

    /// Moves to `stage` unconditionally.
    ///
    /// Cancels the timers of the stage being left, schedules the planned
    /// timed transition of `stage`, and trips the completion latch if
    /// `stage` is terminal. A silent no-op after `dispose`.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::InvalidStage` if `stage` is not configured,
    /// or `SequencerError::NoRuntime` if `stage` has a timed transition and
    /// no tokio runtime is running. The stage is unchanged in both cases.
    pub fn advance_to(&self, stage: &S) -> Result<(), SequencerError> {
        let callback = {
            let mut state = self.shared.lock();
            if state.disposed {
                debug!(label = %self.shared.label, stage = stage.name(), "advance ignored on disposed sequencer");
                return Ok(());
            }
            let target = self.shared.stages.require(stage)?;
            if self.shared.plan.contains_key(&target) {
                self.shared.timers.ensure_runtime()?;
            }
            let cause = if state.gating {
                TransitionCause::Gate
            } else {
                TransitionCause::Direct
            };
            self.shared.enter_stage(&mut state, target, cause)
        };
        run_completion(callback);
        Ok(())
    }

    /// Schedules a timed transition to `stage` after `delay`.
    ///
    /// The timer belongs to the current stage entry: any timer already
    /// pending for it is replaced, and leaving the stage cancels it.
    /// Returns `Ok(None)` after `dispose`.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::InvalidStage` if `stage` is not configured,
    /// or `SequencerError::NoRuntime` outside a tokio runtime.
    pub fn schedule_advance(
        &self,
        stage: &S,
        delay: Duration,
    ) -> Result<Option<TimerHandle>, SequencerError> {
        let state = self.shared.lock();
        if state.disposed {
            return Ok(None);
        }
        let target = self.shared.stages.require(stage)?;
        self.shared.schedule_locked(&state, target, delay).map(Some)
    }

    /// Runs `action` only if the current stage is `required`.
    ///
    /// When accepted, the pending timed transition of the stage is
    /// cancelled before `action` runs, and `Ok(true)` is returned (or the
    /// action's error). When the stage has already moved on, another gate
    /// action is still running, or the sequencer is disposed, `action`
    /// never runs and `Ok(false)` is returned.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::InvalidStage` if `required` is not
    /// configured, or any error returned by `action`.
    pub fn gate<F>(&self, required: &S, action: F) -> Result<bool, SequencerError>
    where
        F: FnOnce(&Self) -> Result<(), SequencerError>,
    {
        {
            let mut state = self.shared.lock();
            if state.disposed {
                return Ok(false);
            }
            let required_idx = self.shared.stages.require(required)?;
            if state.current != required_idx || state.gating {
                debug!(
                    label = %self.shared.label,
                    required = required.name(),
                    current = self.shared.stages.at(state.current).name(),
                    "gate rejected"
                );
                obs::record_gate_rejection();
                return Ok(false);
            }
            state.gating = true;
            let left = state.generation;
            state.generation += 1;
            let cancelled = self.shared.timers.cancel_tagged(left);
            obs::record_timers_cancelled(cancelled);
            debug!(label = %self.shared.label, stage = required.name(), cancelled, "gate accepted");
        }

        let _gating = GatingGuard {
            shared: &self.shared,
        };
        action(self)?;
        Ok(true)
    }

    /// Cancels every pending timer and makes the sequencer inert.
    ///
    /// The completion callback is dropped without running. Later calls to
    /// `advance_to`, `schedule_advance`, and `gate` are silent no-ops.
    /// Idempotent.
    pub fn dispose(&self) {
        let cancelled = {
            let mut state = self.shared.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.on_complete = None;
            state.observer = None;
            self.shared.timers.shutdown()
        };
        obs::record_timers_cancelled(cancelled);
        info!(label = %self.shared.label, cancelled, "sequencer disposed");
    }

    /// Returns the current stage.
    #[must_use]
    pub fn current(&self) -> S {
        let state = self.shared.lock();
        self.shared.stages.at(state.current).clone()
    }

    /// Returns the configured stages.
    #[must_use]
    pub fn stages(&self) -> &StageSet<S> {
        &self.shared.stages
    }

    /// Returns the log label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Returns whether the terminal stage has been reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shared.latch.is_tripped()
    }

    /// Returns whether `dispose` has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.lock().disposed
    }

    /// Number of timers still pending.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.shared.timers.live_count()
    }

    /// Subscribes to committed stage changes.
    ///
    /// Only one observer is kept; a later call replaces the earlier one.
    /// The channel closes when the sequencer is disposed or dropped.
    #[must_use]
    pub fn transitions(&self) -> mpsc::UnboundedReceiver<StageTransition<S>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.shared.lock();
        if !state.disposed {
            state.observer = Some(tx);
        }
        rx
    }
}

impl<S: Stage> std::fmt::Debug for Sequencer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Sequencer")
            .field("label", &self.shared.label)
            .field("current", self.shared.stages.at(state.current))
            .field("disposed", &state.disposed)
            .field("complete", &self.shared.latch.is_tripped())
            .finish_non_exhaustive()
    }
}

impl<S: Stage> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, SequencerState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commits a stage change. Must be called with the state lock held.
    ///
    /// Returns the completion callback when `target` completes the
    /// sequence; the caller runs it after releasing the lock.
    fn enter_stage(
        self: &Arc<Self>,
        state: &mut SequencerState<S>,
        target: usize,
        cause: TransitionCause,
    ) -> Option<CompletionCallback> {
        let from = state.current;
        let left = state.generation;
        state.current = target;
        state.generation += 1;

        obs::record_timers_cancelled(self.timers.cancel_tagged(left));
        obs::record_stage_transition(cause);

        let from_stage = self.stages.at(from);
        let to_stage = self.stages.at(target);
        let completed = self.stages.is_terminal(target);
        info!(
            label = %self.label,
            from = from_stage.name(),
            to = to_stage.name(),
            %cause,
            "stage transition"
        );

        let callback = if completed {
            self.complete(state)
        } else {
            if let Err(e) = self.schedule_planned(state) {
                // Callers check for a runtime before committing, so this only
                // happens if the runtime is shutting down.
                warn!(label = %self.label, error = %e, "failed to schedule planned transition");
            }
            None
        };

        // Observers see the stage only once its timers are in place.
        if let Some(observer) = &state.observer {
            let _ = observer.send(StageTransition {
                from: from_stage.clone(),
                to: to_stage.clone(),
                cause,
                completed,
            });
        }
        callback
    }

    /// Trips the latch and cancels every remaining timer.
    fn complete(&self, state: &mut SequencerState<S>) -> Option<CompletionCallback> {
        let mut callback = None;
        if self.latch.trip(|| callback = state.on_complete.take()) {
            info!(label = %self.label, "sequence complete");
            obs::record_completion();
        }
        obs::record_timers_cancelled(self.timers.cancel_all());
        callback
    }

    /// Schedules the timing plan entry of the current stage, if any.
    fn schedule_planned(self: &Arc<Self>, state: &SequencerState<S>) -> Result<(), SequencerError> {
        if let Some(timed) = self.plan.get(&state.current).copied() {
            self.schedule_locked(state, timed.target, timed.delay)?;
        }
        Ok(())
    }

    /// Schedules a timed transition for the current stage entry.
    fn schedule_locked(
        self: &Arc<Self>,
        state: &SequencerState<S>,
        target: usize,
        delay: Duration,
    ) -> Result<TimerHandle, SequencerError> {
        let generation = state.generation;
        let replaced = self.timers.cancel_tagged(generation);
        if replaced > 0 {
            debug!(label = %self.label, replaced, "replaced pending timed transition");
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = self.timers.schedule_tagged(generation, delay, move || {
            if let Some(shared) = weak.upgrade() {
                shared.fire_timed(generation, target);
            }
        })?;
        debug!(
            label = %self.label,
            from = self.stages.at(state.current).name(),
            to = self.stages.at(target).name(),
            delay_ms = delay.as_millis(),
            timer = %handle.id(),
            "timed transition scheduled"
        );
        Ok(handle)
    }

    /// Fire path of a timed transition.
    ///
    /// A timer that was already running when its stage was left, gated,
    /// or disposed finds a newer generation (or the disposed flag) and
    /// does nothing.
    fn fire_timed(self: &Arc<Self>, generation: u64, target: usize) {
        let callback = {
            let mut state = self.lock();
            if state.disposed || state.generation != generation {
                debug!(label = %self.label, generation, "stale timed transition ignored");
                return;
            }
            self.enter_stage(&mut state, target, TransitionCause::Timer)
        };
        run_completion(callback);
    }
}

impl<S: Stage> Drop for Shared<S> {
    fn drop(&mut self) {
        obs::sequencer_dropped();
    }
}

/// Clears the gating flag when a gate action finishes, even by unwinding.
struct GatingGuard<'a, S: Stage> {
    shared: &'a Arc<Shared<S>>,
}

impl<S: Stage> Drop for GatingGuard<'_, S> {
    fn drop(&mut self) {
        self.shared.lock().gating = false;
    }
}

fn run_completion(callback: Option<CompletionCallback>) {
    if let Some(callback) = callback {
        callback();
    }
}
