//! Cue player
//!
//! Runs one catalog cue on a [`Sequencer`]: the cue's timed advances
//! become the timing plan and its gates become the actions a user can
//! take in each stage.

use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::config::CueDefinition;
use crate::error::SequencerError;
use crate::sequencer::{Sequencer, StageTransition};

use super::stage::NamedStage;

/// A running cue.
///
/// Dropping the player disposes its sequencer, so no timer outlives it.
pub struct CuePlayer {
    id: String,
    sequencer: Sequencer<NamedStage>,
    gates: HashMap<NamedStage, IndexMap<String, NamedStage>>,
    completed: watch::Receiver<bool>,
}

impl CuePlayer {
    /// Builds a player for `cue`.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::Configuration` if the cue's stages, timed
    /// advances, or gates do not form a valid sequence.
    pub fn new(cue: &CueDefinition) -> Result<Self, SequencerError> {
        let stages: Vec<NamedStage> = cue
            .stages
            .iter()
            .enumerate()
            .map(|(i, s)| NamedStage::new(s.name.as_str(), cue.is_terminal(i)))
            .collect();

        let lookup = |name: &str| -> Result<NamedStage, SequencerError> {
            cue.stage_index(name)
                .map(|i| stages[i].clone())
                .ok_or_else(|| {
                    SequencerError::configuration(format!(
                        "cue '{}' references unknown stage '{name}'",
                        cue.id
                    ))
                })
        };

        let mut timed: Vec<(NamedStage, NamedStage, Duration)> = Vec::new();
        let mut gates = HashMap::new();
        for (i, def) in cue.stages.iter().enumerate() {
            if let Some(advance) = &def.advance {
                let delay = advance
                    .delay()
                    .map_err(|e| SequencerError::configuration(e.to_string()))?;
                let target = cue.advance_target(i).ok_or_else(|| {
                    SequencerError::configuration(format!(
                        "stage '{}' has a timed advance but no next stage",
                        def.name
                    ))
                })?;
                timed.push((stages[i].clone(), lookup(target)?, delay));
            }

            if !def.gates.is_empty() {
                let mut actions = IndexMap::with_capacity(def.gates.len());
                for (action, target) in &def.gates {
                    actions.insert(action.clone(), lookup(target)?);
                }
                gates.insert(stages[i].clone(), actions);
            }
        }

        let (tx, rx) = watch::channel(false);
        let mut builder = Sequencer::builder(stages)
            .label(cue.id.clone())
            .on_complete(move || {
                tx.send_replace(true);
            });
        for (from, to, delay) in timed {
            builder = builder.timed(from, to, delay);
        }
        let sequencer = builder.build()?;

        Ok(Self {
            id: cue.id.clone(),
            sequencer,
            gates,
            completed: rx,
        })
    }

    /// Cue id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Starts the cue in its first stage.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::NoRuntime` if the first stage has a timed
    /// advance and no tokio runtime is running.
    pub fn start(&self) -> Result<(), SequencerError> {
        self.sequencer.start()
    }

    /// Performs a user action.
    ///
    /// Returns `Ok(true)` if the action belongs to the current stage and
    /// moved the cue. Actions from a stage the cue has already left, or
    /// unknown to the current stage, return `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Propagates sequencer errors, which indicate a defect.
    pub fn interact(&self, action: &str) -> Result<bool, SequencerError> {
        let current = self.sequencer.current();
        let Some(target) = self.gates.get(&current).and_then(|g| g.get(action)) else {
            debug!(cue = %self.id, stage = %current, action, "no such action in stage");
            return Ok(false);
        };
        self.sequencer.gate(&current, |seq| seq.advance_to(target))
    }

    /// Actions available in the current stage, in catalog order.
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        self.actions_for(&self.sequencer.current())
    }

    /// Actions available in `stage`, in catalog order.
    #[must_use]
    pub fn actions_for(&self, stage: &NamedStage) -> Vec<String> {
        self.gates
            .get(stage)
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Current stage.
    #[must_use]
    pub fn current_stage(&self) -> NamedStage {
        self.sequencer.current()
    }

    /// Whether the cue reached its terminal stage.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.sequencer.is_complete()
    }

    /// Waits for completion.
    ///
    /// Returns `false` if the player was disposed before completing.
    pub async fn completed(&self) -> bool {
        let mut rx = self.completed.clone();
        rx.wait_for(|done| *done).await.is_ok()
    }

    /// Subscribes to stage changes.
    #[must_use]
    pub fn transitions(&self) -> mpsc::UnboundedReceiver<StageTransition<NamedStage>> {
        self.sequencer.transitions()
    }

    /// Cancels pending timers and stops the cue.
    pub fn dispose(&self) {
        self.sequencer.dispose();
    }

    /// The underlying sequencer.
    #[must_use]
    pub const fn sequencer(&self) -> &Sequencer<NamedStage> {
        &self.sequencer
    }
}

impl Drop for CuePlayer {
    fn drop(&mut self) {
        self.sequencer.dispose();
    }
}

impl std::fmt::Debug for CuePlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CuePlayer")
            .field("id", &self.id)
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}
