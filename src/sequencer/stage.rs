//! Stage identifiers and the validated stage list.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::SequencerError;

/// A named phase of a guided experience.
///
/// Hosts usually implement this on a fieldless enum; config-driven cues
/// use [`NamedStage`](crate::cue::NamedStage).
pub trait Stage: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Name of the stage, unique within one sequence.
    fn name(&self) -> &str;

    /// Whether arriving at this stage completes the sequence.
    fn is_terminal(&self) -> bool;
}

/// Ordered stage list checked once at construction.
///
/// Guarantees a non-empty list, unique names, exactly one terminal stage
/// and an initial stage that belongs to the list.
#[derive(Debug, Clone)]
pub struct StageSet<S: Stage> {
    stages: Vec<S>,
    initial: usize,
    terminal: usize,
}

impl<S: Stage> StageSet<S> {
    /// Validates `stages` and picks the initial stage.
    ///
    /// The initial stage defaults to the first stage in the list.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::Configuration` if the list is empty, has
    /// duplicate names, has zero or several terminal stages, or if
    /// `initial` is not part of the list.
    pub fn new(stages: Vec<S>, initial: Option<&S>) -> Result<Self, SequencerError> {
        if stages.is_empty() {
            return Err(SequencerError::configuration("stage list is empty"));
        }

        let mut seen = HashSet::with_capacity(stages.len());
        for stage in &stages {
            if !seen.insert(stage.name()) {
                return Err(SequencerError::configuration(format!(
                    "duplicate stage name '{}'",
                    stage.name()
                )));
            }
        }

        let terminals: Vec<usize> = stages
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_terminal())
            .map(|(i, _)| i)
            .collect();
        let terminal = match terminals.as_slice() {
            [] => return Err(SequencerError::configuration("no terminal stage")),
            [only] => *only,
            several => {
                let names: Vec<&str> = several.iter().map(|&i| stages[i].name()).collect();
                return Err(SequencerError::configuration(format!(
                    "expected exactly one terminal stage, found {}: {}",
                    names.len(),
                    names.join(", ")
                )));
            }
        };

        let initial = match initial {
            None => 0,
            Some(stage) => stages.iter().position(|s| s == stage).ok_or_else(|| {
                SequencerError::configuration(format!(
                    "initial stage '{}' is not in the stage list",
                    stage.name()
                ))
            })?,
        };

        Ok(Self {
            stages,
            initial,
            terminal,
        })
    }

    /// Returns the index of `stage`, if it belongs to the set.
    #[must_use]
    pub fn position(&self, stage: &S) -> Option<usize> {
        self.stages.iter().position(|s| s == stage)
    }

    /// Returns the index of `stage` or an `InvalidStage` error.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::InvalidStage` if `stage` is unknown.
    pub fn require(&self, stage: &S) -> Result<usize, SequencerError> {
        self.position(stage)
            .ok_or_else(|| SequencerError::InvalidStage {
                stage: stage.name().to_string(),
            })
    }

    /// Returns the stage at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&S> {
        self.stages.get(index)
    }

    /// Returns the stage at `index`, which must come from this set.
    pub(crate) fn at(&self, index: usize) -> &S {
        &self.stages[index]
    }

    /// Index of the initial stage.
    #[must_use]
    pub const fn initial(&self) -> usize {
        self.initial
    }

    /// Index of the terminal stage.
    #[must_use]
    pub const fn terminal(&self) -> usize {
        self.terminal
    }

    /// Whether the stage at `index` is the terminal stage.
    #[must_use]
    pub const fn is_terminal(&self, index: usize) -> bool {
        index == self.terminal
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always `false`; a validated set holds at least one stage.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Iterates the stages in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.stages.iter()
    }
}
