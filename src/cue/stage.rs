//! Stage types for NaviCue cards.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::sequencer::Stage;

/// The four stages shared by the built-in NaviCue cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueStage {
    /// Card fades in
    Arriving,
    /// Card waits for the user
    Active,
    /// Response to the user's action
    Resonant,
    /// Closing state; completes the cue
    Afterglow,
}

impl CueStage {
    /// All stages in order.
    pub const ALL: [Self; 4] = [Self::Arriving, Self::Active, Self::Resonant, Self::Afterglow];

    /// Stage name as used in catalogs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arriving => "arriving",
            Self::Active => "active",
            Self::Resonant => "resonant",
            Self::Afterglow => "afterglow",
        }
    }
}

impl Stage for CueStage {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Afterglow)
    }
}

impl std::fmt::Display for CueStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage defined by a catalog entry rather than a Rust enum.
///
/// Equality and hashing use the name only, so a stage can be looked up by
/// name without knowing whether it is terminal.
#[derive(Debug, Clone)]
pub struct NamedStage {
    name: Arc<str>,
    terminal: bool,
}

impl NamedStage {
    /// Creates a stage.
    pub fn new(name: impl Into<Arc<str>>, terminal: bool) -> Self {
        Self {
            name: name.into(),
            terminal,
        }
    }
}

impl PartialEq for NamedStage {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for NamedStage {}

impl Hash for NamedStage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Stage for NamedStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }
}

impl std::fmt::Display for NamedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
