//! NaviCue cards
//!
//! The stage vocabulary of a cue and the [`CuePlayer`] that runs one
//! catalog entry on a [`Sequencer`](crate::sequencer::Sequencer).

pub mod player;
pub mod stage;

pub use player::CuePlayer;
pub use stage::{CueStage, NamedStage};
