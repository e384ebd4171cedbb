//! `NaviCue` - Timed stage sequencer for guided micro-experiences
//!
//! This library provides the stage sequencer behind `NaviCue` cards, the
//! cue catalog that feeds the Command Center, and the command-line player
//! used to rehearse cues outside a UI.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod cue;
pub mod error;
pub mod observability;
pub mod panel;
pub mod sequencer;
