//! Timed stage sequencer
//!
//! A small state machine that walks a host through an ordered list of
//! named stages. Stages are left either after an elapsed delay or through
//! a single gated user action, and reaching the terminal stage signals
//! completion exactly once.
//!
//! # Architecture
//!
//! - [`Sequencer`] - Orchestrator (current stage, timing plan, gates, disposal)
//! - [`TimerRegistry`] - Ownership-scoped set of pending timed callbacks
//! - [`CompletionLatch`] - One-shot gate for the completion callback
//! - [`StageSet`] - Validated, ordered stage list with exactly one terminal stage

pub mod engine;
pub mod latch;
pub mod stage;
pub mod timer;

pub use engine::{Sequencer, SequencerBuilder, StageTransition, TransitionCause};
pub use latch::CompletionLatch;
pub use stage::{Stage, StageSet};
pub use timer::{TimerHandle, TimerId, TimerRegistry};
