//! Command-line interface
//!
//! Argument parsing and command handlers for the `navicue` binary.

pub mod args;
pub mod commands;
