//! Cue catalog configuration
//!
//! Loads and validates the YAML catalog that defines each cue's stages,
//! timed advances, and gates.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use schema::*;
pub use validation::{ValidationResult, Validator, suggest};
