//! Error types for `NaviCue`
//!
//! Domain errors for the stage sequencer and the cue catalog configuration,
//! aggregated into [`NaviCueError`] with a CLI exit code mapping.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `navicue` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Sequencer error (malformed stage list, unknown stage)
    pub const SEQUENCER_ERROR: i32 = 5;

    /// Usage error (invalid arguments, unknown cue id)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `NaviCue` operations.
///
/// Aggregates the domain errors and maps each one to an exit code.
#[derive(Debug, Error)]
pub enum NaviCueError {
    /// Cue catalog loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Stage sequencer misuse or misconfiguration
    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// One or more files failed `cue validate`
    #[error("{failed} of {total} file(s) failed validation")]
    ValidationFailed {
        /// Number of failing files
        failed: usize,
        /// Number of files checked
        total: usize,
    },
}

impl NaviCueError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) | Self::ValidationFailed { .. } => {
                ExitCode::CONFIG_ERROR
            }
            Self::Sequencer(_) => ExitCode::SEQUENCER_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Sequencer Errors
// ============================================================================

/// Stage sequencer errors.
///
/// Both configuration variants indicate a defect in the host, never a
/// runtime condition. Late or duplicate gate input is not an error and
/// has no variant here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencerError {
    /// Malformed stage list or timing plan, detected at construction.
    #[error("invalid sequencer configuration: {reason}")]
    Configuration {
        /// What is wrong with the configuration
        reason: String,
    },

    /// A transition targeted a stage outside the configured set.
    #[error("stage '{stage}' is not part of this sequence")]
    InvalidStage {
        /// Name of the offending stage
        stage: String,
    },

    /// A timer was scheduled outside of a tokio runtime.
    #[error("timers require a running tokio runtime")]
    NoRuntime,
}

impl SequencerError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Cue catalog loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Configuration file is empty
    #[error("configuration file is empty: {path}")]
    EmptyFile {
        /// Path to the empty file
        path: PathBuf,
    },

    /// Configuration file exceeds the size limit
    #[error("configuration file {path} is {size} bytes (limit: {limit})")]
    TooLarge {
        /// Path to the file
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: usize,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

fn summarize(errors: &[ValidationIssue]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "cues[0].stages[2].advance")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `NaviCue` operations.
pub type Result<T> = std::result::Result<T, NaviCueError>;

// ============================================================================
// Tests
// ============================================================================
