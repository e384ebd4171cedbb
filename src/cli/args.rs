//! CLI argument definitions
//!
//! All Clap derive structs for `navicue` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Timed stage sequencer for NaviCue cards.
#[derive(Parser, Debug)]
#[command(name = "navicue", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "NAVICUE_COLOR")]
    pub color: ColorChoice,

    /// Log output format (logs always go to stderr).
    #[arg(long, default_value = "human", global = true, env = "NAVICUE_LOG_FORMAT")]
    pub log_format: OutputFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play, validate, or list cues.
    Cue(CueCommand),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Cue Command
// ============================================================================

/// Cue commands.
#[derive(Args, Debug)]
pub struct CueCommand {
    /// Cue subcommand.
    #[command(subcommand)]
    pub subcommand: CueSubcommand,
}

/// Cue subcommands.
#[derive(Subcommand, Debug)]
pub enum CueSubcommand {
    /// Play a cue; each stdin line is a user action.
    Run(CueRunArgs),

    /// Validate catalog files without playing anything.
    Validate(CueValidateArgs),

    /// List the cues of a catalog.
    List(CueListArgs),
}

/// Arguments for `cue run`.
#[derive(Args, Debug)]
pub struct CueRunArgs {
    /// Path to the YAML cue catalog.
    #[arg(short, long, env = "NAVICUE_CONFIG")]
    pub config: PathBuf,

    /// Cue id to play (defaults to the first cue in the catalog).
    #[arg(long)]
    pub cue: Option<String>,

    /// Write events to this file instead of stdout.
    #[arg(long)]
    pub events_file: Option<PathBuf>,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "NAVICUE_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for `cue validate`.
#[derive(Args, Debug)]
pub struct CueValidateArgs {
    /// Catalog files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `cue list`.
#[derive(Args, Debug)]
pub struct CueListArgs {
    /// Path to the YAML cue catalog.
    #[arg(short, long, env = "NAVICUE_CONFIG")]
    pub config: PathBuf,

    /// Filter by tag.
    #[arg(long)]
    pub tag: Option<String>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Version Command
// ============================================================================

/// Arguments for `version`.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Shared Enums
// ============================================================================

/// Color output control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}
