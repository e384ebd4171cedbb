//! Logging initialization for `NaviCue`.
//!
//! Structured logging via `tracing`. Logs always go to stderr because
//! stdout carries the JSONL cue event stream. Verbosity flags are scoped
//! to `navicue` targets so `-v` shows stage transitions without runtime
//! noise; `NAVICUE_LOG_LEVEL` overrides them with a full filter.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Environment variable that overrides the verbosity flags.
pub const LOG_LEVEL_ENV: &str = "NAVICUE_LOG_LEVEL";

/// Maps a verbosity level to a tracing filter.
///
/// Verbosity raises `navicue` targets first; dependencies (tokio, the
/// Prometheus exporter) stay at `warn` until `-vvv`.
///
/// - 0 → `"warn"`
/// - 1 → `"warn,navicue=info"` (stage transitions, cue lifecycle)
/// - 2 → `"warn,navicue=debug"` (rejected gates, stale timers)
/// - 3 → `"info,navicue=trace"` (individual timer fire and cancel)
/// - 4+ → `"trace"` (saturates)
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,navicue=info",
        2 => "warn,navicue=debug",
        3 => "info,navicue=trace",
        _ => "trace",
    }
}

fn build_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)))
}

/// Initializes the global tracing subscriber on stderr.
///
/// `LOG_LEVEL_ENV` takes precedence over `verbosity`. JSON output flattens
/// event fields to the top level so log lines read like the cue event
/// stream. Uses `try_init()` so calling this more than once is safe.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = build_filter(verbosity);
    let show_target = verbosity >= 2;

    match format {
        LogFormat::Human => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(use_ansi(color))
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .flatten_event(true)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

fn use_ansi(color: ColorChoice) -> bool {
    match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_default_is_human() {
        assert_eq!(LogFormat::default(), LogFormat::Human);
    }

    #[test]
    fn init_logging_does_not_panic() {
        init_logging(LogFormat::Human, 0, ColorChoice::Auto);
        init_logging(LogFormat::Json, 3, ColorChoice::Never);
    }

    #[test]
    fn verbosity_mapping() {
        assert_eq!(verbosity_to_directive(0), "warn");
        assert_eq!(verbosity_to_directive(1), "warn,navicue=info");
        assert_eq!(verbosity_to_directive(2), "warn,navicue=debug");
        assert_eq!(verbosity_to_directive(3), "info,navicue=trace");
        assert_eq!(verbosity_to_directive(255), "trace");
    }

    #[test]
    fn every_directive_parses() {
        for verbosity in 0..=4 {
            let directive = verbosity_to_directive(verbosity);
            assert!(
                EnvFilter::try_new(directive).is_ok(),
                "directive {directive:?} should parse"
            );
        }
    }

    #[test]
    fn color_choice_overrides_detection() {
        assert!(use_ansi(ColorChoice::Always));
        assert!(!use_ansi(ColorChoice::Never));
    }
}
