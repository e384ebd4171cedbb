//! Cue command handlers
//!
//! Implements `cue run`, `cue validate`, and `cue list`.

use std::path::Path;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;
use crate::cli::args::{CueListArgs, CueRunArgs, CueValidateArgs, OutputFormat};
use crate::config::{ConfigLoader, CueDefinition, LoadWarning};
use crate::cue::CuePlayer;
use crate::error::{ConfigError, NaviCueError};
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;
use crate::sequencer::Stage;

// ============================================================================
// cue run
// ============================================================================

/// Play a cue from a catalog.
///
/// Each stdin line is an action name; events are written as JSONL. Once
/// stdin is closed the cue keeps running while a timed transition is
/// pending, and is disposed when nothing else can move it.
///
/// # Errors
///
/// Returns a config error if the catalog fails to load, a usage error for
/// an unknown cue id, or an I/O error if the events file cannot be created.
pub async fn run(args: &CueRunArgs, cancel: CancellationToken) -> Result<(), NaviCueError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    tracing::info!(config = %args.config.display(), "loading catalog");
    let loaded = ConfigLoader::with_defaults().load(&args.config)?;
    log_warnings(&loaded.warnings);

    let mut catalog = Catalog::from_config(loaded.config);
    let cue = match &args.cue {
        Some(id) => catalog.select(id)?.clone(),
        None => catalog
            .current()
            .cloned()
            .ok_or_else(|| NaviCueError::Usage("catalog has no cues".to_string()))?,
    };

    let emitter = match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::stdout(),
    };

    let stdin = BufReader::new(tokio::io::stdin()).lines();
    play(&cue, &emitter, stdin, cancel).await
}

/// Runs one cue to completion, disposal, or cancellation.
async fn play<R>(
    cue: &CueDefinition,
    emitter: &EventEmitter,
    mut input: tokio::io::Lines<R>,
    cancel: CancellationToken,
) -> Result<(), NaviCueError>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let player = CuePlayer::new(cue)?;
    let mut transitions = player.transitions();
    let started = Instant::now();

    let initial = player.current_stage();
    emitter.emit(Event::CueStarted {
        timestamp: Utc::now(),
        cue_id: cue.id.clone(),
        stage: initial.name().to_string(),
        actions: player.actions_for(&initial),
    });
    player.start()?;
    tracing::info!(cue = %cue.id, stage = %initial, "cue started");

    if player.is_complete() {
        finish(&player, emitter, started);
        return Ok(());
    }

    let mut input_open = true;
    loop {
        // Timers are counted before the queue is checked: a timer leaves
        // the registry only after its transition has been queued.
        if !input_open
            && player.sequencer().pending_timers() == 0
            && transitions.is_empty()
            && !player.is_complete()
        {
            dispose(&player, emitter, "input closed and no timed transition pending");
            return Ok(());
        }

        tokio::select! {
            () = cancel.cancelled() => {
                dispose(&player, emitter, "interrupted");
                return Ok(());
            }
            Some(transition) = transitions.recv() => {
                emitter.emit(Event::StageEntered {
                    timestamp: Utc::now(),
                    cue_id: cue.id.clone(),
                    from: transition.from.name().to_string(),
                    to: transition.to.name().to_string(),
                    cause: transition.cause.to_string(),
                    actions: player.actions_for(&transition.to),
                });
                if transition.completed {
                    finish(&player, emitter, started);
                    return Ok(());
                }
            }
            line = input.next_line(), if input_open => match line {
                Ok(Some(line)) => {
                    let action = line.trim();
                    if !action.is_empty() && !player.interact(action)? {
                        emitter.emit(Event::GateRejected {
                            timestamp: Utc::now(),
                            cue_id: cue.id.clone(),
                            action: action.to_string(),
                            stage: player.current_stage().name().to_string(),
                        });
                    }
                }
                Ok(None) => {
                    tracing::debug!(cue = %cue.id, "input closed");
                    input_open = false;
                }
                Err(e) => {
                    tracing::warn!(cue = %cue.id, error = %e, "failed to read input; ignoring further input");
                    input_open = false;
                }
            },
        }
    }
}

fn finish(player: &CuePlayer, emitter: &EventEmitter, started: Instant) {
    let elapsed = started.elapsed();
    metrics::record_cue_duration(elapsed);
    emitter.emit(Event::CueCompleted {
        timestamp: Utc::now(),
        cue_id: player.id().to_string(),
        duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    });
    tracing::info!(cue = player.id(), elapsed_ms = elapsed.as_millis(), "cue complete");
}

fn dispose(player: &CuePlayer, emitter: &EventEmitter, reason: &str) {
    player.dispose();
    emitter.emit(Event::CueDisposed {
        timestamp: Utc::now(),
        cue_id: player.id().to_string(),
        stage: player.current_stage().name().to_string(),
        reason: reason.to_string(),
    });
    tracing::info!(cue = player.id(), reason, "cue disposed");
}

fn log_warnings(warnings: &[LoadWarning]) {
    for warning in warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
}

// ============================================================================
// cue validate
// ============================================================================

/// Outcome of validating one file.
#[derive(Debug, serde::Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    cues: usize,
    errors: Vec<ReportIssue>,
    warnings: Vec<ReportIssue>,
}

#[derive(Debug, serde::Serialize)]
struct ReportIssue {
    path: Option<String>,
    message: String,
}

/// Validate catalog files without playing anything.
///
/// Every file is checked and reported before the command fails.
///
/// # Errors
///
/// Returns `NaviCueError::ValidationFailed` if any file has errors, or
/// warnings under `--strict`.
pub fn validate(args: &CueValidateArgs) -> Result<(), NaviCueError> {
    let loader = ConfigLoader::with_defaults();
    let reports: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| check_file(&loader, path, args.strict))
        .collect();

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                print_report(report);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    let failed = reports.iter().filter(|r| !r.valid).count();
    if failed > 0 {
        return Err(NaviCueError::ValidationFailed {
            failed,
            total: reports.len(),
        });
    }
    Ok(())
}

fn check_file(loader: &ConfigLoader, path: &Path, strict: bool) -> FileReport {
    tracing::info!(file = %path.display(), "validating catalog");
    let file = path.display().to_string();

    match loader.load(path) {
        Ok(loaded) => {
            let warnings: Vec<ReportIssue> = loaded
                .warnings
                .into_iter()
                .map(|w| ReportIssue {
                    path: w.location,
                    message: w.message,
                })
                .collect();
            FileReport {
                file,
                valid: !(strict && !warnings.is_empty()),
                cues: loaded.config.cues.len(),
                errors: Vec::new(),
                warnings,
            }
        }
        Err(ConfigError::ValidationError { errors, .. }) => FileReport {
            file,
            valid: false,
            cues: 0,
            errors: errors
                .into_iter()
                .map(|e| ReportIssue {
                    path: Some(e.path),
                    message: e.message,
                })
                .collect(),
            warnings: Vec::new(),
        },
        Err(e) => FileReport {
            file,
            valid: false,
            cues: 0,
            errors: vec![ReportIssue {
                path: None,
                message: e.to_string(),
            }],
            warnings: Vec::new(),
        },
    }
}

fn print_report(report: &FileReport) {
    if report.valid {
        println!("ok: {} ({} cue(s))", report.file, report.cues);
    } else {
        println!("FAILED: {}", report.file);
    }
    for (label, issues) in [("error", &report.errors), ("warning", &report.warnings)] {
        for issue in issues {
            match &issue.path {
                Some(path) => println!("  {label}: {} at {path}", issue.message),
                None => println!("  {label}: {}", issue.message),
            }
        }
    }
}

// ============================================================================
// cue list
// ============================================================================

#[derive(Debug, serde::Serialize)]
struct CueSummary<'a> {
    id: &'a str,
    title: &'a str,
    tags: &'a [String],
    stages: Vec<&'a str>,
    timed_ms: u64,
}

/// List the cues of a catalog in Command Center order.
///
/// # Errors
///
/// Returns a config error if the catalog fails to load.
pub fn list(args: &CueListArgs) -> Result<(), NaviCueError> {
    let loaded = ConfigLoader::with_defaults().load(&args.config)?;
    log_warnings(&loaded.warnings);
    let catalog = Catalog::from_config(loaded.config);

    let cues: Vec<&CueDefinition> = catalog
        .iter()
        .filter(|c| args.tag.as_ref().is_none_or(|t| c.tags.contains(t)))
        .collect();

    match args.format {
        OutputFormat::Human => {
            if let Some(name) = catalog.name() {
                println!("{name}");
            }
            for cue in &cues {
                println!(
                    "  {:<24} {:<28} {} ({})",
                    cue.id,
                    cue.display_title(),
                    cue.stage_chain(),
                    humantime::format_duration(cue.total_timed_duration())
                );
            }
        }
        OutputFormat::Json => {
            let summaries: Vec<CueSummary<'_>> = cues
                .iter()
                .map(|c| CueSummary {
                    id: &c.id,
                    title: c.display_title(),
                    tags: &c.tags,
                    stages: c.stages.iter().map(|s| s.name.as_str()).collect(),
                    timed_ms: u64::try_from(c.total_timed_duration().as_millis())
                        .unwrap_or(u64::MAX),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
    }
    Ok(())
}
