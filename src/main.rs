//! `NaviCue` - Timed stage sequencer for guided micro-experiences

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use navicue::cli::args::{Cli, OutputFormat};
use navicue::cli::commands;
use navicue::error::ExitCode;
use navicue::observability::{LogFormat, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        let format = match cli.log_format {
            OutputFormat::Human => LogFormat::Human,
            OutputFormat::Json => LogFormat::Json,
        };
        init_logging(format, cli.verbose, cli.color);
    }

    let cancel = CancellationToken::new();
    let signal_code = Arc::new(AtomicI32::new(ExitCode::SUCCESS));

    // Spawn signal handler for graceful shutdown
    {
        let cancel = cancel.clone();
        let signal_code = Arc::clone(&signal_code);
        tokio::spawn(async move {
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => Some(sigterm),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to register SIGTERM handler");
                    None
                }
            };

            let code = tokio::select! {
                _ = tokio::signal::ctrl_c() => ExitCode::INTERRUPTED,
                Some(()) = recv_sigterm(sigterm.as_mut()) => ExitCode::TERMINATED,
            };
            signal_code.store(code, Ordering::SeqCst);
            cancel.cancel();

            eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");

            tokio::select! {
                _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
                Some(()) = recv_sigterm(sigterm.as_mut()) => std::process::exit(ExitCode::TERMINATED),
            }
        });
    }

    let result = commands::dispatch(cli, cancel).await;

    match result {
        // Interrupted runs still finish cleanly but report the signal
        Ok(()) => std::process::exit(signal_code.load(Ordering::SeqCst)),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

/// Waits for SIGTERM, or forever when the handler could not be registered.
async fn recv_sigterm(sigterm: Option<&mut tokio::signal::unix::Signal>) -> Option<()> {
    match sigterm {
        Some(sigterm) => sigterm.recv().await,
        None => std::future::pending().await,
    }
}
