//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod cue;
pub mod version;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands, CueSubcommand};
use crate::error::NaviCueError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `cancel` is triggered by the first SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), NaviCueError> {
    match cli.command {
        Commands::Cue(cmd) => match cmd.subcommand {
            CueSubcommand::Run(args) => cue::run(&args, cancel).await,
            CueSubcommand::Validate(args) => cue::validate(&args),
            CueSubcommand::List(args) => cue::list(&args),
        },
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
