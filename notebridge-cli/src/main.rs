//! Notebridge: keep an org-mode tree and a markdown vault in sync.
//!
//! # Usage
//!
//! ```text
//! notebridge init --org-dir ~/org --markdown-dir ~/vault [--strategy S] [--exclude GLOB]..
//! notebridge sync [--dry-run] [--reindex] [--verbose]
//! notebridge status [--json]
//! notebridge diff <relative-path>
//! notebridge resolve <relative-path> --use org|markdown|last-write-wins|skip [--dry-run]
//! notebridge daemon start|stop|status|logs
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, diff::DiffArgs, init::InitArgs, resolve::ResolveArgs,
    status::StatusArgs, sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "notebridge",
    version,
    about = "Bidirectional sync between org-mode notes and a markdown vault",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.notebridge/config.yaml and create both note trees.
    Init(InitArgs),

    /// Run one bidirectional sync pass.
    Sync(SyncArgs),

    /// Show pending changes and potential conflicts.
    Status(StatusArgs),

    /// Show the unified diff the next pass would apply to one note.
    Diff(DiffArgs),

    /// Pick a side for one note pair by hand.
    Resolve(ResolveArgs),

    /// Run or talk to the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = matches!(&cli.command, Commands::Sync(args) if args.verbose);
    // The daemon installs its own file subscriber.
    if !matches!(
        &cli.command,
        Commands::Daemon {
            command: DaemonCommand::Start
        }
    ) {
        init_tracing(verbose);
    }

    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Resolve(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Library events go to stderr: `warn` and up by default, `info` with
/// `--verbose`, or whatever `RUST_LOG` says.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
