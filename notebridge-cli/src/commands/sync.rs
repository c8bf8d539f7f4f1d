//! `notebridge sync`: one bidirectional pass over both trees.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use notebridge_sync::{pipeline, SyncResult, TracingSink, WriteResult};

/// Arguments for `notebridge sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Show what would be written without touching any file or the state.
    #[arg(long)]
    pub dry_run: bool,

    /// Record the id of every note in both trees before syncing.
    #[arg(long)]
    pub reindex: bool,

    /// Log every synced file and decision to stderr.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = crate::home_dir()?;

        if self.reindex && !self.dry_run {
            let updated = pipeline::reindex(&home, &TracingSink).context("reindex failed")?;
            println!("✓ Indexed note ids ({updated} new or renamed)");
        }

        let result = pipeline::run(&home, self.dry_run, &TracingSink).context("sync failed")?;
        print_result(&result, self.dry_run);

        if result.has_errors() {
            bail!("{} note pair(s) failed to sync", result.errors.len());
        }
        Ok(())
    }
}

fn print_result(result: &SyncResult, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    println!("{prefix}{result}");

    for write in &result.writes {
        match write {
            WriteResult::Written { path, .. } => println!("  ✎  {}", path.display()),
            WriteResult::WouldWrite { path } => println!("  ~  {}", path.display()),
            WriteResult::Unchanged { path, .. } => println!("  ·  {}", path.display()),
        }
    }

    for conflict in &result.conflicts {
        println!(
            "  {}  {} ({})",
            "⚠".yellow(),
            conflict.org.display(),
            conflict.reason
        );
    }

    if result.has_errors() {
        println!("{}", "Errors:".red().bold());
        for err in &result.errors {
            println!("  {} {err}", "✗".red());
        }
    }
}
