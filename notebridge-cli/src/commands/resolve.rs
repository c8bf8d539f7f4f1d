//! `notebridge resolve <path> --use <side>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use notebridge_core::Direction;
use notebridge_sync::{pipeline, TracingSink, WriteResult};

/// Arguments for `notebridge resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Note path relative to either tree, with or without extension.
    pub path: PathBuf,

    /// Side to keep: org | markdown | last-write-wins | skip.
    #[arg(long = "use", value_name = "SIDE")]
    pub direction: Direction,

    /// Show the outcome without writing.
    #[arg(long)]
    pub dry_run: bool,
}

impl ResolveArgs {
    pub fn run(self) -> Result<()> {
        let home = crate::home_dir()?;
        let write = pipeline::resolve(&home, &self.path, self.direction, self.dry_run, &TracingSink)
            .with_context(|| {
                format!(
                    "failed to resolve '{}' using {}",
                    self.path.display(),
                    self.direction
                )
            })?;

        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        match write {
            None => println!("{prefix}Skipped '{}'", self.path.display()),
            Some(WriteResult::Written { path, .. }) => {
                println!("{prefix}✓ Wrote {}", path.display())
            }
            Some(WriteResult::WouldWrite { path }) => {
                println!("{prefix}~ Would write {}", path.display())
            }
            Some(WriteResult::Unchanged { path, .. }) => {
                println!("{prefix}· {} already up to date", path.display())
            }
        }
        Ok(())
    }
}
