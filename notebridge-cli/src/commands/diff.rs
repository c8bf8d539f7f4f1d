//! `notebridge diff <path>`: preview what the next pass would write.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use notebridge_sync::{diff::diff_pair, pipeline};

/// Arguments for `notebridge diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Note path relative to either tree, with or without extension.
    pub path: PathBuf,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let home = crate::home_dir()?;
        let (config, state) = pipeline::snapshot(&home).context("failed to load config or state")?;

        let diff = diff_pair(&config, &state, &self.path)
            .with_context(|| format!("diff failed for '{}'", self.path.display()))?;

        if diff.is_empty() {
            println!("No differences for '{}' ({}).", self.path.display(), diff.reason);
            return Ok(());
        }

        print!("{}", diff.unified_diff);
        if !diff.unified_diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
