//! `notebridge init --org-dir <dir> --markdown-dir <dir> [...]`

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use notebridge_core::{config, ResolutionPolicy, SyncConfig};

/// Write the sync configuration and create both note trees.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Root of the org-mode tree.
    #[arg(long, value_name = "DIR")]
    pub org_dir: PathBuf,

    /// Root of the markdown vault.
    #[arg(long, value_name = "DIR")]
    pub markdown_dir: PathBuf,

    /// Conflict policy: last-write-wins | use-org | use-markdown.
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<ResolutionPolicy>,

    /// Glob of tree-relative paths to leave alone. Repeatable.
    #[arg(long = "exclude", value_name = "GLOB")]
    pub excludes: Vec<String>,

    /// Seconds between daemon passes.
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Daemon log file (default ~/.notebridge/logs/daemon.log).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Overwrite an existing configuration.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = crate::home_dir()?;
        let existing = config::config_path_at(&home);
        if existing.exists() && !self.force {
            bail!(
                "config already exists at {}; pass --force to overwrite",
                existing.display()
            );
        }

        let cwd = std::env::current_dir().context("cannot determine current directory")?;
        let mut config = SyncConfig::new(
            absolutize(&cwd, self.org_dir),
            absolutize(&cwd, self.markdown_dir),
        );
        if let Some(strategy) = self.strategy {
            config.resolution_strategy = strategy;
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        config.exclude_patterns = self.excludes;
        config.log_file = self.log_file.map(|log| absolutize(&cwd, log));
        config.expand_paths(&home);
        config.validate().context("invalid configuration")?;

        for dir in [&config.org_dir, &config.markdown_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let path = config::save_at(&home, &config).context("failed to save configuration")?;

        println!("✓ Configured notebridge");
        println!("  org:       {}", config.org_dir.display());
        println!("  markdown:  {}", config.markdown_dir.display());
        println!("  strategy:  {}", config.resolution_strategy);
        println!("  Saved to:  {}", path.display());
        Ok(())
    }
}

/// Anchor relative paths at `cwd`; `~/` paths are expanded later.
fn absolutize(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() || path.starts_with("~") {
        path
    } else {
        cwd.join(path)
    }
}
