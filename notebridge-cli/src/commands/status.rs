//! `notebridge status`: pending changes and potential conflicts.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use notebridge_core::Side;
use notebridge_sync::status::{last_sync_age_at, preview_files, report, StatusReport};
use notebridge_sync::pipeline;

/// Arguments for `notebridge status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = crate::home_dir()?;
        let (config, state) = pipeline::snapshot(&home)
            .context("failed to load config or state; run `notebridge init` first")?;
        let report = report(&config, &state).context("failed to scan note trees")?;
        let last_sync = last_sync_age_at(&home);

        if self.json {
            let payload = StatusJson {
                last_sync_age: last_sync,
                report,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&report, last_sync);
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson {
    last_sync_age: Option<String>,
    #[serde(flatten)]
    report: StatusReport,
}

#[derive(Tabled)]
struct SideRow {
    #[tabled(rename = "side")]
    side: String,
    #[tabled(rename = "root")]
    root: String,
    #[tabled(rename = "notes")]
    notes: usize,
    #[tabled(rename = "pending")]
    pending: usize,
    #[tabled(rename = "changed")]
    changed: String,
}

fn print_table(report: &StatusReport, last_sync: Option<String>) {
    println!(
        "Notebridge v{} | {} tracked pairs | {} known ids | last sync {}",
        env!("CARGO_PKG_VERSION"),
        report.tracked_pairs,
        report.known_ids,
        last_sync.map_or_else(|| "never".to_string(), |age| format!("{age} ago")),
    );

    let rows = [
        (Side::Org, &report.org_dir, report.org_files),
        (Side::Markdown, &report.markdown_dir, report.markdown_files),
    ]
    .into_iter()
    .map(|(side, root, notes)| {
        let pending = report.pending(side);
        SideRow {
            side: side.to_string(),
            root: root.display().to_string(),
            notes,
            pending: pending.len(),
            changed: if pending.is_empty() {
                "-".to_string()
            } else {
                preview_files(pending)
            },
        }
    });
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if report.is_clean() {
        println!("{} Both trees are in sync.", "■".green().bold());
        return;
    }
    if !report.conflicts.is_empty() {
        println!(
            "{} {} note(s) changed on both sides: {}",
            "■".red().bold(),
            report.conflicts.len(),
            preview_files(&report.conflicts),
        );
        println!("Run 'notebridge diff <path>' to inspect, 'notebridge resolve' to pick a side.");
    }
    println!(
        "{} Run 'notebridge sync' to apply pending changes.",
        "■".yellow().bold()
    );
}
