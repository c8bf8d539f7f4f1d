//! Read-only status report for `notebridge status` and the daemon.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;

use notebridge_core::{Side, SyncConfig, SyncState};

use crate::detector::has_changed;
use crate::error::SyncError;
use crate::scan::scan_directory;

/// Snapshot of both trees against the tracked state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub org_dir: PathBuf,
    pub markdown_dir: PathBuf,
    pub org_files: usize,
    pub markdown_files: usize,
    pub tracked_pairs: usize,
    /// Tree-relative org notes that are new or changed.
    pub pending_org: Vec<PathBuf>,
    /// Tree-relative markdown notes that are new or changed.
    pub pending_markdown: Vec<PathBuf>,
    /// Tree-relative note paths (no extension) changed on both sides.
    pub conflicts: Vec<PathBuf>,
    pub known_ids: usize,
}

impl StatusReport {
    pub fn pending(&self, side: Side) -> &[PathBuf] {
        match side {
            Side::Org => &self.pending_org,
            Side::Markdown => &self.pending_markdown,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.pending_org.is_empty() && self.pending_markdown.is_empty()
    }
}

/// Scan both trees and classify every note. Writes nothing.
pub fn report(config: &SyncConfig, state: &SyncState) -> Result<StatusReport, SyncError> {
    let excludes = config.excludes()?;
    let mut counts = [0usize; 2];
    let mut pending: [Vec<PathBuf>; 2] = Default::default();

    for (slot, side) in [Side::Org, Side::Markdown].into_iter().enumerate() {
        let root = config.root(side);
        let files = scan_directory(root, side.extension(), &excludes)?;
        counts[slot] = files.len();
        for path in files {
            if has_changed(&path, state)? {
                pending[slot].push(path.strip_prefix(root).unwrap_or(&path).to_path_buf());
            }
        }
    }

    let org_stems: BTreeSet<PathBuf> = pending[0].iter().map(|p| stem(p)).collect();
    let conflicts = pending[1]
        .iter()
        .map(|p| stem(p))
        .filter(|s| org_stems.contains(s))
        .collect();
    let [pending_org, pending_markdown] = pending;
    Ok(StatusReport {
        org_dir: config.org_dir.clone(),
        markdown_dir: config.markdown_dir.clone(),
        org_files: counts[0],
        markdown_files: counts[1],
        tracked_pairs: state.tracked_pairs(),
        pending_org,
        pending_markdown,
        conflicts,
        known_ids: state.id_map.len(),
    })
}

/// Relative note path without its `.org`/`.md` extension.
fn stem(relative: &Path) -> PathBuf {
    relative.with_extension("")
}

/// Age of a filesystem timestamp, compact (`42s`, `5m`, `3h`, `2d`).
pub fn format_system_time_age(timestamp: SystemTime) -> String {
    let age = SystemTime::now()
        .duration_since(timestamp)
        .unwrap_or_default();
    format_seconds(age.as_secs())
}

/// Age of the state file under `home`, i.e. time since the last saved pass.
pub fn last_sync_age_at(home: &Path) -> Option<String> {
    let path = notebridge_core::config::state_path_at(home);
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(format_system_time_age(modified))
}

pub fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

/// First three paths, then `+N more`.
pub fn preview_files(paths: &[PathBuf]) -> String {
    let mut shown: Vec<String> = paths
        .iter()
        .take(3)
        .map(|p| p.display().to_string())
        .collect();
    if paths.len() > shown.len() {
        shown.push(format!("+{} more", paths.len() - shown.len()));
    }
    shown.join(", ")
}
