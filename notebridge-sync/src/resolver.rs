//! Conflict resolution for one note pair.
//!
//! Precedence, first match wins:
//! 1. neither file exists → none
//! 2. only org exists → org
//! 3. only markdown exists → markdown
//! 4. neither changed → none
//! 5. only org changed → org
//! 6. only markdown changed → markdown
//! 7. both changed → the configured [`ResolutionPolicy`]; always reported as
//!    a conflict. Last-write-wins gives ties to org.

use std::path::Path;

use notebridge_core::{ResolutionPolicy, Side, SyncState};

use crate::detector::{inspect, FileStatus};
use crate::error::SyncError;
use crate::events::{EventSink, SyncEvent};

/// Detector output for both halves of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairStatus {
    pub org: FileStatus,
    pub markdown: FileStatus,
}

impl PairStatus {
    pub fn inspect(org: &Path, markdown: &Path, state: &SyncState) -> Result<Self, SyncError> {
        Ok(Self {
            org: inspect(org, state)?,
            markdown: inspect(markdown, state)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDecision {
    /// Side whose content is authoritative; `None` means leave the pair alone.
    pub winner: Option<Side>,
    /// Human-readable justification, for logs only.
    pub reason: String,
    pub org_changed: bool,
    pub markdown_changed: bool,
    /// Both sides changed (case 7).
    pub conflict: bool,
}

/// Pure decision table over a [`PairStatus`].
pub fn decide(status: &PairStatus, policy: ResolutionPolicy) -> ConflictDecision {
    let org_changed = status.org.changed();
    let markdown_changed = status.markdown.changed();
    let decision = |winner: Option<Side>, reason: &str, conflict: bool| ConflictDecision {
        winner,
        reason: reason.to_string(),
        org_changed,
        markdown_changed,
        conflict,
    };

    let (org_mtime, md_mtime) = match (status.org.mtime(), status.markdown.mtime()) {
        (None, None) => return decision(None, "neither file exists", false),
        (Some(_), None) => return decision(Some(Side::Org), "markdown file does not exist", false),
        (None, Some(_)) => return decision(Some(Side::Markdown), "org file does not exist", false),
        (Some(org), Some(md)) => (org, md),
    };

    match (org_changed, markdown_changed) {
        (false, false) => decision(None, "no changes detected", false),
        (true, false) => decision(Some(Side::Org), "only org file changed", false),
        (false, true) => decision(Some(Side::Markdown), "only markdown file changed", false),
        (true, true) => match policy {
            ResolutionPolicy::UseOrg => decision(
                Some(Side::Org),
                "both changed, using org (configured strategy)",
                true,
            ),
            ResolutionPolicy::UseMarkdown => decision(
                Some(Side::Markdown),
                "both changed, using markdown (configured strategy)",
                true,
            ),
            ResolutionPolicy::LastWriteWins if org_mtime > md_mtime => decision(
                Some(Side::Org),
                "both changed, org is newer (last-write-wins)",
                true,
            ),
            ResolutionPolicy::LastWriteWins if md_mtime > org_mtime => decision(
                Some(Side::Markdown),
                "both changed, markdown is newer (last-write-wins)",
                true,
            ),
            ResolutionPolicy::LastWriteWins => decision(
                Some(Side::Org),
                "both changed, same modification time, org wins ties (last-write-wins)",
                true,
            ),
        },
    }
}

/// Probe both files, decide, and report conflicts to `sink`.
pub fn resolve(
    org: &Path,
    markdown: &Path,
    state: &SyncState,
    policy: ResolutionPolicy,
    sink: &dyn EventSink,
) -> Result<ConflictDecision, SyncError> {
    let status = PairStatus::inspect(org, markdown, state)?;
    let decision = decide(&status, policy);
    if let (true, Some(winner)) = (decision.conflict, decision.winner) {
        sink.emit(SyncEvent::ConflictResolved {
            org: org.to_path_buf(),
            markdown: markdown.to_path_buf(),
            winner,
            reason: decision.reason.clone(),
        });
    }
    Ok(decision)
}
