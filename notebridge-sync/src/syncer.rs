//! The sync orchestrator.
//!
//! One pass:
//! 1. scan both trees;
//! 2. for every org note, resolve and sync it against its mirrored markdown
//!    path;
//! 3. for every markdown note not reached in step 2, do the same;
//! 4. report a [`SyncResult`].
//!
//! Per-pair failures are collected and never abort the pass. Tracked state for
//! a pair is recorded only after its write succeeded.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use notebridge_convert::{note_id, HybridConverter};
use notebridge_core::{
    Direction, ExcludeSet, Mtime, Side, SyncConfig, SyncState, TrackedFileState,
};

use crate::error::{io_err, PairError, SyncError};
use crate::events::{EventSink, SyncEvent};
use crate::resolver::{self, ConflictDecision};
use crate::scan::{counterpart, scan_directory};
use crate::state_store;
use crate::writer::{atomic_write, content_hash, read_snapshot, WriteResult};

// ---------------------------------------------------------------------------
// 1. Results
// ---------------------------------------------------------------------------

/// A pair where both sides had changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    pub org: PathBuf,
    pub markdown: PathBuf,
    pub winner: Side,
    pub reason: String,
}

/// Aggregate outcome of one [`Syncer::sync`] pass.
#[derive(Debug)]
pub struct SyncResult {
    /// Pairs that were converted (or would have been, in dry-run mode).
    pub files_processed: usize,
    pub conflicts: Vec<ConflictRecord>,
    pub errors: Vec<PairError>,
    /// One entry per converted pair, describing the destination.
    pub writes: Vec<WriteResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncResult {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            files_processed: 0,
            conflicts: Vec::new(),
            errors: Vec::new(),
            writes: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn summary(&self) -> SyncSummary {
        SyncSummary {
            files_synced: self.files_processed,
            conflicts: self.conflicts.len(),
            errors: self.errors.len(),
            duration_ms: self.duration().as_millis() as u64,
            finished_at: self.finished_at,
        }
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sync complete: {} files synced, {} conflicts, {} errors (took {:.2?})",
            self.files_processed,
            self.conflicts.len(),
            self.errors.len(),
            self.duration()
        )
    }
}

/// Serializable counters of a finished pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub files_synced: usize,
    pub conflicts: usize,
    pub errors: usize,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// 2. Syncer
// ---------------------------------------------------------------------------

/// Runs sync passes for one configured pair of trees.
///
/// The syncer borrows the state exclusively for its lifetime; persisting it
/// is the caller's job unless a checkpoint path is set.
pub struct Syncer<'a> {
    config: &'a SyncConfig,
    excludes: ExcludeSet,
    state: &'a mut SyncState,
    sink: &'a dyn EventSink,
    dry_run: bool,
    checkpoint: Option<PathBuf>,
    converter: HybridConverter,
}

impl<'a> Syncer<'a> {
    pub fn new(
        config: &'a SyncConfig,
        state: &'a mut SyncState,
        sink: &'a dyn EventSink,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            config,
            excludes: config.excludes()?,
            state,
            sink,
            dry_run: false,
            checkpoint: None,
            converter: HybridConverter::new(),
        })
    }

    /// Preview mode: decisions and conversions run, nothing is written and
    /// tracked file state is left alone.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Save the state to `path` after every synced pair.
    pub fn checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint = Some(path.into());
        self
    }

    pub fn state(&self) -> &SyncState {
        &*self.state
    }

    /// One full bidirectional pass.
    ///
    /// Errors only for scan or state persistence failures; everything
    /// pair-specific ends up in [`SyncResult::errors`].
    pub fn sync(&mut self) -> Result<SyncResult, SyncError> {
        let clock = Instant::now();
        let mut result = SyncResult::start();
        self.sink.emit(SyncEvent::SyncStarted {
            org_dir: self.config.org_dir.clone(),
            markdown_dir: self.config.markdown_dir.clone(),
        });

        let org_files = self.scan(Side::Org)?;
        let md_files = self.scan(Side::Markdown)?;
        tracing::debug!(org_files = org_files.len(), md_files = md_files.len(), "directories scanned");

        let mut visited = HashSet::new();
        for org in &org_files {
            let md = counterpart(self.config, Side::Org, org)?;
            visited.insert(md.clone());
            self.process(org, &md, &mut result)?;
        }
        for md in md_files.iter().filter(|md| !visited.contains(*md)) {
            let org = counterpart(self.config, Side::Markdown, md)?;
            self.process(&org, md, &mut result)?;
        }

        result.finished_at = Utc::now();
        self.sink.emit(SyncEvent::SyncCompleted {
            files_synced: result.files_processed,
            conflicts: result.conflicts.len(),
            errors: result.errors.len(),
            duration: clock.elapsed(),
        });
        Ok(result)
    }

    /// Apply a side picked by a human to one pair.
    ///
    /// Unlike [`Syncer::sync`] every failure is returned to the caller.
    pub fn resolve_with_direction(
        &mut self,
        org: &Path,
        markdown: &Path,
        direction: Direction,
    ) -> Result<Option<WriteResult>, PairError> {
        let (winner, reason) = match direction {
            Direction::Skip => {
                self.sink.emit(SyncEvent::FileSkipped {
                    path: org.to_path_buf(),
                    reason: "file skipped by user".to_string(),
                });
                return Ok(None);
            }
            Direction::Org => (Side::Org, "user chose org version"),
            Direction::Markdown => (Side::Markdown, "user chose markdown version"),
            Direction::LastWriteWins => {
                let newest = newer_side(org, markdown).map_err(|source| PairError {
                    org: org.to_path_buf(),
                    markdown: markdown.to_path_buf(),
                    direction: None,
                    source,
                })?;
                tracing::info!(winner = %newest, "last-write-wins resolution");
                match newest {
                    Side::Org => (Side::Org, "user chose last-write-wins, org is newer"),
                    Side::Markdown => (Side::Markdown, "user chose last-write-wins, markdown is newer"),
                }
            }
        };

        let write = self.apply(winner, org, markdown, reason)?;
        self.save_checkpoint().map_err(|source| PairError {
            org: org.to_path_buf(),
            markdown: markdown.to_path_buf(),
            direction: Some(winner),
            source,
        })?;
        Ok(Some(write))
    }

    /// Record the document id of every note in both trees against its file
    /// stem. Returns how many idMap entries were added or renamed.
    pub fn index_ids(&mut self) -> Result<usize, SyncError> {
        let mut updated = 0;
        for side in [Side::Org, Side::Markdown] {
            for path in self.scan(side)? {
                let snapshot = match read_snapshot(&path) {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        self.sink.emit(SyncEvent::FileError {
                            path: path.clone(),
                            error: err.to_string(),
                        });
                        continue;
                    }
                };
                let Ok(text) = std::str::from_utf8(&snapshot.bytes) else {
                    continue;
                };
                if self.register_own_id(&path, text, side) {
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Per-pair plumbing
    // -----------------------------------------------------------------------

    fn scan(&self, side: Side) -> Result<Vec<PathBuf>, SyncError> {
        let root = self.config.root(side);
        scan_directory(root, side.extension(), &self.excludes).inspect_err(|err| {
            tracing::error!(root = %root.display(), error = %err, "scan failed");
        })
    }

    /// Sync one pair and fold the outcome into `result`. Only a failed
    /// checkpoint escapes.
    fn process(&mut self, org: &Path, md: &Path, result: &mut SyncResult) -> Result<(), SyncError> {
        match self.sync_pair(org, md) {
            Ok(None) => Ok(()),
            Ok(Some((decision, write))) => {
                result.files_processed += 1;
                if let (true, Some(winner)) = (decision.conflict, decision.winner) {
                    result.conflicts.push(ConflictRecord {
                        org: org.to_path_buf(),
                        markdown: md.to_path_buf(),
                        winner,
                        reason: decision.reason,
                    });
                }
                result.writes.push(write);
                self.save_checkpoint()
            }
            Err(err) => {
                let path = match err.direction {
                    Some(Side::Markdown) => err.markdown.clone(),
                    _ => err.org.clone(),
                };
                self.sink.emit(SyncEvent::FileError {
                    path,
                    error: err.to_string(),
                });
                result.errors.push(err);
                Ok(())
            }
        }
    }

    fn sync_pair(
        &mut self,
        org: &Path,
        md: &Path,
    ) -> Result<Option<(ConflictDecision, WriteResult)>, PairError> {
        let decision = resolver::resolve(
            org,
            md,
            &*self.state,
            self.config.resolution_strategy,
            self.sink,
        )
        .map_err(|source| PairError {
            org: org.to_path_buf(),
            markdown: md.to_path_buf(),
            direction: None,
            source,
        })?;

        let Some(winner) = decision.winner else {
            self.sink.emit(SyncEvent::FileSkipped {
                path: org.to_path_buf(),
                reason: decision.reason,
            });
            return Ok(None);
        };
        let write = self.apply(winner, org, md, &decision.reason)?;
        Ok(Some((decision, write)))
    }

    /// Convert the `winner` side over the other and record both files.
    fn apply(
        &mut self,
        winner: Side,
        org: &Path,
        md: &Path,
        reason: &str,
    ) -> Result<WriteResult, PairError> {
        let (source, dest) = match winner {
            Side::Org => (org, md),
            Side::Markdown => (md, org),
        };
        let fail = |source: SyncError| PairError {
            org: org.to_path_buf(),
            markdown: md.to_path_buf(),
            direction: Some(winner),
            source,
        };

        let snapshot = read_snapshot(source).map_err(fail)?;
        let text = std::str::from_utf8(&snapshot.bytes).map_err(|_| {
            fail(SyncError::InvalidUtf8 {
                path: source.to_path_buf(),
            })
        })?;

        let converted = match self.converter.convert_with(
            winner,
            text,
            &self.state.id_map,
            &self.state.placeholder_ids,
        ) {
            Ok(converted) => converted,
            Err(err) => {
                self.sink.emit(SyncEvent::ConversionFailed {
                    source: source.to_path_buf(),
                    dest: dest.to_path_buf(),
                    error: err.to_string(),
                });
                return Err(fail(err.into()));
            }
        };
        for (name, id) in &converted.minted {
            self.state.register_placeholder(id, name);
        }
        self.register_own_id(source, text, winner);

        let write = atomic_write(dest, &converted.text, self.dry_run).map_err(fail)?;
        if let Some(dest_mtime) = write.mtime() {
            self.state.record(
                source,
                TrackedFileState::new(snapshot.mtime, snapshot.hash(), dest),
            );
            self.state.record(
                dest,
                TrackedFileState::new(dest_mtime, content_hash(converted.text.as_bytes()), source),
            );
        }

        self.sink.emit(SyncEvent::FileSynced {
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            reason: reason.to_string(),
        });
        Ok(write)
    }

    fn register_own_id(&mut self, path: &Path, text: &str, side: Side) -> bool {
        let (Some(id), Some(stem)) = (note_id(text, side), path.file_stem()) else {
            return false;
        };
        self.state.register_document_id(&id, &stem.to_string_lossy())
    }

    fn save_checkpoint(&self) -> Result<(), SyncError> {
        let Some(path) = self.checkpoint.as_deref() else {
            return Ok(());
        };
        if self.dry_run {
            return Ok(());
        }
        state_store::save_to(path, &*self.state).inspect_err(|err| {
            self.sink.emit(SyncEvent::StateError {
                error: err.to_string(),
            });
        })
    }
}

/// The side with the strictly later mtime; org on ties.
fn newer_side(org: &Path, markdown: &Path) -> Result<Side, SyncError> {
    let org_mtime = modified(org)?;
    let md_mtime = modified(markdown)?;
    Ok(if md_mtime > org_mtime {
        Side::Markdown
    } else {
        Side::Org
    })
}

fn modified(path: &Path) -> Result<Mtime, SyncError> {
    let time = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| io_err(path, e))?;
    Ok(Mtime::from_system_time(time))
}
