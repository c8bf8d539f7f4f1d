//! Structured sync events and the sinks that receive them.
//!
//! The orchestrator never logs pass-level outcomes directly; it hands a
//! [`SyncEvent`] to whatever [`EventSink`] the caller supplied. The daemon and
//! CLI use [`TracingSink`]; tests and previews collect into a [`MemorySink`].

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use notebridge_core::Side;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    SyncStarted {
        org_dir: PathBuf,
        markdown_dir: PathBuf,
    },
    SyncCompleted {
        files_synced: usize,
        conflicts: usize,
        errors: usize,
        duration: Duration,
    },
    FileSynced {
        source: PathBuf,
        dest: PathBuf,
        reason: String,
    },
    /// Both sides changed and a policy picked `winner`.
    ConflictResolved {
        org: PathBuf,
        markdown: PathBuf,
        winner: Side,
        reason: String,
    },
    FileError {
        path: PathBuf,
        error: String,
    },
    ConversionFailed {
        source: PathBuf,
        dest: PathBuf,
        error: String,
    },
    FileSkipped {
        path: PathBuf,
        reason: String,
    },
    StateError {
        error: String,
    },
}

/// Receiver for [`SyncEvent`]s. Implementations must not call back into the
/// syncer.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

/// Forwards every event to `tracing` with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SyncEvent) {
        match event {
            SyncEvent::SyncStarted {
                org_dir,
                markdown_dir,
            } => tracing::info!(
                org_dir = %org_dir.display(),
                markdown_dir = %markdown_dir.display(),
                "sync started"
            ),
            SyncEvent::SyncCompleted {
                files_synced,
                conflicts,
                errors,
                duration,
            } => tracing::info!(
                files_synced,
                conflicts,
                errors,
                duration_ms = duration.as_millis() as u64,
                "sync completed"
            ),
            SyncEvent::FileSynced {
                source,
                dest,
                reason,
            } => tracing::info!(
                source = %source.display(),
                dest = %dest.display(),
                reason = %reason,
                "file synced"
            ),
            SyncEvent::ConflictResolved {
                org,
                markdown,
                winner,
                reason,
            } => tracing::warn!(
                org = %org.display(),
                markdown = %markdown.display(),
                winner = %winner,
                reason = %reason,
                "conflict resolved"
            ),
            SyncEvent::FileError { path, error } => {
                tracing::error!(path = %path.display(), error = %error, "file error")
            }
            SyncEvent::ConversionFailed {
                source,
                dest,
                error,
            } => tracing::error!(
                source = %source.display(),
                dest = %dest.display(),
                error = %error,
                "conversion failed"
            ),
            SyncEvent::FileSkipped { path, reason } => {
                tracing::debug!(path = %path.display(), reason = %reason, "file skipped")
            }
            SyncEvent::StateError { error } => tracing::error!(error = %error, "state error"),
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SyncEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<SyncEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: SyncEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
