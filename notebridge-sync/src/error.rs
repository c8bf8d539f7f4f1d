//! Error types for notebridge-sync.

use std::path::{Path, PathBuf};

use thiserror::Error;

use notebridge_convert::ConvertError;
use notebridge_core::{ConfigError, Side};

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Converting a document failed.
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but is not valid JSON.
    #[error("state file {path} is corrupt: {source}")]
    State {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error.
    #[error("state JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Another sync pass holds the state lock.
    #[error("another sync is running (lock held at {path}{})", holder_suffix(.pid))]
    StateLocked { path: PathBuf, pid: Option<u32> },

    /// A note file is not valid UTF-8.
    #[error("{path} is not valid UTF-8")]
    InvalidUtf8 { path: PathBuf },

    /// A relative path that names neither an org nor a markdown note.
    #[error("{path} is not an .org or .md note path")]
    NotANote { path: PathBuf },

    /// A single pair failed outside a full pass (manual resolution).
    #[error(transparent)]
    Pair(#[from] Box<PairError>),
}

fn holder_suffix(pid: &Option<u32>) -> String {
    pid.map(|pid| format!(" by pid {pid}")).unwrap_or_default()
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

impl SyncError {
    /// `true` for I/O errors a short retry may cure.
    pub fn is_transient(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            SyncError::Io { source, .. } => matches!(
                source.kind(),
                ErrorKind::Interrupted
                    | ErrorKind::WouldBlock
                    | ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

/// A failure confined to one note pair.
///
/// Collected into [`crate::SyncResult::errors`]; the pair stays untracked so
/// the next pass retries it.
#[derive(Debug, Error)]
#[error("{}: {source}", describe(.org, .markdown, .direction))]
pub struct PairError {
    pub org: PathBuf,
    pub markdown: PathBuf,
    /// Side being converted from, when a winner had been chosen.
    pub direction: Option<Side>,
    #[source]
    pub source: SyncError,
}

fn describe(org: &Path, markdown: &Path, direction: &Option<Side>) -> String {
    match direction {
        Some(Side::Org) => format!("{} → {}", org.display(), markdown.display()),
        Some(Side::Markdown) => format!("{} → {}", markdown.display(), org.display()),
        None => format!("{} ↔ {}", org.display(), markdown.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_error_names_paths_and_direction() {
        let err = PairError {
            org: PathBuf::from("/o/a.org"),
            markdown: PathBuf::from("/m/a.md"),
            direction: Some(Side::Markdown),
            source: SyncError::InvalidUtf8 {
                path: PathBuf::from("/m/a.md"),
            },
        };
        assert_eq!(
            err.to_string(),
            "/m/a.md → /o/a.org: /m/a.md is not valid UTF-8"
        );
    }

    #[test]
    fn only_some_io_errors_are_transient() {
        let busy = io_err("/x", std::io::Error::from(std::io::ErrorKind::Interrupted));
        let missing = io_err("/x", std::io::Error::from(std::io::ErrorKind::NotFound));
        let denied = io_err("/x", std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(busy.is_transient());
        assert!(!missing.is_transient());
        assert!(!denied.is_transient());
    }

    #[test]
    fn locked_message_mentions_holder() {
        let err = SyncError::StateLocked {
            path: PathBuf::from("/h/.notebridge/state.lock"),
            pid: Some(42),
        };
        assert!(err.to_string().contains("pid 42"));
    }
}
