//! Change detection: mtime fast path backed by a content hash.

use std::io::ErrorKind;
use std::path::Path;

use notebridge_core::{Mtime, SyncState};

use crate::error::{io_err, SyncError};
use crate::writer::read_snapshot;

/// What the detector saw for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Missing,
    Present { mtime: Mtime, changed: bool },
}

impl FileStatus {
    pub fn exists(self) -> bool {
        matches!(self, FileStatus::Present { .. })
    }

    pub fn changed(self) -> bool {
        matches!(self, FileStatus::Present { changed: true, .. })
    }

    pub fn mtime(self) -> Option<Mtime> {
        match self {
            FileStatus::Present { mtime, .. } => Some(mtime),
            FileStatus::Missing => None,
        }
    }
}

/// Stat `path` and compare it with its tracked entry.
///
/// An untracked file is always changed. Equal mtimes short-circuit without
/// reading the file; otherwise the content hash decides.
pub fn inspect(path: &Path, state: &SyncState) -> Result<FileStatus, SyncError> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(FileStatus::Missing),
        Err(err) => return Err(io_err(path, err)),
    };
    let mtime = Mtime::from_system_time(meta.modified().map_err(|e| io_err(path, e))?);

    let Some(entry) = state.get(path) else {
        return Ok(FileStatus::Present {
            mtime,
            changed: true,
        });
    };
    if entry.mtime() == mtime {
        return Ok(FileStatus::Present {
            mtime,
            changed: false,
        });
    }

    let snapshot = read_snapshot(path)?;
    Ok(FileStatus::Present {
        mtime,
        changed: snapshot.hash() != entry.content_hash,
    })
}

/// Whether `path` changed since it was last synchronized.
///
/// Fails with a `NotFound` I/O error when the file does not exist.
pub fn has_changed(path: &Path, state: &SyncState) -> Result<bool, SyncError> {
    match inspect(path, state)? {
        FileStatus::Present { changed, .. } => Ok(changed),
        FileStatus::Missing => Err(io_err(path, std::io::Error::from(ErrorKind::NotFound))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::content_hash;
    use notebridge_core::TrackedFileState;
    use tempfile::TempDir;

    fn track(state: &mut SyncState, path: &Path) {
        let snapshot = read_snapshot(path).expect("read");
        state.record(
            path,
            TrackedFileState::new(snapshot.mtime, snapshot.hash(), Path::new("/pair.md")),
        );
    }

    #[test]
    fn untracked_file_is_changed() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("a.org");
        std::fs::write(&path, "* A\n").expect("write");
        assert!(has_changed(&path, &SyncState::default()).expect("inspect"));
    }

    #[test]
    fn missing_file_reports_not_found() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("gone.org");
        let state = SyncState::default();
        assert_eq!(inspect(&path, &state).expect("inspect"), FileStatus::Missing);
        let err = has_changed(&path, &state).unwrap_err();
        assert!(matches!(err, SyncError::Io { source, .. } if source.kind() == ErrorKind::NotFound));
    }

    #[test]
    fn tracked_and_untouched_is_unchanged() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("a.org");
        std::fs::write(&path, "* A\n").expect("write");
        let mut state = SyncState::default();
        track(&mut state, &path);
        assert!(!has_changed(&path, &state).expect("inspect"));
    }

    #[test]
    fn stale_mtime_with_same_hash_is_unchanged() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("a.org");
        std::fs::write(&path, "* A\n").expect("write");
        let mut state = SyncState::default();
        state.record(
            &path,
            TrackedFileState::new(Mtime { secs: 1, nanos: 0 }, content_hash(b"* A\n"), Path::new("/p.md")),
        );
        assert!(!has_changed(&path, &state).expect("inspect"));
    }

    #[test]
    fn stale_mtime_with_other_hash_is_changed() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("a.org");
        std::fs::write(&path, "* B\n").expect("write");
        let mut state = SyncState::default();
        state.record(
            &path,
            TrackedFileState::new(Mtime { secs: 1, nanos: 0 }, content_hash(b"* A\n"), Path::new("/p.md")),
        );
        assert!(has_changed(&path, &state).expect("inspect"));
    }
}
