//! Durable reads and atomic writes of note files.
//!
//! ## `atomic_write` protocol
//!
//! 1. Read the destination; identical bytes ⇒ `Unchanged`, nothing written.
//! 2. `dry_run` ⇒ `WouldWrite`, nothing written.
//! 3. Create `.notebridge-<random>.tmp` next to the destination.
//! 4. Write, `sync_all`, chmod 0644.
//! 5. Rename over the destination (atomic on POSIX).
//!
//! A failure at any step after 3 removes the temp file; a failed removal is
//! logged, never returned.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use notebridge_core::Mtime;

use crate::error::{io_err, SyncError};

/// Retries after the first failed read.
pub const READ_RETRIES: u32 = 2;
/// Pause between read attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// 1. Write result
// ---------------------------------------------------------------------------

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written; `mtime` is the new file's modification time.
    Written { path: PathBuf, mtime: Mtime },
    /// Destination already held exactly this content.
    Unchanged { path: PathBuf, mtime: Mtime },
    /// `--dry-run` mode: the file *would* have been written.
    WouldWrite { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path, .. }
            | WriteResult::Unchanged { path, .. }
            | WriteResult::WouldWrite { path } => path,
        }
    }

    /// Modification time of the destination after the call, when it exists.
    pub fn mtime(&self) -> Option<Mtime> {
        match self {
            WriteResult::Written { mtime, .. } | WriteResult::Unchanged { mtime, .. } => Some(*mtime),
            WriteResult::WouldWrite { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Reads
// ---------------------------------------------------------------------------

/// File bytes together with the mtime observed before they were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub bytes: Vec<u8>,
    pub mtime: Mtime,
}

impl Snapshot {
    /// `sha256:<hex>` of the bytes.
    pub fn hash(&self) -> String {
        content_hash(&self.bytes)
    }
}

/// `sha256:<hex>` digest, the format stored in the state file.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Read `path`, retrying transient failures [`READ_RETRIES`] times.
///
/// Missing files and permission errors fail immediately.
pub fn read_snapshot(path: &Path) -> Result<Snapshot, SyncError> {
    let mut attempt = 0;
    loop {
        match read_once(path) {
            Err(err) if err.is_transient() && attempt < READ_RETRIES => {
                attempt += 1;
                tracing::debug!(path = %path.display(), attempt, error = %err, "retrying read");
                std::thread::sleep(RETRY_DELAY);
            }
            other => return other,
        }
    }
}

fn read_once(path: &Path) -> Result<Snapshot, SyncError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let modified = file
        .metadata()
        .and_then(|meta| meta.modified())
        .map_err(|e| io_err(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| io_err(path, e))?;
    Ok(Snapshot {
        bytes,
        mtime: Mtime::from_system_time(modified),
    })
}

// ---------------------------------------------------------------------------
// 3. atomic_write
// ---------------------------------------------------------------------------

/// Atomically replace `path` with `content`.
pub fn atomic_write(path: &Path, content: &str, dry_run: bool) -> Result<WriteResult, SyncError> {
    match read_once(path) {
        Ok(existing) if existing.bytes == content.as_bytes() => {
            tracing::debug!(path = %path.display(), "unchanged");
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
                mtime: existing.mtime,
            });
        }
        Ok(_) => {}
        Err(SyncError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    if dry_run {
        tracing::info!(path = %path.display(), bytes = content.len(), "[dry-run] would write");
        return Ok(WriteResult::WouldWrite {
            path: path.to_path_buf(),
        });
    }

    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("destination has no parent directory")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let tmp = tempfile::Builder::new()
        .prefix(".notebridge-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| io_err(dir, e))?;

    let mtime = match fill(&tmp, content.as_bytes()) {
        Ok(mtime) => mtime,
        Err(err) => {
            discard(tmp);
            return Err(err);
        }
    };

    if let Err(err) = tmp.persist(path) {
        discard(err.file);
        return Err(io_err(path, err.error));
    }

    tracing::info!(path = %path.display(), "wrote");
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
        mtime,
    })
}

/// Write, flush and chmod the temp file; returns its mtime (kept by rename).
fn fill(tmp: &NamedTempFile, bytes: &[u8]) -> Result<Mtime, SyncError> {
    let path = tmp.path();
    let mut file = tmp.as_file();
    file.write_all(bytes).map_err(|e| io_err(path, e))?;
    file.sync_all().map_err(|e| io_err(path, e))?;
    set_note_permissions(path)?;
    let modified = file
        .metadata()
        .and_then(|meta| meta.modified())
        .map_err(|e| io_err(path, e))?;
    Ok(Mtime::from_system_time(modified))
}

fn discard(tmp: NamedTempFile) {
    let path = tmp.path().to_path_buf();
    if let Err(err) = tmp.close() {
        tracing::warn!(path = %path.display(), error = %err, "could not remove temp file");
    }
}

#[cfg(unix)]
fn set_note_permissions(path: &Path) -> Result<(), SyncError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_note_permissions(_path: &Path) -> Result<(), SyncError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .expect("read_dir")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".notebridge-"))
            .collect()
    }

    #[test]
    fn writes_new_file_and_creates_parents() {
        let tmp = TempDir::new().expect("tmp");
        let target = tmp.path().join("nested/dir/note.md");

        let result = atomic_write(&target, "# Hello\n", false).expect("write");
        assert!(matches!(result, WriteResult::Written { .. }));
        assert_eq!(std::fs::read_to_string(&target).expect("read"), "# Hello\n");
        assert!(leftovers(target.parent().expect("parent")).is_empty());
    }

    #[test]
    fn identical_content_is_unchanged() {
        let tmp = TempDir::new().expect("tmp");
        let target = tmp.path().join("note.org");
        std::fs::write(&target, "* Same\n").expect("seed");

        let result = atomic_write(&target, "* Same\n", false).expect("write");
        assert!(matches!(result, WriteResult::Unchanged { .. }));
    }

    #[test]
    fn dry_run_leaves_disk_untouched() {
        let tmp = TempDir::new().expect("tmp");
        let target = tmp.path().join("note.md");

        let result = atomic_write(&target, "new", true).expect("dry run");
        assert_eq!(result, WriteResult::WouldWrite { path: target.clone() });
        assert!(result.mtime().is_none());
        assert!(!target.exists());
    }

    #[test]
    fn written_mtime_matches_destination() {
        let tmp = TempDir::new().expect("tmp");
        let target = tmp.path().join("note.md");
        let result = atomic_write(&target, "body\n", false).expect("write");

        let snapshot = read_snapshot(&target).expect("read");
        assert_eq!(result.mtime(), Some(snapshot.mtime));
        assert_eq!(snapshot.hash(), content_hash(b"body\n"));
    }

    #[cfg(unix)]
    #[test]
    fn written_files_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().expect("tmp");
        let target = tmp.path().join("note.md");
        atomic_write(&target, "x", false).expect("write");
        let mode = std::fs::metadata(&target).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn directory_at_destination_fails_without_leftovers() {
        let tmp = TempDir::new().expect("tmp");
        let target = tmp.path().join("note.md");
        std::fs::create_dir_all(target.join("child")).expect("mkdir");

        let err = atomic_write(&target, "content", false).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
        assert!(leftovers(tmp.path()).is_empty());
    }

    #[test]
    fn missing_file_is_not_retried() {
        let tmp = TempDir::new().expect("tmp");
        let started = std::time::Instant::now();
        let err = read_snapshot(&tmp.path().join("absent.org")).unwrap_err();
        assert!(!err.is_transient());
        assert!(started.elapsed() < RETRY_DELAY);
    }

    #[test]
    fn hash_has_algorithm_prefix() {
        let hash = content_hash(b"");
        assert_eq!(
            hash,
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
