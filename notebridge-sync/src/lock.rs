//! Exclusive lock over the state file for the duration of one pass.
//!
//! The lock is an advisory `flock` on `<home>/.notebridge/state.lock`. The
//! kernel drops it when the holding process exits, however it exits, so a
//! crashed pass never leaves the state locked. The file itself stays on disk
//! and names the current holder's pid while the lock is held.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use notebridge_core::config::lock_path_at;

use crate::error::{io_err, SyncError};

/// Held `flock` on the lock file; released when dropped.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    file: File,
}

impl StateLock {
    /// Take `<home>/.notebridge/state.lock`.
    pub fn acquire_at(home: &Path) -> Result<Self, SyncError> {
        Self::acquire(&lock_path_at(home))
    }

    /// Lock `path` without blocking. A live holder yields
    /// [`SyncError::StateLocked`] carrying the pid it recorded, if readable.
    pub fn acquire(path: &Path) -> Result<Self, SyncError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| io_err(path, e))?;

        if !try_flock_exclusive(&file).map_err(|e| io_err(path, e))? {
            return Err(SyncError::StateLocked {
                path: path.to_path_buf(),
                pid: read_holder(&mut file),
            });
        }

        write_holder(&mut file, std::process::id()).map_err(|e| io_err(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        // The flock itself goes away with the descriptor.
        if let Err(err) = self.file.set_len(0) {
            tracing::warn!(path = %self.path.display(), error = %err, "could not clear state lock holder");
        }
    }
}

/// `flock(LOCK_EX | LOCK_NB)`. `Ok(false)` when another descriptor holds it.
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    // SAFETY: the descriptor belongs to `file`, which outlives the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

fn write_holder(file: &mut File, pid: u32) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    write!(file, "{pid}")?;
    file.sync_all()
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut text = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut text).ok()?;
    text.trim().parse().ok()
}
