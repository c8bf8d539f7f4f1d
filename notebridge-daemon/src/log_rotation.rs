//! Size-based rotation of the daemon log.
//!
//! `daemon.log` moves to `daemon.log.1` once it reaches [`MAX_LOG_BYTES`];
//! older copies shift up by one and anything past [`MAX_ROTATED_FILES`] is
//! deleted.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log` when it has grown to `max_bytes`. Returns whether a rotation
/// happened; a log that does not exist yet is left alone.
pub fn rotate_if_needed(log: &Path, max_bytes: u64, keep: usize) -> io::Result<bool> {
    let size = match fs::metadata(log) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes {
        return Ok(false);
    }

    remove_if_present(&backup_path(log, keep))?;
    for n in (1..keep).rev() {
        let from = backup_path(log, n);
        if from.exists() {
            fs::rename(&from, backup_path(log, n + 1))?;
        }
    }
    fs::rename(log, backup_path(log, 1))?;
    // The subscriber reopens by path, so the next event recreates `log`.
    fs::File::create(log)?;
    Ok(true)
}

/// Rotate `log` with the default limits, logging instead of failing.
pub fn rotate_log(log: &Path) {
    match rotate_if_needed(log, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
        Ok(true) => tracing::info!(path = %log.display(), "daemon log rotated"),
        Ok(false) => {}
        Err(err) => tracing::warn!(path = %log.display(), error = %err, "log rotation failed"),
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// `daemon.log` → `daemon.log.<n>`.
fn backup_path(log: &Path, n: usize) -> PathBuf {
    let mut name = log.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{n}"));
    log.with_file_name(name)
}
