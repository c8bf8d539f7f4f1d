//! Tracked-state store.
//!
//! Persists [`SyncState`] as pretty JSON at `<home>/.notebridge/state.json`.
//! Writes use the atomic `.tmp` + rename pattern shared with the config file.

use std::io::ErrorKind;
use std::path::Path;

use notebridge_core::config::state_path_at;
use notebridge_core::SyncState;

use crate::error::{io_err, SyncError};

/// Load the state file under `home`.
///
/// Returns an empty state if the file does not yet exist.
pub fn load_at(home: &Path) -> Result<SyncState, SyncError> {
    load_from(&state_path_at(home))
}

/// Save the state file under `home` atomically.
pub fn save_at(home: &Path, state: &SyncState) -> Result<(), SyncError> {
    save_to(&state_path_at(home), state)
}

/// Load state from an explicit path.
pub fn load_from(path: &Path) -> Result<SyncState, SyncError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(SyncState::default()),
        Err(err) => return Err(io_err(path, err)),
    };
    if contents.trim().is_empty() {
        return Ok(SyncState::default());
    }
    serde_json::from_str(&contents).map_err(|source| SyncError::State {
        path: path.to_path_buf(),
        source,
    })
}

/// Save state to an explicit path.
///
/// Writes to `<path>.json.tmp` then renames over `<path>`.
pub fn save_to(path: &Path, state: &SyncState) -> Result<(), SyncError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid state path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    if let Err(err) = std::fs::rename(&tmp, path) {
        if let Err(cleanup) = std::fs::remove_file(&tmp) {
            tracing::warn!(path = %tmp.display(), error = %cleanup, "could not remove temp state file");
        }
        return Err(io_err(path, err));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notebridge_core::{Mtime, TrackedFileState};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn empty_state_when_file_missing() {
        let home = TempDir::new().expect("home");
        let state = load_at(home.path()).expect("load");
        assert!(state.files.is_empty());
        assert!(state.id_map.is_empty());
    }

    #[test]
    fn roundtrip_save_load() {
        let home = TempDir::new().expect("home");
        let mut state = SyncState::default();
        let org = PathBuf::from("/notes/org/a.org");
        let md = PathBuf::from("/notes/vault/a.md");
        let mtime = Mtime {
            secs: 1_700_000_000,
            nanos: 250,
        };
        state.record(&org, TrackedFileState::new(mtime, "sha256:aa".into(), &md));
        state.record(&md, TrackedFileState::new(mtime, "sha256:bb".into(), &org));
        state.register_id("123e4567-e89b-12d3-a456-426614174000", "a");

        save_at(home.path(), &state).expect("save");
        let loaded = load_at(home.path()).expect("load");
        assert_eq!(loaded, state);
        assert_eq!(loaded.get(&org).map(|e| e.mtime()), Some(mtime));
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let home = TempDir::new().expect("home");
        save_at(home.path(), &SyncState::default()).expect("save");
        let tmp = state_path_at(home.path()).with_extension("json.tmp");
        assert!(!tmp.exists(), "tmp file should be removed after atomic rename");
    }

    #[test]
    fn corrupt_state_is_reported_with_path() {
        let home = TempDir::new().expect("home");
        let path = state_path_at(home.path());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "{ not json").expect("write");

        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, SyncError::State { path: p, .. } if p == path));
    }

    #[test]
    fn reads_state_written_without_nanos() {
        let home = TempDir::new().expect("home");
        let path = state_path_at(home.path());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(
            &path,
            r#"{"files":{"/o/a.org":{"mtime":12,"hash":"sha256:x","paired_with":"/m/a.md"}},"id_map":{"abc":"a"}}"#,
        )
        .expect("write");

        let state = load_at(home.path()).expect("load");
        let entry = state.get(Path::new("/o/a.org")).expect("entry");
        assert_eq!(entry.mtime(), Mtime { secs: 12, nanos: 0 });
        assert_eq!(state.id_map.get("abc").map(String::as_str), Some("a"));
    }
}
