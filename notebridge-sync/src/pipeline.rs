//! Shared sync pipeline entrypoints used by the CLI and the daemon.
//!
//! Every entrypoint follows the same shape: load config → take the state
//! lock → load state → work → save state → release the lock.

use std::path::Path;

use notebridge_core::config::{self, state_path_at};
use notebridge_core::{Direction, SyncConfig, SyncState};

use crate::error::SyncError;
use crate::events::{EventSink, SyncEvent};
use crate::lock::StateLock;
use crate::scan::locate_pair;
use crate::state_store;
use crate::syncer::{SyncResult, Syncer};
use crate::writer::WriteResult;

/// Run one full sync pass for the configuration under `home`.
///
/// This is the canonical sync entrypoint for both `notebridge sync` and the
/// daemon processor. Dry runs take the lock but never write the state file.
pub fn run(home: &Path, dry_run: bool, sink: &dyn EventSink) -> Result<SyncResult, SyncError> {
    let config = config::load_at(home)?;
    let _lock = StateLock::acquire_at(home)?;
    let mut state = load_state(home, sink)?;

    let result = {
        let mut syncer = Syncer::new(&config, &mut state, sink)?.dry_run(dry_run);
        if !dry_run {
            syncer = syncer.checkpoint(state_path_at(home));
        }
        syncer.sync()?
    };

    if !dry_run {
        save_state(home, &state, sink)?;
    }
    Ok(result)
}

/// Apply `direction` to the pair named by a tree-relative path.
///
/// Returns `None` for [`Direction::Skip`].
pub fn resolve(
    home: &Path,
    relative: &Path,
    direction: Direction,
    dry_run: bool,
    sink: &dyn EventSink,
) -> Result<Option<WriteResult>, SyncError> {
    let config = config::load_at(home)?;
    let (org, markdown) = locate_pair(&config, relative)?;
    let _lock = StateLock::acquire_at(home)?;
    let mut state = load_state(home, sink)?;

    let write = Syncer::new(&config, &mut state, sink)?
        .dry_run(dry_run)
        .resolve_with_direction(&org, &markdown, direction)
        .map_err(Box::new)?;

    if !dry_run && write.is_some() {
        save_state(home, &state, sink)?;
    }
    Ok(write)
}

/// Rebuild the id → name map from the ids found in both trees.
pub fn reindex(home: &Path, sink: &dyn EventSink) -> Result<usize, SyncError> {
    let config = config::load_at(home)?;
    let _lock = StateLock::acquire_at(home)?;
    let mut state = load_state(home, sink)?;

    let updated = Syncer::new(&config, &mut state, sink)?.index_ids()?;
    if updated > 0 {
        save_state(home, &state, sink)?;
    }
    Ok(updated)
}

/// Config and state for read-only consumers (status, diff). No lock taken.
pub fn snapshot(home: &Path) -> Result<(SyncConfig, SyncState), SyncError> {
    let config = config::load_at(home)?;
    let state = state_store::load_at(home)?;
    Ok((config, state))
}

fn load_state(home: &Path, sink: &dyn EventSink) -> Result<SyncState, SyncError> {
    state_store::load_at(home).inspect_err(|err| {
        sink.emit(SyncEvent::StateError {
            error: err.to_string(),
        })
    })
}

fn save_state(home: &Path, state: &SyncState, sink: &dyn EventSink) -> Result<(), SyncError> {
    state_store::save_at(home, state).inspect_err(|err| {
        sink.emit(SyncEvent::StateError {
            error: err.to_string(),
        })
    })
}
