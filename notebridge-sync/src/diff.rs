//! Unified diff preview for `notebridge diff`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use notebridge_core::{Side, SyncConfig, SyncState};

use crate::error::{io_err, SyncError};
use crate::resolver::{decide, PairStatus};
use crate::scan::locate_pair;
use crate::writer::read_snapshot;

/// What the next pass would do to one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairDiff {
    pub org: PathBuf,
    pub markdown: PathBuf,
    /// Side the resolver would pick; `None` when the pair is left alone.
    pub winner: Option<Side>,
    pub reason: String,
    /// Empty when nothing would change.
    pub unified_diff: String,
}

impl PairDiff {
    pub fn is_empty(&self) -> bool {
        self.unified_diff.is_empty()
    }
}

/// Convert the side the resolver would pick and compare the result with the
/// other side's current content. Nothing is written and the idMap is not
/// extended.
pub fn diff_pair(
    config: &SyncConfig,
    state: &SyncState,
    relative: &Path,
) -> Result<PairDiff, SyncError> {
    let (org, markdown) = locate_pair(config, relative)?;
    let decision = decide(
        &PairStatus::inspect(&org, &markdown, state)?,
        config.resolution_strategy,
    );

    let mut diff = PairDiff {
        org,
        markdown,
        winner: decision.winner,
        reason: decision.reason,
        unified_diff: String::new(),
    };
    let Some(winner) = diff.winner else {
        return Ok(diff);
    };

    let (source, dest) = match winner {
        Side::Org => (&diff.org, &diff.markdown),
        Side::Markdown => (&diff.markdown, &diff.org),
    };
    let snapshot = read_snapshot(source)?;
    let text = String::from_utf8(snapshot.bytes).map_err(|_| SyncError::InvalidUtf8 {
        path: source.clone(),
    })?;
    let converted =
        notebridge_convert::convert_with(winner, &text, &state.id_map, &state.placeholder_ids)?;
    let existing = read_existing_or_empty(dest)?;
    if existing == converted.text {
        return Ok(diff);
    }

    let shown = dest
        .strip_prefix(config.root(winner.other()))
        .unwrap_or(dest.as_path());
    let old_header = format!("a/{}", shown.display());
    let new_header = format!("b/{}", shown.display());
    diff.unified_diff = TextDiff::from_lines(&existing, &converted.text)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    Ok(diff)
}

fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use crate::events::MemorySink;
    use crate::Syncer;

    use super::*;

    fn trees() -> (TempDir, SyncConfig) {
        let tmp = TempDir::new().expect("tmp");
        let config = SyncConfig::new(tmp.path().join("org"), tmp.path().join("vault"));
        fs::create_dir_all(&config.org_dir).expect("org");
        fs::create_dir_all(&config.markdown_dir).expect("vault");
        (tmp, config)
    }

    #[test]
    fn new_org_note_diffs_against_empty_markdown() {
        let (_tmp, config) = trees();
        fs::write(config.org_dir.join("a.org"), "* Heading\n").expect("seed");

        let diff = diff_pair(&config, &SyncState::default(), Path::new("a.org")).expect("diff");
        assert_eq!(diff.winner, Some(Side::Org));
        assert!(diff.unified_diff.contains("--- a/a.md"));
        assert!(diff.unified_diff.contains("+++ b/a.md"));
        assert!(diff.unified_diff.contains("+# Heading"));
    }

    #[test]
    fn no_diff_after_clean_sync() {
        let (_tmp, config) = trees();
        fs::write(config.org_dir.join("a.org"), "* Heading\n").expect("seed");
        let mut state = SyncState::default();
        let sink = MemorySink::new();
        Syncer::new(&config, &mut state, &sink)
            .expect("syncer")
            .sync()
            .expect("sync");

        let diff = diff_pair(&config, &state, Path::new("a")).expect("diff");
        assert_eq!(diff.winner, None);
        assert!(diff.is_empty());
    }

    #[test]
    fn markdown_edit_previews_org_change() {
        let (_tmp, config) = trees();
        fs::write(config.org_dir.join("a.org"), "* Heading\n").expect("seed");
        let mut state = SyncState::default();
        let sink = MemorySink::new();
        Syncer::new(&config, &mut state, &sink)
            .expect("syncer")
            .sync()
            .expect("sync");

        fs::write(config.markdown_dir.join("a.md"), "# Heading\nmore\n").expect("edit");
        let diff = diff_pair(&config, &state, Path::new("a.md")).expect("diff");
        assert_eq!(diff.winner, Some(Side::Markdown));
        assert!(diff.unified_diff.contains("--- a/a.org"));
        assert!(diff.unified_diff.contains("+more"));
    }
}
