//! Directory scanning and pair path arithmetic.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use notebridge_core::{ExcludeSet, Side, SyncConfig};

use crate::error::{io_err, SyncError};

/// Every file under `root` with `extension`, minus excluded paths.
///
/// Hidden directories (`.git`, `.obsidian`, `.trash`) are not entered.
/// Exclusions match the `/`-separated path relative to `root` and the bare
/// file name. Results are sorted.
pub fn scan_directory(
    root: &Path,
    extension: &str,
    excludes: &ExcludeSet,
) -> Result<Vec<PathBuf>, SyncError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden_dir(entry));

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            io_err(path, err.into())
        })?;
        if !entry.file_type().is_file() || entry.path().extension() != Some(OsStr::new(extension)) {
            continue;
        }
        let relative = relative_key(entry.path(), root);
        let name = entry.file_name().to_string_lossy();
        if excludes.is_excluded(&relative, &name) {
            tracing::debug!(path = %entry.path().display(), "excluded");
            continue;
        }
        files.push(entry.into_path());
    }
    files.sort();
    Ok(files)
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with('.')
}

/// `/`-joined path of `path` relative to `root`.
fn relative_key(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Path of the note paired with `path`, which lives under the `side` root.
pub fn counterpart(config: &SyncConfig, side: Side, path: &Path) -> Result<PathBuf, SyncError> {
    let relative = path
        .strip_prefix(config.root(side))
        .map_err(|_| SyncError::NotANote {
            path: path.to_path_buf(),
        })?;
    let other = side.other();
    Ok(config
        .root(other)
        .join(relative.with_extension(other.extension())))
}

/// Resolve a tree-relative note path (`notes/a.org`, `notes/a.md` or
/// `notes/a`) to its `(org, markdown)` pair.
pub fn locate_pair(config: &SyncConfig, relative: &Path) -> Result<(PathBuf, PathBuf), SyncError> {
    let not_a_note = || SyncError::NotANote {
        path: relative.to_path_buf(),
    };
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if relative.as_os_str().is_empty() || escapes {
        return Err(not_a_note());
    }

    let stem = match relative.extension().and_then(OsStr::to_str) {
        Some("org") | Some("md") => relative.with_extension(""),
        Some(_) => return Err(not_a_note()),
        None => relative.to_path_buf(),
    };
    Ok((
        config.org_dir.join(stem.with_extension(Side::Org.extension())),
        config
            .markdown_dir
            .join(stem.with_extension(Side::Markdown.extension())),
    ))
}
