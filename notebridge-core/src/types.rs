//! Domain types for notebridge.
//!
//! All types that reach disk are serializable via serde; the tracked state is
//! persisted as JSON by `notebridge-sync`, the config as YAML by [`crate::config`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// One side of a note pair: the org tree or the markdown tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Org,
    Markdown,
}

impl Side {
    /// File extension (without the dot) of notes on this side.
    pub fn extension(self) -> &'static str {
        match self {
            Side::Org => "org",
            Side::Markdown => "md",
        }
    }

    /// The opposite side of the pair.
    pub fn other(self) -> Side {
        match self {
            Side::Org => Side::Markdown,
            Side::Markdown => Side::Org,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Org => write!(f, "org"),
            Side::Markdown => write!(f, "markdown"),
        }
    }
}

/// Policy applied when both sides of a pair changed since the last sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPolicy {
    /// The side with the strictly later mtime wins; org wins ties.
    #[default]
    LastWriteWins,
    UseOrg,
    UseMarkdown,
}

impl ResolutionPolicy {
    pub const ALL: [ResolutionPolicy; 3] = [
        ResolutionPolicy::LastWriteWins,
        ResolutionPolicy::UseOrg,
        ResolutionPolicy::UseMarkdown,
    ];
}

impl fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionPolicy::LastWriteWins => write!(f, "last-write-wins"),
            ResolutionPolicy::UseOrg => write!(f, "use-org"),
            ResolutionPolicy::UseMarkdown => write!(f, "use-markdown"),
        }
    }
}

impl FromStr for ResolutionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-write-wins" => Ok(ResolutionPolicy::LastWriteWins),
            "use-org" => Ok(ResolutionPolicy::UseOrg),
            "use-markdown" => Ok(ResolutionPolicy::UseMarkdown),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

/// A side picked by a human for a single pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Org content overwrites markdown.
    Org,
    /// Markdown content overwrites org.
    Markdown,
    /// Whichever file was modified last wins.
    LastWriteWins,
    /// Leave both files untouched.
    Skip,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Org => write!(f, "org"),
            Direction::Markdown => write!(f, "markdown"),
            Direction::LastWriteWins => write!(f, "last-write-wins"),
            Direction::Skip => write!(f, "skip"),
        }
    }
}

impl FromStr for Direction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "org" | "source" => Ok(Direction::Org),
            "markdown" | "md" | "obsidian" | "target" => Ok(Direction::Markdown),
            "last-write-wins" => Ok(Direction::LastWriteWins),
            "skip" => Ok(Direction::Skip),
            other => Err(ConfigError::InvalidDirection(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Modification time
// ---------------------------------------------------------------------------

/// File modification time split into whole seconds and sub-second nanos.
///
/// Ordering is chronological, so `a > b` means `a` was written later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Mtime {
    pub secs: i64,
    pub nanos: u32,
}

impl Mtime {
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => Self {
                secs: since.as_secs() as i64,
                nanos: since.subsec_nanos(),
            },
            Err(before) => {
                let d = before.duration();
                Self {
                    secs: -(d.as_secs() as i64),
                    nanos: 0,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tracked state
// ---------------------------------------------------------------------------

/// Stable note identifier → human-readable note name (file stem).
pub type IdMap = BTreeMap<String, String>;

/// What was observed about one file at the moment it was last synchronized.
///
/// Serialized as `{"mtime", "mtime_nanos", "hash", "paired_with"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFileState {
    /// Whole seconds of the mtime snapshot.
    #[serde(rename = "mtime")]
    pub modified_time: i64,
    /// Sub-second part of the same snapshot.
    #[serde(rename = "mtime_nanos", default)]
    pub modified_nanos: u32,
    /// `sha256:<hex>` of the bytes read at that snapshot.
    #[serde(rename = "hash")]
    pub content_hash: String,
    /// Canonical path of the counterpart file.
    pub paired_with: String,
}

impl TrackedFileState {
    pub fn new(mtime: Mtime, content_hash: String, paired_with: &Path) -> Self {
        Self {
            modified_time: mtime.secs,
            modified_nanos: mtime.nanos,
            content_hash,
            paired_with: path_key(paired_with),
        }
    }

    pub fn mtime(&self) -> Mtime {
        Mtime {
            secs: self.modified_time,
            nanos: self.modified_nanos,
        }
    }
}

/// Root aggregate persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SyncState {
    #[serde(default)]
    pub files: BTreeMap<String, TrackedFileState>,
    #[serde(default)]
    pub id_map: IdMap,
    /// Ids minted for link targets that had no note id yet. They stay in
    /// `id_map` so links already written keep resolving, but a real note id
    /// for the same name wins name lookups.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub placeholder_ids: BTreeSet<String>,
}

impl SyncState {
    pub fn get(&self, path: &Path) -> Option<&TrackedFileState> {
        self.files.get(&path_key(path))
    }

    /// Overwrite the tracked entry for `path`.
    pub fn record(&mut self, path: &Path, entry: TrackedFileState) {
        self.files.insert(path_key(path), entry);
    }

    /// Map `id` to `name`. Returns `true` if the map changed.
    ///
    /// Entries are never removed; a renamed note updates its name in place.
    pub fn register_id(&mut self, id: &str, name: &str) -> bool {
        let id = id.trim();
        let name = name.trim();
        if id.is_empty() || name.is_empty() {
            return false;
        }
        match self.id_map.get(id) {
            Some(existing) if existing == name => false,
            _ => {
                self.id_map.insert(id.to_string(), name.to_string());
                true
            }
        }
    }

    /// Map a freshly minted `id` to `name` and remember it as a placeholder.
    pub fn register_placeholder(&mut self, id: &str, name: &str) -> bool {
        if id.trim().is_empty() || name.trim().is_empty() {
            return false;
        }
        let renamed = self.register_id(id, name);
        let added = self.placeholder_ids.insert(id.trim().to_string());
        renamed || added
    }

    /// Map a note's own `id` to its file stem. A placeholder with the same id
    /// has now been claimed by a real note and stops being one.
    pub fn register_document_id(&mut self, id: &str, name: &str) -> bool {
        let renamed = self.register_id(id, name);
        let claimed = self.placeholder_ids.remove(id.trim());
        renamed || claimed
    }

    /// Number of pairs whose both halves are tracked.
    pub fn tracked_pairs(&self) -> usize {
        self.files
            .iter()
            .filter(|(path, entry)| {
                self.files
                    .get(&entry.paired_with)
                    .map(|other| &other.paired_with == *path)
                    .unwrap_or(false)
            })
            .count()
            / 2
    }
}

/// Key under which a path is stored in [`SyncState::files`].
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
