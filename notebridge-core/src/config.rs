//! YAML configuration and on-disk layout.
//!
//! # Storage layout
//!
//! ```text
//! ~/.notebridge/
//!   config.yaml     (mode 0600, written by `notebridge init`)
//!   state.json      (tracked file state, owned by notebridge-sync)
//!   state.lock      (held for the duration of one sync pass)
//!   daemon.sock
//!   logs/daemon.log
//! ```
//!
//! # API pattern
//!
//! Every function touching the filesystem has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::exclude::ExcludeSet;
use crate::types::{ResolutionPolicy, Side};

pub const DEFAULT_INTERVAL_SECS: u64 = 30;

/// User configuration for one pair of note trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Root of the org tree.
    pub org_dir: PathBuf,
    /// Root of the markdown (Obsidian vault) tree.
    pub markdown_dir: PathBuf,
    /// Seconds between daemon passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub resolution_strategy: ResolutionPolicy,
    /// Glob patterns matched against tree-relative paths and file names.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl SyncConfig {
    pub fn new(org_dir: impl Into<PathBuf>, markdown_dir: impl Into<PathBuf>) -> Self {
        Self {
            org_dir: org_dir.into(),
            markdown_dir: markdown_dir.into(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            resolution_strategy: ResolutionPolicy::default(),
            exclude_patterns: Vec::new(),
            log_file: None,
        }
    }

    /// Root directory holding notes of `side`.
    pub fn root(&self, side: Side) -> &Path {
        match side {
            Side::Org => &self.org_dir,
            Side::Markdown => &self.markdown_dir,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Compile the exclusion list.
    pub fn excludes(&self) -> Result<ExcludeSet, ConfigError> {
        ExcludeSet::new(&self.exclude_patterns)
    }

    /// Replace leading `~` in every path with `home`.
    pub fn expand_paths(&mut self, home: &Path) {
        self.org_dir = expand_tilde(&self.org_dir, home);
        self.markdown_dir = expand_tilde(&self.markdown_dir, home);
        if let Some(log) = self.log_file.take() {
            self.log_file = Some(expand_tilde(&log, home));
        }
    }

    /// Reject configurations that would make a sync pass unsafe or meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, dir) in [("org_dir", &self.org_dir), ("markdown_dir", &self.markdown_dir)] {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} is required")));
            }
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be an absolute path, got '{}'",
                    dir.display()
                )));
            }
        }

        let org = normalize(&self.org_dir);
        let md = normalize(&self.markdown_dir);
        if org == md {
            return Err(ConfigError::Invalid(
                "org_dir and markdown_dir must be different directories".to_string(),
            ));
        }
        if org.starts_with(&md) || md.starts_with(&org) {
            return Err(ConfigError::Invalid(
                "org_dir and markdown_dir must not be nested inside each other".to_string(),
            ));
        }

        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "interval_secs must be greater than zero".to_string(),
            ));
        }

        self.excludes()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.notebridge/`
pub fn notebridge_root(home: &Path) -> PathBuf {
    home.join(".notebridge")
}

/// `<home>/.notebridge/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    notebridge_root(home).join("config.yaml")
}

/// `<home>/.notebridge/state.json`
pub fn state_path_at(home: &Path) -> PathBuf {
    notebridge_root(home).join("state.json")
}

/// `<home>/.notebridge/state.lock`
pub fn lock_path_at(home: &Path) -> PathBuf {
    notebridge_root(home).join("state.lock")
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load, expand and validate `<home>/.notebridge/config.yaml`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let mut config: SyncConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    config.expand_paths(home);
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SyncConfig, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Validate and atomically save the config.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &SyncConfig) -> Result<PathBuf, ConfigError> {
    config.validate()?;

    let root = notebridge_root(home);
    std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    let path = config_path_at(home);
    let tmp = path.with_extension("yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(config: &SyncConfig) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

fn expand_tilde(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Lexical normalisation (`.` and `..`) without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    #[test]
    fn paths_are_under_dot_notebridge() {
        let home = make_home();
        assert!(config_path_at(home.path()).ends_with(".notebridge/config.yaml"));
        assert!(state_path_at(home.path()).ends_with(".notebridge/state.json"));
        assert!(lock_path_at(home.path()).ends_with(".notebridge/state.lock"));
    }

    #[test]
    fn tilde_expands_against_home() {
        let mut cfg = SyncConfig::new("~/org", "~/vault");
        cfg.expand_paths(Path::new("/home/ada"));
        assert_eq!(cfg.org_dir, PathBuf::from("/home/ada/org"));
        assert_eq!(cfg.markdown_dir, PathBuf::from("/home/ada/vault"));
    }

    #[test]
    fn nested_roots_are_rejected() {
        let cfg = SyncConfig::new("/notes", "/notes/vault");
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        let cfg = SyncConfig::new("/notes/org/../vault", "/notes/vault");
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn relative_roots_are_rejected() {
        let cfg = SyncConfig::new("org", "/vault");
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("absolute"), "got: {err}");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut cfg = SyncConfig::new("/org", "/vault");
        cfg.interval_secs = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = make_home();
        let mut cfg = SyncConfig::new("/data/org", "/data/vault");
        cfg.exclude_patterns = vec!["*.tmp".to_string()];
        cfg.resolution_strategy = ResolutionPolicy::UseMarkdown;

        save_at(home.path(), &cfg).expect("save");
        let loaded = load_at(home.path()).expect("load");
        assert_eq!(loaded, cfg);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(config_path_at(home.path()))
                .unwrap()
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let home = make_home();
        std::fs::create_dir_all(notebridge_root(home.path())).unwrap();
        std::fs::write(
            config_path_at(home.path()),
            "org_dir: ~/org\nmarkdown_dir: ~/vault\n",
        )
        .unwrap();

        let cfg = load_at(home.path()).expect("load");
        assert_eq!(cfg.interval_secs, DEFAULT_INTERVAL_SECS);
        assert_eq!(cfg.resolution_strategy, ResolutionPolicy::LastWriteWins);
        assert!(cfg.exclude_patterns.is_empty());
        assert_eq!(cfg.org_dir, home.path().join("org"));
    }
}
