//! Notebridge core library: domain types, configuration and errors.
//!
//! Public API surface:
//! - [`types`]: sides, policies, tracked state
//! - [`config`]: load / save / validate `~/.notebridge/config.yaml`
//! - [`exclude`]: exclude pattern matching
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod exclude;
pub mod types;

pub use config::SyncConfig;
pub use error::ConfigError;
pub use exclude::{ExcludeSet, GlobPattern};
pub use types::{
    path_key, Direction, IdMap, Mtime, ResolutionPolicy, Side, SyncState, TrackedFileState,
};
