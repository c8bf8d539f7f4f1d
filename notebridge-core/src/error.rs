//! Error types for notebridge-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration and domain-value parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, with the path that was being accessed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`, so we cannot locate `~/.notebridge/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No config file at the expected path.
    #[error("config not found at {path}; run `notebridge init` first")]
    NotFound { path: PathBuf },

    /// Resolution strategy string not in the supported set.
    #[error("unknown resolution strategy '{0}'; expected: last-write-wins, use-org, use-markdown")]
    UnknownPolicy(String),

    /// Manual resolution direction string not in the supported set.
    #[error("invalid direction '{0}'; expected: org, markdown, last-write-wins, skip")]
    InvalidDirection(String),

    /// Exclude pattern that cannot be compiled.
    #[error("invalid exclude pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    /// Semantically invalid configuration value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
