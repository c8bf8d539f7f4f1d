//! Error types for notebridge-convert.

use thiserror::Error;

/// Structural failures that stop a document from being converted at all.
///
/// Unrecognised syntax is never an error; it is carried through as text.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A `:PROPERTIES:` drawer in the file header has no matching `:END:`.
    #[error("unterminated :PROPERTIES: drawer opened on line {line}")]
    UnterminatedDrawer { line: usize },

    /// The `---` front matter block is not valid YAML.
    #[error("malformed front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    /// The front matter parsed, but is not a key/value mapping.
    #[error("front matter must be a mapping of keys to values")]
    FrontMatterShape,
}
