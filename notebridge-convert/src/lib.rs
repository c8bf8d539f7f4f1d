//! # notebridge-convert
//!
//! Pure text conversion between org-mode (org-roam flavoured) and
//! Obsidian-flavoured markdown. Nothing here touches the filesystem.
//!
//! ## Usage
//!
//! ```rust
//! use notebridge_convert::{markdown_to_org, org_to_markdown};
//! use notebridge_core::IdMap;
//!
//! let ids = IdMap::new();
//! let md = org_to_markdown("** TODO [#A] Write tests\nSCHEDULED: <2024-01-15>", &ids).unwrap();
//! assert_eq!(md.text, "## - [ ] Write tests\n⏳ 2024-01-15\nPriority: high");
//!
//! let org = markdown_to_org(&md.text, &ids).unwrap();
//! assert_eq!(org.text, "** TODO [#A] Write tests\nSCHEDULED: <2024-01-15>");
//! ```
//!
//! Links are resolved against an [`IdMap`] (`id → note name`). Names with no
//! known identifier get a fresh UUID, reported in [`Converted::minted`] so the
//! caller can persist it.

use std::collections::{BTreeMap, BTreeSet};

use notebridge_core::{IdMap, Side};

pub mod callout;
pub mod error;
pub mod front_matter;
pub mod inline;
pub mod marker;
mod md_to_org;
mod org_to_md;
mod task;

pub use callout::{BlockKind, CalloutFamily};
pub use error::ConvertError;
pub use front_matter::FrontMatter;
pub use inline::{is_uuid, LinkTable};
pub use marker::{convert_marker, Feature, FeatureMarker, HybridConverter};

/// Output of one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub text: String,
    /// Identifiers created for previously unknown link targets, `name → id`.
    pub minted: BTreeMap<String, String>,
}

pub fn org_to_markdown(text: &str, ids: &IdMap) -> Result<Converted, ConvertError> {
    convert_with(Side::Org, text, ids, &inline::NO_PLACEHOLDERS)
}

pub fn markdown_to_org(text: &str, ids: &IdMap) -> Result<Converted, ConvertError> {
    convert_with(Side::Markdown, text, ids, &inline::NO_PLACEHOLDERS)
}

/// Convert a document written in `from` into the other dialect.
pub fn convert(from: Side, text: &str, ids: &IdMap) -> Result<Converted, ConvertError> {
    convert_with(from, text, ids, &inline::NO_PLACEHOLDERS)
}

/// [`convert`], where `placeholders` names minted ids that lose wikilink
/// lookups to a real note id for the same name.
pub fn convert_with(
    from: Side,
    text: &str,
    ids: &IdMap,
    placeholders: &BTreeSet<String>,
) -> Result<Converted, ConvertError> {
    let mut links = LinkTable::with_placeholders(ids, placeholders);
    let text = match from {
        Side::Org => org_to_md::convert(text, &links)?,
        Side::Markdown => md_to_org::convert(text, &mut links)?,
    };
    Ok(Converted {
        text,
        minted: links.into_minted(),
    })
}

/// The document's own identifier (`:ID:` property or `id:` front matter key).
///
/// Returns `None` when the document has none or its header cannot be parsed.
pub fn note_id(text: &str, side: Side) -> Option<String> {
    let source = normalize_newlines(text);
    let lines: Vec<&str> = source.lines().collect();
    let front = match side {
        Side::Org => front_matter::split_org_header(&lines).ok()?.0,
        Side::Markdown => front_matter::split_yaml_front_matter(&lines).ok()?.0,
    };
    front.id
}

// ---------------------------------------------------------------------------
// Shared line plumbing
// ---------------------------------------------------------------------------

pub(crate) fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

pub(crate) fn skip_blank<'a, 'b>(lines: &'b [&'a str]) -> &'b [&'a str] {
    let first = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    &lines[first..]
}

pub(crate) fn finish(lines: Vec<String>, trailing_newline: bool) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut text = lines.join("\n");
    if trailing_newline {
        text.push('\n');
    }
    text
}
