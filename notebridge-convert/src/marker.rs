//! Marker-based conversion for link syntax.
//!
//! Links are lifted out of the document before the line converter runs and
//! put back afterwards, so the line rules never see (or mangle) them:
//!
//! 1. every link outside code is replaced by a unique marker token and a
//!    [`FeatureMarker`] recording what to emit in its place;
//! 2. the masked text goes through the ordinary converter;
//! 3. each marker is substituted once, in extraction order.

use std::collections::BTreeSet;

use regex::Captures;
use uuid::Uuid;

use notebridge_core::{IdMap, Side};

use crate::error::ConvertError;
use crate::inline::{
    id_link_to_md, wikilink_to_org, LinkTable, MD_LINK, NO_PLACEHOLDERS, ORG_ID_LINK,
};
use crate::{md_to_org, org_to_md, Converted};

/// A link feature captured by the pre-pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feature {
    /// `[[id:…]]` on the org side.
    IdLink {
        id: String,
        description: Option<String>,
    },
    /// `[[Name#fragment|alias]]` on the markdown side.
    WikiLink {
        name: String,
        fragment: String,
        description: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureMarker {
    /// Placeholder left in the masked text.
    pub token: String,
    pub feature: Feature,
    /// The exact source text that was replaced.
    pub original: String,
}

/// Deferred conversion of one marker into the target dialect.
pub fn convert_marker(marker: &FeatureMarker, links: &mut LinkTable<'_>) -> String {
    match &marker.feature {
        Feature::IdLink { id, description } => id_link_to_md(id, description.as_deref(), links),
        Feature::WikiLink {
            name,
            fragment,
            description,
        } => wikilink_to_org(name, fragment, description.as_deref(), links),
    }
}

/// Converter that routes link syntax through markers.
///
/// The marker list is scoped to a single call: it is cleared before
/// extraction and drained by substitution, so one instance can be reused
/// for any number of documents.
#[derive(Debug, Default)]
pub struct HybridConverter {
    markers: Vec<FeatureMarker>,
}

impl HybridConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn org_to_markdown(&mut self, text: &str, ids: &IdMap) -> Result<Converted, ConvertError> {
        self.convert_with(Side::Org, text, ids, &NO_PLACEHOLDERS)
    }

    pub fn markdown_to_org(&mut self, text: &str, ids: &IdMap) -> Result<Converted, ConvertError> {
        self.convert_with(Side::Markdown, text, ids, &NO_PLACEHOLDERS)
    }

    /// Convert a document written in `from` into the other dialect.
    pub fn convert(&mut self, from: Side, text: &str, ids: &IdMap) -> Result<Converted, ConvertError> {
        self.convert_with(from, text, ids, &NO_PLACEHOLDERS)
    }

    /// [`HybridConverter::convert`] with placeholder ids, see
    /// [`crate::convert_with`].
    pub fn convert_with(
        &mut self,
        from: Side,
        text: &str,
        ids: &IdMap,
        placeholders: &BTreeSet<String>,
    ) -> Result<Converted, ConvertError> {
        self.markers.clear();
        let masked = self.extract(text, from);
        let mut links = LinkTable::with_placeholders(ids, placeholders);
        let converted = match from {
            Side::Org => org_to_md::convert(&masked, &links),
            Side::Markdown => md_to_org::convert(&masked, &mut links),
        };
        let text = self.finish(converted, &mut links)?;
        Ok(Converted {
            text,
            minted: links.into_minted(),
        })
    }

    /// Markers recorded and not yet substituted.
    pub fn pending(&self) -> &[FeatureMarker] {
        &self.markers
    }

    fn finish(
        &mut self,
        converted: Result<String, ConvertError>,
        links: &mut LinkTable<'_>,
    ) -> Result<String, ConvertError> {
        match converted {
            Ok(text) => Ok(self.restore(text, links)),
            Err(err) => {
                self.markers.clear();
                Err(err)
            }
        }
    }

    fn extract(&mut self, text: &str, side: Side) -> String {
        let mut out = String::with_capacity(text.len());
        let mut in_code = false;
        for line in text.split_inclusive('\n') {
            if toggles_code(line, side, in_code) {
                in_code = !in_code;
                out.push_str(line);
                continue;
            }
            if in_code {
                out.push_str(line);
                continue;
            }
            let masked = match side {
                Side::Org => ORG_ID_LINK.replace_all(line, |caps: &Captures<'_>| {
                    self.push_marker(
                        text,
                        &caps[0],
                        Feature::IdLink {
                            id: caps[1].trim().to_string(),
                            description: caps.get(2).map(|m| m.as_str().to_string()),
                        },
                    )
                }),
                Side::Markdown => MD_LINK.replace_all(line, |caps: &Captures<'_>| {
                    let name = caps[2].trim();
                    if caps.get(1).is_some() || name.contains(':') {
                        return caps[0].to_string();
                    }
                    self.push_marker(
                        text,
                        &caps[0],
                        Feature::WikiLink {
                            name: name.to_string(),
                            fragment: caps.get(3).map_or("", |m| m.as_str()).to_string(),
                            description: caps
                                .get(4)
                                .map(|m| m.as_str())
                                .filter(|d| !d.is_empty())
                                .map(str::to_string),
                        },
                    )
                }),
            };
            out.push_str(&masked);
        }
        out
    }

    fn push_marker(&mut self, source: &str, original: &str, feature: Feature) -> String {
        let token = loop {
            let candidate = format!("NOTEBRIDGE{}MARKER", Uuid::new_v4().simple());
            if !source.contains(&candidate) {
                break candidate;
            }
        };
        self.markers.push(FeatureMarker {
            token: token.clone(),
            feature,
            original: original.to_string(),
        });
        token
    }

    fn restore(&mut self, mut text: String, links: &mut LinkTable<'_>) -> String {
        for marker in self.markers.drain(..) {
            let replacement = convert_marker(&marker, links);
            text = text.replacen(&marker.token, &replacement, 1);
        }
        text
    }
}

/// Whether `line` opens or closes a code region.
fn toggles_code(line: &str, side: Side, in_code: bool) -> bool {
    let t = line.trim();
    match side {
        Side::Org => {
            let prefix = if in_code { "#+END_SRC" } else { "#+BEGIN_SRC" };
            t.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        }
        Side::Markdown => {
            let t = t.trim_start_matches(|c: char| c == '>' || c.is_whitespace());
            t.starts_with("```") || t.starts_with("~~~")
        }
    }
}
