//! Inline link syntax: org-roam ID links ↔ wikilinks, image file links ↔
//! embeds.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use uuid::Uuid;

use notebridge_core::IdMap;

/// `[[id:UUID]]` or `[[id:UUID][description]]`.
pub(crate) static ORG_ID_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[id:([^\]]+)\](?:\[([^\]]+)\])?\]").expect("static regex")
});

/// `[[file:path]]` or `[[file:path][description]]`.
static ORG_FILE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[file:([^\]]+)\](?:\[([^\]]+)\])?\]").expect("static regex")
});

/// Wikilink or embed: optional `!`, target, optional `#fragment`, optional
/// `|alias`.
pub(crate) static MD_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(!)?\[\[([^\]|#]+)(#[^\]|]*)?(?:\|([^\]]*))?\]\]").expect("static regex")
});

/// A line consisting of nothing but one embed.
static MD_EMBED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^!\[\[([^\]|#]+)(#[^\]|]*)?(?:\|[^\]]*)?\]\]$").expect("static regex")
});

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "ico", "tiff", "tif",
];

pub(crate) static NO_PLACEHOLDERS: BTreeSet<String> = BTreeSet::new();

/// Identifier lookups for one conversion call.
///
/// Unknown names get a fresh UUID the first time they are seen; later
/// references to the same name within the call reuse it. When several ids
/// share a name, a real note id beats a placeholder.
#[derive(Debug)]
pub struct LinkTable<'a> {
    ids: &'a IdMap,
    by_name: HashMap<&'a str, &'a str>,
    minted: BTreeMap<String, String>,
}

impl<'a> LinkTable<'a> {
    pub fn new(ids: &'a IdMap) -> Self {
        Self::with_placeholders(ids, &NO_PLACEHOLDERS)
    }

    /// `placeholders` are minted ids that should lose name lookups to any
    /// other id registered for the same name.
    pub fn with_placeholders(ids: &'a IdMap, placeholders: &BTreeSet<String>) -> Self {
        let mut by_name: HashMap<&'a str, &'a str> = HashMap::with_capacity(ids.len());
        for (id, name) in ids {
            match by_name.entry(name.as_str()) {
                Entry::Vacant(slot) => {
                    slot.insert(id.as_str());
                }
                Entry::Occupied(mut slot) => {
                    if placeholders.contains(*slot.get()) && !placeholders.contains(id.as_str()) {
                        slot.insert(id.as_str());
                    }
                }
            }
        }
        Self {
            ids,
            by_name,
            minted: BTreeMap::new(),
        }
    }

    /// Note name for `id`; the id itself when nothing is known about it.
    pub fn name_for<'s>(&'s self, id: &'s str) -> &'s str {
        if let Some(name) = self.ids.get(id) {
            return name;
        }
        self.minted
            .iter()
            .find(|(_, minted)| minted.as_str() == id)
            .map(|(name, _)| name.as_str())
            .unwrap_or(id)
    }

    /// Identifier for the note called `name`, minting one if needed.
    pub fn id_for(&mut self, name: &str) -> String {
        if let Some(id) = self.by_name.get(name) {
            return (*id).to_string();
        }
        if let Some(id) = self.minted.get(name) {
            return id.clone();
        }
        if is_uuid(name) {
            return name.to_string();
        }
        let id = Uuid::new_v4().to_string();
        self.minted.insert(name.to_string(), id.clone());
        id
    }

    /// Identifiers minted so far, `name → id`.
    pub fn into_minted(self) -> BTreeMap<String, String> {
        self.minted
    }
}

/// Canonical 36-character hyphenated UUID.
pub fn is_uuid(candidate: &str) -> bool {
    candidate.len() == 36 && Uuid::parse_str(candidate).is_ok()
}

pub fn is_image(target: &str) -> bool {
    target
        .rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Org → markdown
// ---------------------------------------------------------------------------

pub(crate) fn org_line_to_md(line: &str, links: &LinkTable<'_>) -> String {
    let line = ORG_FILE_LINK.replace_all(line, |caps: &Captures<'_>| {
        let target = &caps[1];
        if caps.get(2).is_none() && is_image(target) {
            format!("![[{target}]]")
        } else {
            caps[0].to_string()
        }
    });
    ORG_ID_LINK
        .replace_all(&line, |caps: &Captures<'_>| {
            id_link_to_md(&caps[1], caps.get(2).map(|m| m.as_str()), links)
        })
        .into_owned()
}

pub(crate) fn id_link_to_md(id: &str, description: Option<&str>, links: &LinkTable<'_>) -> String {
    let name = links.name_for(id.trim());
    match description {
        Some(description) => format!("[[{name}|{description}]]"),
        None => format!("[[{name}]]"),
    }
}

// ---------------------------------------------------------------------------
// Markdown → org
// ---------------------------------------------------------------------------

pub(crate) fn md_line_to_org(line: &str, links: &mut LinkTable<'_>) -> String {
    MD_LINK
        .replace_all(line, |caps: &Captures<'_>| {
            let target = caps[2].trim();
            // Org link types (`file:`, `https:`) pass through untouched.
            if target.contains(':') {
                return caps[0].to_string();
            }
            let fragment = caps.get(3).map_or("", |m| m.as_str());
            if caps.get(1).is_some() {
                if is_image(target) {
                    return format!("[[file:{target}]]");
                }
                return wikilink_to_org(target, fragment, None, links);
            }
            let alias = caps.get(4).map(|m| m.as_str()).filter(|a| !a.is_empty());
            wikilink_to_org(target, fragment, alias, links)
        })
        .into_owned()
}

pub(crate) fn wikilink_to_org(
    name: &str,
    fragment: &str,
    description: Option<&str>,
    links: &mut LinkTable<'_>,
) -> String {
    let name = name.trim();
    let id = links.id_for(name);
    let description = match description {
        Some(d) => Some(d.to_string()),
        None if !fragment.is_empty() => Some(format!("{name}{fragment}")),
        None => None,
    };
    match description {
        Some(description) => format!("[[id:{id}][{description}]]"),
        None => format!("[[id:{id}]]"),
    }
}

/// Target of a line that is nothing but a non-image note embed.
pub(crate) fn whole_line_embed(trimmed: &str) -> Option<String> {
    let caps = MD_EMBED_LINE.captures(trimmed)?;
    let target = caps[1].trim();
    if target.contains(':') || is_image(target) {
        return None;
    }
    let fragment = caps.get(2).map_or("", |m| m.as_str());
    Some(format!("{target}{fragment}"))
}
