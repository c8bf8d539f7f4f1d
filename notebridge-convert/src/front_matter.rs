//! Document-level metadata: the org file header and YAML front matter.
//!
//! Org side:
//!
//! ```text
//! :PROPERTIES:
//! :ID: 550e8400-e29b-41d4-a716-446655440000
//! :ROAM_ALIASES: "Short name" other
//! :END:
//! #+title: My Note
//! #+filetags: :project:idea:
//! ```
//!
//! Markdown side:
//!
//! ```text
//! ---
//! id: 550e8400-e29b-41d4-a716-446655440000
//! title: My Note
//! aliases:
//!   - Short name
//! tags:
//!   - project
//! ---
//! ```

use serde_yaml::Value;

use crate::error::ConvertError;

/// Metadata shared by both header dialects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub id: Option<String>,
    pub title: Option<String>,
    pub aliases: Vec<String>,
    pub tags: Vec<String>,
    pub refs: Vec<String>,
    /// Any other property, lowercase key → value as written in org.
    pub extra: Vec<(String, String)>,
}

impl FrontMatter {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.title.is_none()
            && self.aliases.is_empty()
            && self.tags.is_empty()
            && self.refs.is_empty()
            && self.extra.is_empty()
    }

    fn has_drawer(&self) -> bool {
        self.id.is_some() || !self.aliases.is_empty() || !self.refs.is_empty() || !self.extra.is_empty()
    }

    fn apply_property(&mut self, key: &str, value: &str) {
        match key.to_ascii_uppercase().as_str() {
            "ID" => self.id = non_empty(value),
            "ROAM_ALIASES" => self.aliases = split_quoted(value),
            "ROAM_REFS" => self.refs = split_quoted(value),
            _ => self.extra.push((key.to_ascii_lowercase(), value.to_string())),
        }
    }

    /// `---` fenced YAML block.
    pub fn to_yaml_block(&self) -> Vec<String> {
        let mut out = vec!["---".to_string()];
        if let Some(id) = &self.id {
            out.push(format!("id: {}", yaml_scalar(id)));
        }
        if let Some(title) = &self.title {
            out.push(format!("title: {}", yaml_scalar(title)));
        }
        push_yaml_list(&mut out, "aliases", &self.aliases);
        push_yaml_list(&mut out, "tags", &self.tags);
        push_yaml_list(&mut out, "refs", &self.refs);
        for (key, value) in &self.extra {
            out.push(format!("{}: {}", yaml_scalar(key), extra_to_yaml(value)));
        }
        out.push("---".to_string());
        out
    }

    /// Property drawer followed by `#+title:` / `#+filetags:` lines.
    pub fn to_org_header(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.has_drawer() {
            out.push(":PROPERTIES:".to_string());
            if let Some(id) = &self.id {
                out.push(format!(":ID: {}", one_line(id)));
            }
            if !self.aliases.is_empty() {
                let quoted: Vec<String> = self.aliases.iter().map(|a| quote_org(a)).collect();
                out.push(format!(":ROAM_ALIASES: {}", quoted.join(" ")));
            }
            if !self.refs.is_empty() {
                let refs: Vec<String> = self
                    .refs
                    .iter()
                    .map(|r| if r.contains(char::is_whitespace) { quote_org(r) } else { r.clone() })
                    .collect();
                out.push(format!(":ROAM_REFS: {}", refs.join(" ")));
            }
            for (key, value) in &self.extra {
                out.push(format!(":{}: {}", key.to_ascii_uppercase(), one_line(value)));
            }
            out.push(":END:".to_string());
        }
        if let Some(title) = &self.title {
            out.push(format!("#+title: {}", one_line(title)));
        }
        if !self.tags.is_empty() {
            out.push(format!("#+filetags: :{}:", self.tags.join(":")));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// 1. Org header
// ---------------------------------------------------------------------------

/// Parse the org header region. Returns the metadata and the index of the
/// first body line.
pub fn split_org_header(lines: &[&str]) -> Result<(FrontMatter, usize), ConvertError> {
    let mut front = FrontMatter::default();
    let mut seen_drawer = false;
    let mut i = 0;

    while let Some(line) = lines.get(i) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        if !seen_drawer && trimmed.eq_ignore_ascii_case(":PROPERTIES:") {
            seen_drawer = true;
            let opened = i + 1;
            i += 1;
            loop {
                let Some(inner) = lines.get(i) else {
                    return Err(ConvertError::UnterminatedDrawer { line: opened });
                };
                i += 1;
                let inner = inner.trim();
                if inner.eq_ignore_ascii_case(":END:") {
                    break;
                }
                if let Some((key, value)) = parse_property(inner) {
                    front.apply_property(key, value);
                }
            }
            continue;
        }
        if let Some(title) = keyword_value(trimmed, "title") {
            front.title = non_empty(title);
        } else if let Some(tags) = keyword_value(trimmed, "filetags") {
            front.tags = tags
                .split(|c: char| c == ':' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        } else {
            break;
        }
        i += 1;
    }

    Ok((front, i))
}

/// `:KEY: value` → `("KEY", "value")`.
fn parse_property(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(':')?;
    let end = rest.find(':')?;
    let key = &rest[..end];
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, rest[end + 1..].trim()))
}

/// Value of a `#+name:` keyword line, matched case-insensitively.
fn keyword_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let prefix = format!("#+{name}:");
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(&prefix)
        .then(|| line[prefix.len()..].trim())
}

/// Split `"a b" c "d"` into `["a b", "c", "d"]`.
fn split_quoted(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut chars = value.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut item = String::new();
        if c == '"' {
            chars.next();
            while let Some(ch) = chars.next() {
                match ch {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            item.push(escaped);
                        }
                    }
                    '"' => break,
                    other => item.push(other),
                }
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                item.push(ch);
                chars.next();
            }
        }
        if !item.is_empty() {
            items.push(item);
        }
    }
    items
}

fn quote_org(value: &str) -> String {
    format!("\"{}\"", one_line(value).replace('\\', "\\\\").replace('"', "\\\""))
}

fn one_line(value: &str) -> String {
    value.lines().map(str::trim).collect::<Vec<_>>().join(" ")
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

// ---------------------------------------------------------------------------
// 2. YAML front matter
// ---------------------------------------------------------------------------

/// Parse a leading `---` block. A document without one (or whose opening
/// `---` is never closed) has empty metadata and its body starts at line 0.
pub fn split_yaml_front_matter(lines: &[&str]) -> Result<(FrontMatter, usize), ConvertError> {
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return Ok((FrontMatter::default(), 0));
    }
    let Some(close) = lines
        .iter()
        .skip(1)
        .position(|l| l.trim_end() == "---")
        .map(|p| p + 1)
    else {
        return Ok((FrontMatter::default(), 0));
    };

    let front = parse_yaml(&lines[1..close].join("\n"))?;
    Ok((front, close + 1))
}

fn parse_yaml(yaml: &str) -> Result<FrontMatter, ConvertError> {
    let mut front = FrontMatter::default();
    if yaml.trim().is_empty() {
        return Ok(front);
    }
    let mapping = match serde_yaml::from_str::<Value>(yaml)? {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(front),
        _ => return Err(ConvertError::FrontMatterShape),
    };

    for (key, value) in mapping {
        let key = match key {
            Value::String(s) => s,
            other => flow(&other),
        };
        match key.to_ascii_lowercase().as_str() {
            "id" => front.id = scalar(&value),
            "title" => front.title = scalar(&value),
            "aliases" | "alias" => front.aliases = list(&value),
            "tags" | "tag" => {
                front.tags = list(&value)
                    .into_iter()
                    .map(|t| t.trim_start_matches('#').to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            "refs" => front.refs = list(&value),
            _ => front.extra.push((key.to_ascii_lowercase(), flow(&value))),
        }
    }
    Ok(front)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => non_empty(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(flow(other)),
    }
}

fn list(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Sequence(items) => items.iter().filter_map(scalar).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        other => scalar(other).into_iter().collect(),
    }
}

/// Single-line YAML rendering used to carry structured extras through an org
/// property value.
fn flow(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => yaml_scalar(s),
        Value::Sequence(items) => {
            let items: Vec<String> = items.iter().map(flow).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Mapping(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", flow(k), flow(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Tagged(tagged) => flow(&tagged.value),
    }
}

/// Extras written by [`flow`] are already YAML; anything hand-written in org
/// gets quoted as a plain string.
fn extra_to_yaml(value: &str) -> String {
    let value = value.trim();
    let structured = value.starts_with(['[', '{', '"', '\''])
        && serde_yaml::from_str::<Value>(value).is_ok();
    if structured {
        value.to_string()
    } else {
        yaml_scalar(value)
    }
}

fn push_yaml_list(out: &mut Vec<String>, key: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push(format!("{key}:"));
    for item in items {
        out.push(format!("  - {}", yaml_scalar(item)));
    }
}

/// Emit `value` as a YAML scalar, double-quoting whenever a plain scalar
/// would change meaning.
pub(crate) fn yaml_scalar(value: &str) -> String {
    if is_plain_safe(value) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_plain_safe(value: &str) -> bool {
    let Some(first) = value.chars().next() else {
        return false;
    };
    if value.trim() != value || "-?:,[]{}#&*!|>'\"%@`".contains(first) {
        return false;
    }
    if value.contains(": ") || value.contains(" #") || value.ends_with(':') {
        return false;
    }
    if value
        .chars()
        .any(|c| c.is_control() || matches!(c, ',' | '[' | ']' | '{' | '}'))
    {
        return false;
    }
    let lower = value.to_ascii_lowercase();
    if matches!(
        lower.as_str(),
        "true" | "false" | "yes" | "no" | "on" | "off" | "y" | "n" | "null" | "~"
    ) {
        return false;
    }
    !(value.parse::<f64>().is_ok() || lower.starts_with("0x") || lower.starts_with("0o"))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
