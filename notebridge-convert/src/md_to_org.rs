//! Markdown → org.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::callout::BlockKind;
use crate::error::ConvertError;
use crate::front_matter::split_yaml_front_matter;
use crate::inline::{md_line_to_org, whole_line_embed, LinkTable};
use crate::task::{parse_md_checkbox, TaskMeta};

/// `[!name]` with an optional fold sigil and title.
static CALLOUT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[!([A-Za-z0-9_-]+)\][+-]?\s*(.*)$").expect("static regex")
});

const MAX_HEADING_LEVEL: usize = 6;

pub(crate) fn convert(text: &str, links: &mut LinkTable<'_>) -> Result<String, ConvertError> {
    let source = crate::normalize_newlines(text);
    let lines: Vec<&str> = source.lines().collect();
    let (front, body_start) = split_yaml_front_matter(&lines)?;
    let body = crate::skip_blank(&lines[body_start..]);

    let mut out = Vec::with_capacity(lines.len() + 8);
    if !front.is_empty() {
        out.extend(front.to_org_header());
        if !body.is_empty() {
            out.push(String::new());
        }
    }
    convert_body(body, links, &mut out);
    Ok(crate::finish(out, source.ends_with('\n')))
}

fn convert_body(lines: &[&str], links: &mut LinkTable<'_>, out: &mut Vec<String>) {
    let mut i = 0;
    while let Some(line) = lines.get(i) {
        let trimmed = line.trim();

        if let Some((fence, info)) = fence_open(line) {
            i = fenced_block(lines, i, fence, info, out);
            continue;
        }
        if line.trim_start().starts_with('>') {
            i = blockquote(lines, i, links, out);
            continue;
        }
        if let Some((level, rest)) = parse_heading(line) {
            i = heading(lines, i, level, rest, links, out);
            continue;
        }

        if let Some(comment) = html_comment(trimmed) {
            if comment.is_empty() {
                out.push("#".to_string());
            } else {
                out.push(format!("# {comment}"));
            }
        } else if let Some(target) = whole_line_embed(trimmed) {
            out.push(format!("# EMBED: {target}"));
        } else {
            out.push(md_line_to_org(&unescape_quote_marker(line), links));
        }
        i += 1;
    }
}

/// Undo the `\>` escape that keeps org text lines out of blockquotes.
fn unescape_quote_marker(line: &str) -> Cow<'_, str> {
    let indent = line.len() - line.trim_start().len();
    match line[indent..].strip_prefix("\\>") {
        Some(rest) => Cow::Owned(format!("{}>{rest}", &line[..indent])),
        None => Cow::Borrowed(line),
    }
}

/// Opening code fence: returns the fence character and the info string.
fn fence_open(line: &str) -> Option<(char, &str)> {
    let t = line.trim_start();
    for fence in ['`', '~'] {
        let run = t.chars().take_while(|c| *c == fence).count();
        if run >= 3 {
            return Some((fence, t[run..].trim()));
        }
    }
    None
}

fn is_fence_close(line: &str, fence: char) -> bool {
    let t = line.trim();
    t.len() >= 3 && t.chars().all(|c| c == fence)
}

fn src_begin(info: &str) -> String {
    if info.is_empty() {
        "#+BEGIN_SRC".to_string()
    } else {
        format!("#+BEGIN_SRC {info}")
    }
}

fn fenced_block(lines: &[&str], start: usize, fence: char, info: &str, out: &mut Vec<String>) -> usize {
    out.push(src_begin(info));
    let mut i = start + 1;
    while let Some(line) = lines.get(i) {
        i += 1;
        if is_fence_close(line, fence) {
            break;
        }
        out.push((*line).to_string());
    }
    out.push("#+END_SRC".to_string());
    i
}

fn blockquote(lines: &[&str], start: usize, links: &mut LinkTable<'_>, out: &mut Vec<String>) -> usize {
    let mut content: Vec<&str> = Vec::new();
    let mut i = start;
    while let Some(line) = lines.get(i) {
        let Some(rest) = line.trim_start().strip_prefix('>') else {
            break;
        };
        content.push(rest.strip_prefix(' ').unwrap_or(rest));
        i += 1;
    }

    let header = content.first().and_then(|first| CALLOUT_HEADER.captures(first));
    let (kind, tail, body) = match header {
        Some(caps) => (
            BlockKind::from_name(caps.get(1).map_or("", |m| m.as_str())),
            caps.get(2).map_or("", |m| m.as_str().trim()),
            &content[1..],
        ),
        None => (BlockKind::Quote, "", &content[..]),
    };

    let name = kind.org_name();
    if kind.header_is_title() || tail.is_empty() {
        out.push(format!("#+BEGIN_{name}"));
        if !tail.is_empty() {
            out.push(md_line_to_org(tail, links));
        }
    } else {
        out.push(format!("#+BEGIN_{name} {tail}"));
    }

    let mut fence = None;
    for line in body {
        match fence {
            Some(open) if is_fence_close(line, open) => {
                fence = None;
                out.push("#+END_SRC".to_string());
            }
            Some(_) => out.push((*line).to_string()),
            None => match fence_open(line) {
                Some((open, info)) => {
                    fence = Some(open);
                    out.push(src_begin(info));
                }
                None => out.push(md_line_to_org(line, links)),
            },
        }
    }
    if fence.is_some() {
        out.push("#+END_SRC".to_string());
    }
    out.push(format!("#+END_{name}"));
    if lines.get(i).is_some_and(|next| !next.trim().is_empty()) {
        out.push(String::new());
    }
    i
}

fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let level = line.bytes().take_while(|b| *b == b'#').count();
    if level == 0 || level > MAX_HEADING_LEVEL {
        return None;
    }
    let rest = &line[level..];
    if rest.is_empty() {
        return Some((level, rest));
    }
    rest.strip_prefix(' ').map(|rest| (level, rest))
}

fn heading(
    lines: &[&str],
    start: usize,
    level: usize,
    rest: &str,
    links: &mut LinkTable<'_>,
    out: &mut Vec<String>,
) -> usize {
    let stars = "*".repeat(level);
    let Some((done, text)) = parse_md_checkbox(rest) else {
        out.push(format!("{stars} {}", md_line_to_org(rest, links)));
        return start + 1;
    };

    let mut meta = TaskMeta::default();
    let mut i = start + 1;
    while let Some(line) = lines.get(i) {
        if !meta.absorb_markdown(line.trim()) {
            break;
        }
        i += 1;
    }

    let mut head = format!("{stars} {}", if done { "DONE" } else { "TODO" });
    if let Some(code) = meta.priority {
        head.push_str(&format!(" [#{code}]"));
    }
    let text = md_line_to_org(text, links);
    if !text.is_empty() {
        head.push(' ');
        head.push_str(&text);
    }
    out.push(head);
    meta.push_org(out);
    i
}

/// Inner text of a single-line `<!-- … -->` comment.
fn html_comment(trimmed: &str) -> Option<&str> {
    let inner = trimmed.strip_prefix("<!--")?.strip_suffix("-->")?;
    (!inner.contains("-->")).then(|| inner.trim())
}
