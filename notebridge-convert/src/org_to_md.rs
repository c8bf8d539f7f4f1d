//! Org → markdown, one line at a time with small look-aheads for blocks and
//! task planning.

use crate::callout::BlockKind;
use crate::error::ConvertError;
use crate::front_matter::split_org_header;
use crate::inline::{org_line_to_md, LinkTable};
use crate::task::{parse_org_task, TaskMeta};

pub(crate) fn convert(text: &str, links: &LinkTable<'_>) -> Result<String, ConvertError> {
    let source = crate::normalize_newlines(text);
    let lines: Vec<&str> = source.lines().collect();
    let (front, body_start) = split_org_header(&lines)?;
    let body = crate::skip_blank(&lines[body_start..]);

    let mut out = Vec::with_capacity(lines.len() + 8);
    if !front.is_empty() {
        out.extend(front.to_yaml_block());
        if !body.is_empty() {
            out.push(String::new());
        }
    }
    convert_body(body, links, &mut out);
    Ok(crate::finish(out, source.ends_with('\n')))
}

fn convert_body(lines: &[&str], links: &LinkTable<'_>, out: &mut Vec<String>) {
    let mut i = 0;
    while let Some(line) = lines.get(i) {
        let trimmed = line.trim();

        if let Some(begin) = BlockBegin::parse(trimmed) {
            i = if begin.name.eq_ignore_ascii_case("SRC") {
                src_block(lines, i, &begin, out)
            } else {
                special_block(lines, i, &begin, links, out)
            };
            continue;
        }

        if let Some((level, rest)) = parse_heading(line) {
            i = heading(lines, i, level, rest, links, out);
            continue;
        }

        if let Some(comment) = comment_text(line) {
            match comment.strip_prefix("EMBED:") {
                Some(target) => out.push(format!("![[{}]]", target.trim())),
                None if comment.is_empty() => out.push("<!-- -->".to_string()),
                None => out.push(format!("<!-- {comment} -->")),
            }
        } else if trimmed.starts_with("CLOCK:") {
            out.push(format!("<!-- {trimmed} -->"));
        } else {
            out.push(escape_quote_marker(org_line_to_md(line, links)));
        }
        i += 1;
    }
}

/// A leading `>` on a text line would open a blockquote in markdown.
fn escape_quote_marker(line: String) -> String {
    let indent = line.len() - line.trim_start().len();
    if line[indent..].starts_with('>') {
        format!("{}\\{}", &line[..indent], &line[indent..])
    } else {
        line
    }
}

/// `#+BEGIN_NAME args`
struct BlockBegin<'a> {
    name: &'a str,
    args: &'a str,
}

impl<'a> BlockBegin<'a> {
    fn parse(trimmed: &'a str) -> Option<Self> {
        let head = trimmed.get(..8)?;
        if !head.eq_ignore_ascii_case("#+BEGIN_") {
            return None;
        }
        let rest = &trimmed[8..];
        let (name, args) = match rest.find(char::is_whitespace) {
            Some(split) => (&rest[..split], rest[split..].trim()),
            None => (rest, ""),
        };
        (!name.is_empty()).then_some(Self { name, args })
    }
}

fn is_end(trimmed: &str, name: &str) -> bool {
    trimmed
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("#+END_"))
        && trimmed[6..].trim().eq_ignore_ascii_case(name)
}

fn src_block(lines: &[&str], start: usize, begin: &BlockBegin<'_>, out: &mut Vec<String>) -> usize {
    out.push(format!("```{}", begin.args));
    let mut i = start + 1;
    while let Some(line) = lines.get(i) {
        if is_end(line.trim(), "SRC") {
            i += 1;
            break;
        }
        out.push((*line).to_string());
        i += 1;
    }
    out.push("```".to_string());
    i
}

fn special_block(
    lines: &[&str],
    start: usize,
    begin: &BlockBegin<'_>,
    links: &LinkTable<'_>,
    out: &mut Vec<String>,
) -> usize {
    let kind = BlockKind::from_name(begin.name);
    if let Some(header) = kind.callout_header(begin.args) {
        out.push(header);
    }
    let mut in_code = false;
    let mut i = start + 1;
    while let Some(line) = lines.get(i) {
        let trimmed = line.trim();
        i += 1;
        if in_code {
            if is_end(trimmed, "SRC") {
                in_code = false;
                out.push("> ```".to_string());
            } else {
                out.push(quoted(line));
            }
            continue;
        }
        if is_end(trimmed, begin.name) {
            break;
        }
        match BlockBegin::parse(trimmed) {
            Some(inner) if inner.name.eq_ignore_ascii_case("SRC") => {
                in_code = true;
                out.push(quoted(&format!("```{}", inner.args)));
            }
            _ => out.push(quoted(&org_line_to_md(line, links))),
        }
    }
    if in_code {
        out.push("> ```".to_string());
    }
    // Keep the next paragraph out of the blockquote.
    if lines.get(i).is_some_and(|next| !next.trim().is_empty()) {
        out.push(String::new());
    }
    i
}

fn quoted(line: &str) -> String {
    if line.trim().is_empty() {
        ">".to_string()
    } else {
        format!("> {line}")
    }
}

/// `*** rest` → `(3, "rest")`. A marker run without a following space is not
/// a heading.
fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let level = line.bytes().take_while(|b| *b == b'*').count();
    if level == 0 {
        return None;
    }
    line[level..].strip_prefix(' ').map(|rest| (level, rest))
}

fn heading(
    lines: &[&str],
    start: usize,
    level: usize,
    rest: &str,
    links: &LinkTable<'_>,
    out: &mut Vec<String>,
) -> usize {
    let hashes = "#".repeat(level);
    let Some(task) = parse_org_task(rest) else {
        out.push(format!("{hashes} {}", org_line_to_md(rest, links)));
        return start + 1;
    };

    let checkbox = if task.done { "[x]" } else { "[ ]" };
    let text = org_line_to_md(task.text, links);
    if text.is_empty() {
        out.push(format!("{hashes} - {checkbox}"));
    } else {
        out.push(format!("{hashes} - {checkbox} {text}"));
    }

    let mut meta = TaskMeta {
        priority: task.priority,
        ..TaskMeta::default()
    };
    let mut i = start + 1;
    while let Some(line) = lines.get(i) {
        if !meta.absorb_org(line.trim()) {
            break;
        }
        i += 1;
    }
    meta.push_markdown(out);
    i
}

/// Text of an org comment line (`# text`), trimmed.
fn comment_text(line: &str) -> Option<&str> {
    let t = line.trim_start();
    if t == "#" {
        return Some("");
    }
    t.strip_prefix("# ").map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notebridge_core::IdMap;
    use pretty_assertions::assert_eq;

    fn to_md(text: &str) -> String {
        let ids = IdMap::new();
        convert(text, &LinkTable::new(&ids)).expect("convert")
    }

    #[test]
    fn heading_levels_map_to_hashes() {
        assert_eq!(to_md("* One\n*** Three\n"), "# One\n### Three\n");
    }

    #[test]
    fn bold_text_is_not_a_heading() {
        assert_eq!(to_md("*bold* start"), "*bold* start");
    }

    #[test]
    fn src_block_becomes_fence_and_keeps_links() {
        assert_eq!(
            to_md("#+begin_src rust :tangle yes\nlet x = \"[[id:abc]]\";\n#+end_src"),
            "```rust :tangle yes\nlet x = \"[[id:abc]]\";\n```"
        );
    }

    #[test]
    fn callout_gets_separated_from_next_paragraph() {
        assert_eq!(
            to_md("#+BEGIN_WARNING\nCareful\n\n  indented\n#+END_WARNING\nAfter"),
            "> [!warning]\n> Careful\n>\n>   indented\n\nAfter"
        );
    }

    #[test]
    fn code_inside_a_callout_is_left_alone() {
        let ids = IdMap::from([("abc".to_string(), "Alpha".to_string())]);
        let md = convert(
            "#+BEGIN_NOTE\nSee [[id:abc]]\n#+BEGIN_SRC rust\nlet s = \"[[id:abc]]\";\n\n  * not a heading\n#+END_SRC\n#+END_NOTE",
            &LinkTable::new(&ids),
        )
        .expect("convert");
        assert_eq!(
            md,
            "> [!note]\n> See [[Alpha]]\n> ```rust\n> let s = \"[[id:abc]]\";\n>\n>   * not a heading\n> ```"
        );
    }

    #[test]
    fn block_arguments_ride_in_the_header() {
        assert_eq!(
            to_md("#+BEGIN_EXPORT html\n<b>x</b>\n#+END_EXPORT"),
            "> [!export] html\n> <b>x</b>"
        );
        assert_eq!(
            to_md("#+BEGIN_QUOTE Seneca\nLife is long\n#+END_QUOTE"),
            "> [!quote] Seneca\n> Life is long"
        );
    }

    #[test]
    fn leading_angle_bracket_is_escaped() {
        assert_eq!(to_md("> quoted\nplain\n"), "\\> quoted\nplain\n");
        assert_eq!(to_md("  >> deeper"), "  \\>> deeper");
    }

    #[test]
    fn quote_block_is_a_plain_blockquote() {
        assert_eq!(to_md("#+BEGIN_QUOTE\nWise words\n#+END_QUOTE"), "> Wise words");
    }

    #[test]
    fn comments_embeds_and_clock_lines() {
        assert_eq!(
            to_md("# private\n# EMBED: Other Note\nCLOCK: [2024-01-15 Mon 09:00]--[2024-01-15 Mon 10:00] =>  1:00"),
            "<!-- private -->\n![[Other Note]]\n<!-- CLOCK: [2024-01-15 Mon 09:00]--[2024-01-15 Mon 10:00] =>  1:00 -->"
        );
    }

    #[test]
    fn planning_under_plain_heading_passes_through() {
        assert_eq!(to_md("* Meeting\nSCHEDULED: <2024-01-15>"), "# Meeting\nSCHEDULED: <2024-01-15>");
    }

    #[test]
    fn done_task_with_closed_timestamp() {
        assert_eq!(
            to_md("* DONE Ship it\nCLOSED: [2024-01-16 Tue]\nNotes"),
            "# - [x] Ship it\n✅ 2024-01-16 Tue\nNotes"
        );
    }

    #[test]
    fn crlf_input_is_normalised() {
        assert_eq!(to_md("* A\r\ntext\r\n"), "# A\ntext\n");
    }
}
