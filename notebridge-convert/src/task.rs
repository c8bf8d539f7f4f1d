//! Task headings and their planning metadata.
//!
//! ```text
//! ** TODO [#A] Write tests          ## - [ ] Write tests
//! SCHEDULED: <2024-01-15>     ↔     ⏳ 2024-01-15
//!                                   Priority: high
//! ```
//!
//! Only planning lines in their usual form (`<active>` for SCHEDULED and
//! DEADLINE, `[inactive]` for CLOSED, nothing else on the line) become
//! markdown metadata. Any other planning line is kept as ordinary text.

use std::sync::LazyLock;

use regex::Regex;

static PLANNING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(SCHEDULED|DEADLINE|CLOSED):\s*([<\[])([^>\]]*)([>\]])").expect("static regex")
});

const SCHEDULED_MARK: &str = "⏳";
const DEADLINE_MARK: &str = "📅";
const CLOSED_MARK: &str = "✅";

/// An org heading remainder that starts with `TODO`/`DONE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OrgTask<'a> {
    pub done: bool,
    pub priority: Option<char>,
    pub text: &'a str,
}

/// Parse the part of an org heading after `* `.
pub(crate) fn parse_org_task(rest: &str) -> Option<OrgTask<'_>> {
    let (done, after) = if let Some(after) = keyword(rest, "TODO") {
        (false, after)
    } else if let Some(after) = keyword(rest, "DONE") {
        (true, after)
    } else {
        return None;
    };
    let after = after.trim_start();
    let (priority, text) = match after.as_bytes() {
        [b'[', b'#', code @ (b'A' | b'B' | b'C'), b']', ..] => {
            (Some(*code as char), after[4..].trim_start())
        }
        _ => (None, after),
    };
    Some(OrgTask {
        done,
        priority,
        text,
    })
}

fn keyword<'a>(rest: &'a str, word: &str) -> Option<&'a str> {
    let after = rest.strip_prefix(word)?;
    if after.is_empty() {
        Some(after)
    } else {
        after.strip_prefix(' ')
    }
}

/// `- [ ] text` / `- [x] text` after the markdown heading marker.
/// Returns `(done, text)`.
pub(crate) fn parse_md_checkbox(rest: &str) -> Option<(bool, &str)> {
    let inner = rest.strip_prefix("- [")?;
    let mut chars = inner.chars();
    let done = match chars.next()? {
        ' ' => false,
        'x' | 'X' => true,
        _ => return None,
    };
    let after = chars.as_str().strip_prefix(']')?;
    if after.is_empty() {
        Some((done, after))
    } else {
        after.strip_prefix(' ').map(|text| (done, text))
    }
}

pub(crate) fn priority_word(code: char) -> &'static str {
    match code {
        'A' => "high",
        'B' => "medium",
        _ => "low",
    }
}

fn priority_code(word: &str) -> Option<char> {
    match word.trim().to_ascii_lowercase().as_str() {
        "high" => Some('A'),
        "medium" => Some('B'),
        "low" => Some('C'),
        _ => None,
    }
}

/// Planning timestamps and priority attached to one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TaskMeta {
    pub scheduled: Option<String>,
    pub deadline: Option<String>,
    pub closed: Option<String>,
    pub priority: Option<char>,
}

impl TaskMeta {
    /// Consume one org planning line. Returns `false` for anything else,
    /// including planning lines that could not be rebuilt exactly.
    pub fn absorb_org(&mut self, trimmed: &str) -> bool {
        if !["SCHEDULED:", "DEADLINE:", "CLOSED:"]
            .iter()
            .any(|k| trimmed.starts_with(k))
        {
            return false;
        }
        if !PLANNING.replace_all(trimmed, "").trim().is_empty() {
            return false;
        }

        let mut parsed = TaskMeta::default();
        for caps in PLANNING.captures_iter(trimmed) {
            let (slot, open, close) = match &caps[1] {
                "SCHEDULED" => (&mut parsed.scheduled, "<", ">"),
                "DEADLINE" => (&mut parsed.deadline, "<", ">"),
                _ => (&mut parsed.closed, "[", "]"),
            };
            if slot.is_some() || &caps[2] != open || &caps[4] != close {
                return false;
            }
            *slot = Some(caps[3].trim().to_string());
        }

        let taken = [
            (&self.scheduled, &parsed.scheduled),
            (&self.deadline, &parsed.deadline),
            (&self.closed, &parsed.closed),
        ];
        if taken.iter().any(|(have, new)| have.is_some() && new.is_some()) {
            return false;
        }
        self.scheduled = self.scheduled.take().or(parsed.scheduled);
        self.deadline = self.deadline.take().or(parsed.deadline);
        self.closed = self.closed.take().or(parsed.closed);
        true
    }

    /// Consume one markdown metadata line. An unrecognised priority word
    /// ends the metadata run.
    pub fn absorb_markdown(&mut self, trimmed: &str) -> bool {
        if let Some(date) = trimmed.strip_prefix(SCHEDULED_MARK) {
            self.scheduled = Some(date.trim().to_string());
        } else if let Some(date) = trimmed.strip_prefix(DEADLINE_MARK) {
            self.deadline = Some(date.trim().to_string());
        } else if let Some(date) = trimmed.strip_prefix(CLOSED_MARK) {
            self.closed = Some(date.trim().to_string());
        } else if let Some(word) = trimmed.strip_prefix("Priority:") {
            match priority_code(word) {
                Some(code) => self.priority = Some(code),
                None => return false,
            }
        } else {
            return false;
        }
        true
    }

    pub fn push_markdown(&self, out: &mut Vec<String>) {
        if let Some(date) = &self.scheduled {
            out.push(format!("{SCHEDULED_MARK} {date}"));
        }
        if let Some(date) = &self.deadline {
            out.push(format!("{DEADLINE_MARK} {date}"));
        }
        if let Some(date) = &self.closed {
            out.push(format!("{CLOSED_MARK} {date}"));
        }
        if let Some(code) = self.priority {
            out.push(format!("Priority: {}", priority_word(code)));
        }
    }

    /// Planning lines only; the priority belongs in the heading.
    pub fn push_org(&self, out: &mut Vec<String>) {
        if let Some(date) = &self.scheduled {
            out.push(format!("SCHEDULED: <{date}>"));
        }
        if let Some(date) = &self.deadline {
            out.push(format!("DEADLINE: <{date}>"));
        }
        if let Some(date) = &self.closed {
            out.push(format!("CLOSED: [{date}]"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_task_with_priority() {
        let task = parse_org_task("TODO [#A] Write tests").expect("task");
        assert!(!task.done);
        assert_eq!(task.priority, Some('A'));
        assert_eq!(task.text, "Write tests");
    }

    #[test]
    fn invalid_priority_stays_in_text() {
        let task = parse_org_task("DONE [#Z] Ship").expect("task");
        assert!(task.done);
        assert_eq!(task.priority, None);
        assert_eq!(task.text, "[#Z] Ship");
    }

    #[test]
    fn keyword_must_be_a_whole_word() {
        assert_eq!(parse_org_task("TODOS for today"), None);
        assert_eq!(parse_org_task("Plain heading"), None);
    }

    #[test]
    fn markdown_checkbox_forms() {
        assert_eq!(parse_md_checkbox("- [ ] Write"), Some((false, "Write")));
        assert_eq!(parse_md_checkbox("- [X] Done"), Some((true, "Done")));
        assert_eq!(parse_md_checkbox("- [ ]"), Some((false, "")));
        assert_eq!(parse_md_checkbox("- [?] Odd"), None);
        assert_eq!(parse_md_checkbox("Heading"), None);
    }

    #[test]
    fn several_planning_keywords_on_one_line() {
        let mut meta = TaskMeta::default();
        assert!(meta.absorb_org("SCHEDULED: <2024-01-15 Mon> DEADLINE: <2024-01-20 Sat>"));
        assert!(meta.absorb_org("CLOSED: [2024-01-16 Tue 10:00]"));
        assert!(!meta.absorb_org("Some text"));
        assert_eq!(meta.scheduled.as_deref(), Some("2024-01-15 Mon"));
        assert_eq!(meta.deadline.as_deref(), Some("2024-01-20 Sat"));
        assert_eq!(meta.closed.as_deref(), Some("2024-01-16 Tue 10:00"));
    }

    #[test]
    fn unusual_planning_lines_are_left_alone() {
        let mut meta = TaskMeta::default();
        assert!(!meta.absorb_org("SCHEDULED: [2024-01-15 Mon]"));
        assert!(!meta.absorb_org("DEADLINE: <2024-01-20> call first"));
        assert!(!meta.absorb_org("CLOSED: <2024-01-16>"));
        assert_eq!(meta, TaskMeta::default());

        assert!(meta.absorb_org("SCHEDULED: <2024-01-15>"));
        assert!(!meta.absorb_org("SCHEDULED: <2024-02-01>"));
        assert_eq!(meta.scheduled.as_deref(), Some("2024-01-15"));
    }

    #[test]
    fn unknown_priority_word_stops_metadata() {
        let mut meta = TaskMeta::default();
        assert!(meta.absorb_markdown("⏳ 2024-01-15"));
        assert!(!meta.absorb_markdown("Priority: urgent"));
        assert_eq!(meta.priority, None);
        assert!(meta.absorb_markdown("Priority: Medium"));
        assert_eq!(meta.priority, Some('B'));
    }
}
