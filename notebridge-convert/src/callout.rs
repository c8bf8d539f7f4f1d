//! Callout families shared by org special blocks and markdown callouts.
//!
//! Org writes `#+BEGIN_WARNING … #+END_WARNING`; Obsidian writes
//! `> [!warning]`. Several Obsidian names are aliases of one family
//! (`hint` and `important` are both tips), so markdown → org always emits the
//! canonical family name.

/// Canonical callout families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalloutFamily {
    Note,
    Abstract,
    Info,
    Todo,
    Tip,
    Success,
    Question,
    Warning,
    Failure,
    Danger,
    Bug,
    Example,
    Quote,
}

/// Every recognised name, lowercased, with the family it belongs to.
const ALIASES: &[(&str, CalloutFamily)] = &[
    ("note", CalloutFamily::Note),
    ("abstract", CalloutFamily::Abstract),
    ("summary", CalloutFamily::Abstract),
    ("tldr", CalloutFamily::Abstract),
    ("info", CalloutFamily::Info),
    ("todo", CalloutFamily::Todo),
    ("tip", CalloutFamily::Tip),
    ("hint", CalloutFamily::Tip),
    ("important", CalloutFamily::Tip),
    ("success", CalloutFamily::Success),
    ("check", CalloutFamily::Success),
    ("done", CalloutFamily::Success),
    ("question", CalloutFamily::Question),
    ("help", CalloutFamily::Question),
    ("faq", CalloutFamily::Question),
    ("warning", CalloutFamily::Warning),
    ("caution", CalloutFamily::Warning),
    ("attention", CalloutFamily::Warning),
    ("failure", CalloutFamily::Failure),
    ("fail", CalloutFamily::Failure),
    ("missing", CalloutFamily::Failure),
    ("danger", CalloutFamily::Danger),
    ("error", CalloutFamily::Danger),
    ("bug", CalloutFamily::Bug),
    ("example", CalloutFamily::Example),
    ("quote", CalloutFamily::Quote),
    ("cite", CalloutFamily::Quote),
];

impl CalloutFamily {
    /// Lowercase canonical name, as written in `> [!name]`.
    pub fn name(self) -> &'static str {
        match self {
            CalloutFamily::Note => "note",
            CalloutFamily::Abstract => "abstract",
            CalloutFamily::Info => "info",
            CalloutFamily::Todo => "todo",
            CalloutFamily::Tip => "tip",
            CalloutFamily::Success => "success",
            CalloutFamily::Question => "question",
            CalloutFamily::Warning => "warning",
            CalloutFamily::Failure => "failure",
            CalloutFamily::Danger => "danger",
            CalloutFamily::Bug => "bug",
            CalloutFamily::Example => "example",
            CalloutFamily::Quote => "quote",
        }
    }

    /// Case-insensitive alias lookup.
    pub fn from_alias(alias: &str) -> Option<Self> {
        let lower = alias.trim().to_ascii_lowercase();
        ALIASES
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, family)| *family)
    }
}

/// What an org special block / markdown blockquote turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Plain quotation: `#+BEGIN_QUOTE` or an ordinary `>` blockquote.
    Quote,
    Callout(CalloutFamily),
    /// A block name nobody knows about; carried through under its own name.
    Custom(String),
}

impl BlockKind {
    /// Classify a block or callout name from either dialect.
    pub fn from_name(name: &str) -> Self {
        match CalloutFamily::from_alias(name) {
            Some(CalloutFamily::Quote) => BlockKind::Quote,
            Some(family) => BlockKind::Callout(family),
            None => BlockKind::Custom(name.trim().to_ascii_lowercase()),
        }
    }

    /// Uppercase name used in `#+BEGIN_<NAME>`.
    pub fn org_name(&self) -> String {
        match self {
            BlockKind::Quote => "QUOTE".to_string(),
            BlockKind::Callout(family) => family.name().to_ascii_uppercase(),
            BlockKind::Custom(name) => name.to_ascii_uppercase(),
        }
    }

    /// `> [!tag] args` header for this block, or `None` for a plain
    /// blockquote. A quote block only needs a header to carry arguments.
    pub fn callout_header(&self, args: &str) -> Option<String> {
        let tag = match self {
            BlockKind::Quote if args.is_empty() => return None,
            BlockKind::Quote => CalloutFamily::Quote.name(),
            BlockKind::Callout(family) => family.name(),
            BlockKind::Custom(name) => name.as_str(),
        };
        Some(if args.is_empty() {
            format!("> [!{tag}]")
        } else {
            format!("> [!{tag}] {args}")
        })
    }

    /// Whether the text after `[!tag]` is a display title. For quotes and
    /// custom blocks it holds the `#+BEGIN_` arguments instead.
    pub fn header_is_title(&self) -> bool {
        matches!(self, BlockKind::Callout(_))
    }
}
