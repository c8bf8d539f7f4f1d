//! Shell-style exclude patterns, matched with the `glob` crate.
//!
//! Supported syntax: `*` (any run of non-`/` characters), `?` (one non-`/`
//! character), `[abc]`, `[a-z]` and `[!abc]` classes, and `**` as a whole
//! path component for any depth. Metacharacters are matched literally inside
//! brackets (`[*]`).

use glob::{MatchOptions, Pattern};

use crate::error::ConfigError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// One compiled exclude pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: Pattern,
}

impl GlobPattern {
    pub fn compile(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: e.msg.to_string(),
        })?;
        Ok(Self { pattern })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.pattern.matches_with(candidate, MATCH_OPTIONS)
    }
}

/// The full exclusion list from the config.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<GlobPattern>,
}

impl ExcludeSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| GlobPattern::compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// A file is excluded when any pattern matches its tree-relative path
    /// (with `/` separators) or its bare file name.
    pub fn is_excluded(&self, relative: &str, file_name: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches(relative) || p.matches(file_name))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(p: &str) -> GlobPattern {
        GlobPattern::compile(p).expect("compile")
    }

    #[test]
    fn star_does_not_cross_directories() {
        let g = glob("*.org");
        assert!(g.matches("inbox.org"));
        assert!(!g.matches("daily/inbox.org"));
    }

    #[test]
    fn directory_prefix_pattern() {
        let g = glob("drafts/*");
        assert!(g.matches("drafts/idea.md"));
        assert!(!g.matches("notes/drafts/idea.md"));
    }

    #[test]
    fn question_mark_and_classes() {
        assert!(glob("v?.md").matches("v1.md"));
        assert!(glob("[ab]*.md").matches("alpha.md"));
        assert!(!glob("[!ab]*.md").matches("alpha.md"));
        assert!(glob("[0-9]*").matches("2024-01-01.org"));
        assert_eq!(glob("v?.md").as_str(), "v?.md");
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let g = glob("a+b (copy).md");
        assert!(g.matches("a+b (copy).md"));
        assert!(!g.matches("aab (copy).md"));
    }

    #[test]
    fn brackets_make_metacharacters_literal() {
        assert!(glob("draft[*].md").matches("draft*.md"));
        assert!(!glob("draft[*].md").matches("draft1.md"));
    }

    #[test]
    fn double_star_crosses_directories() {
        let g = glob("archive/**/*.md");
        assert!(g.matches("archive/2023/q1/old.md"));
        assert!(!g.matches("notes/old.md"));
    }

    #[test]
    fn hidden_files_match_plain_stars() {
        assert!(glob("*.md").matches(".scratch.md"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        for bad in ["[abc", "a**b"] {
            let err = GlobPattern::compile(bad).unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidGlob { pattern, .. } if pattern == bad),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn exclude_set_matches_relative_or_basename() {
        let set = ExcludeSet::new(&["*.tmp.md", "archive/*"]).expect("set");
        assert!(set.is_excluded("deep/dir/x.tmp.md", "x.tmp.md"));
        assert!(set.is_excluded("archive/old.md", "old.md"));
        assert!(!set.is_excluded("notes/old.md", "old.md"));
    }
}
