//! The rule pattern language: `*` matches any sequence of characters,
//! everything else is literal.

use regex::Regex;

/// A compiled rule pattern.
///
/// Runs of consecutive `*` collapse into a single wildcard before
/// compilation, so no pattern can trigger catastrophic backtracking.
/// Matching is anchored, case-sensitive, and whitespace-sensitive.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&translate(pattern))?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written in the rule file.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whole-string match against a reconstructed simple command.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

/// Translate a rule pattern into an anchored regex. `(?s)` lets the
/// wildcard cross newlines in multi-line commands.
fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)\\A");
    let mut in_star_run = false;
    for ch in pattern.chars() {
        if ch == '*' {
            if !in_star_run {
                out.push_str(".*");
                in_star_run = true;
            }
        } else {
            in_star_run = false;
            let mut buf = [0u8; 4];
            out.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
        }
    }
    out.push_str("\\z");
    out
}
