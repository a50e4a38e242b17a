//! Exemption policy for flagged receivers.
//!
//! Two layers: a static set of identifiers that are never arrays-in-doubt
//! (globals, framework bindings), and line-local textual heuristics that
//! recognise a receiver built from a literal on the same line. The heuristics
//! do no data-flow analysis: a variable assigned a literal on another line is
//! still reported.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static ARRAY_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bArray\.from\s*\(").expect("static regex is valid")
});

/// Which safe-context heuristic suppressed a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeContext {
    /// `ident = [` on the same line
    LiteralAssignment,
    /// `Array.from(` on the same line
    ArrayFrom,
    /// `[...ident` on the same line
    LiteralSpread,
}

#[derive(Debug, Clone, Default)]
pub struct ExemptionRules {
    identifiers: HashSet<String>,
}

impl ExemptionRules {
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifiers: identifiers.into_iter().map(Into::into).collect(),
        }
    }

    /// True if `identifier` is in the static exemption set.
    pub fn is_exempt_identifier(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }

    /// Evaluate the line-local heuristics for one occurrence.
    ///
    /// Patterns are built per call; nothing is cached between occurrences.
    pub fn safe_context(&self, line: &str, identifier: &str) -> Option<SafeContext> {
        let ident = regex::escape(identifier);

        let assignment = format!(r"(?:^|[^A-Za-z0-9_$]){ident}\s*=\s*\[");
        if matches_line(&assignment, line) {
            return Some(SafeContext::LiteralAssignment);
        }

        if ARRAY_FROM.is_match(line) {
            return Some(SafeContext::ArrayFrom);
        }

        let spread = format!(r"\[\s*\.\.\.\s*{ident}(?:[^A-Za-z0-9_$]|$)");
        if matches_line(&spread, line) {
            return Some(SafeContext::LiteralSpread);
        }

        None
    }

    /// Combined check: static set first, then the line heuristics.
    pub fn is_exempt(&self, identifier: &str, line: &str) -> bool {
        self.is_exempt_identifier(identifier) || self.safe_context(line, identifier).is_some()
    }
}

fn matches_line(pattern: &str, line: &str) -> bool {
    Regex::new(pattern)
        .map(|re| re.is_match(line))
        .unwrap_or(false)
}
