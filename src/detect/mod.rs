//! Detector: line-level scan for unguarded array method calls.
//!
//! For every line and every configured method, each non-overlapping
//! `<identifier>.<method>(` occurrence is a candidate. Candidates whose
//! receiver is exempt (see [`ExemptionRules`]) are dropped; the rest become
//! [`Finding`]s. The detector never touches the files it reads.

pub mod exemption;

pub use exemption::{ExemptionRules, SafeContext};

use crate::config::RuleConfig;
use crate::report::{FileReport, Finding};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace, warn};
use xxhash_rust::xxh3::xxh3_64;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("failed to compile pattern for method '{method}': {source}")]
    Pattern {
        method: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled unsafe-call pattern.
#[derive(Debug, Clone)]
pub struct UnsafePattern {
    pub method: String,
    pub helper: String,
    matcher: Regex,
}

impl UnsafePattern {
    pub fn new(method: &str, helper: &str) -> Result<Self, DetectError> {
        let pattern = format!(r"([A-Za-z_$][A-Za-z0-9_$]*)\.{}\(", regex::escape(method));
        let matcher = Regex::new(&pattern).map_err(|source| DetectError::Pattern {
            method: method.to_string(),
            source,
        })?;
        Ok(Self {
            method: method.to_string(),
            helper: helper.to_string(),
            matcher,
        })
    }

    /// Receivers of every non-overlapping match on `line`, left to right.
    pub fn receivers<'a>(&'a self, line: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.matcher
            .captures_iter(line)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
    }
}

/// Scanner built once per run from an immutable [`RuleConfig`].
#[derive(Debug, Clone)]
pub struct Detector {
    patterns: Vec<UnsafePattern>,
    helpers: Vec<String>,
    exemptions: ExemptionRules,
}

impl Detector {
    pub fn new(config: &RuleConfig) -> Result<Self, DetectError> {
        let patterns = config
            .methods
            .iter()
            .map(|rule| UnsafePattern::new(&rule.method, &rule.helper))
            .collect::<Result<Vec<_>, _>>()?;
        let helpers = config.helper_names().map(str::to_string).collect();
        let exemptions = ExemptionRules::new(config.exemptions.identifiers.iter().cloned());
        Ok(Self {
            patterns,
            helpers,
            exemptions,
        })
    }

    /// Scan `files` in the given order. Paths in the reports are made
    /// relative to `root` where possible.
    ///
    /// A file that cannot be read or decoded gets a report with `error` set;
    /// the remaining files are still scanned.
    pub fn scan(&self, root: &Path, files: &[PathBuf]) -> Vec<FileReport> {
        files
            .iter()
            .map(|path| {
                let file = relative_display(root, path);
                match read_source(path) {
                    Ok(content) => self.scan_source(&file, &content),
                    Err(reason) => {
                        warn!(file = %file, %reason, "skipping unreadable file");
                        FileReport::failed(file, reason)
                    }
                }
            })
            .collect()
    }

    /// Scan already-loaded source text.
    pub fn scan_source(&self, file: &str, content: &str) -> FileReport {
        let mut issues = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            for pattern in &self.patterns {
                for variable in pattern.receivers(line) {
                    if self.exemptions.is_exempt(variable, line) {
                        trace!(file, line = line_no, variable, "exempt receiver");
                        continue;
                    }
                    issues.push(Finding {
                        line: line_no,
                        method: pattern.method.clone(),
                        variable: variable.to_string(),
                        code: line.trim().to_string(),
                    });
                }
            }
        }

        let already_protected = self.is_protected(content);
        debug!(
            file,
            issues = issues.len(),
            already_protected,
            "scanned file"
        );

        let mut report = FileReport::new(file, already_protected, issues);
        report.content_hash = Some(content_hash(content));
        report
    }

    /// Coarse whole-file check: any helper name appearing anywhere counts,
    /// including inside comments or strings.
    pub fn is_protected(&self, content: &str) -> bool {
        self.helpers
            .iter()
            .any(|helper| content.contains(helper.as_str()))
    }
}

/// Hex-encoded xxh3 of `content`, as stored in reports.
pub fn content_hash(content: &str) -> String {
    format!("{:016x}", xxh3_64(content.as_bytes()))
}

fn read_source(path: &Path) -> Result<String, String> {
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {}", e.utf8_error()))
}

fn relative_display(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}
