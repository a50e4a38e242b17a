//! Rewriter: applies a scan report to the source tree.
//!
//! For each report entry with findings in a file that does not import the
//! helpers yet:
//! - every flagged `recv.method(` becomes `helper(recv, `
//! - a helper import is inserted above the first import (or at the top)
//!
//! The rewriter trusts the report's line numbers. Call-site edits are applied
//! bottom-to-top; the import line is inserted after all call-site edits so
//! that it never shifts a recorded line.

pub mod imports;

use crate::config::RuleConfig;
use crate::detect::content_hash;
use crate::edit::{atomic_write, EditError, LineEdit, LineEditResult};
use crate::report::{FileReport, Finding, ScanReport};
use crate::safety::{SafetyError, WorkspaceGuard};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("unsafe path {file}: {source}")]
    Safety {
        file: String,
        #[source]
        source: SafetyError,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid UTF-8", .path.display())]
    Decode { path: PathBuf },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: EditError,
    },
}

/// Result of the pure text transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRewrite {
    pub text: String,
    pub calls_rewritten: usize,
    pub import_added: bool,
}

/// Rewrite `content` according to `findings`.
///
/// Bytes outside the rewritten call prefixes are preserved, including line
/// terminators. Findings whose call text is no longer on the recorded line
/// are ignored.
pub fn rewrite_source(content: &str, findings: &[Finding], config: &RuleConfig) -> SourceRewrite {
    let edits: Vec<LineEdit> = findings
        .iter()
        .filter_map(|finding| match config.helper_for(&finding.method) {
            Some(helper) => Some(call_site_edit(finding, helper)),
            None => {
                warn!(method = %finding.method, line = finding.line, "no helper configured for method");
                None
            }
        })
        .collect();

    if edits.is_empty() {
        return SourceRewrite {
            text: content.to_string(),
            calls_rewritten: 0,
            import_added: false,
        };
    }

    let mut lines: Vec<String> = content.split_inclusive('\n').map(String::from).collect();

    // located before any edit; call-site edits never add or remove lines
    let import = if imports::has_helper_import(content, &config.helper_module) {
        None
    } else {
        let names = imports::required_helpers(findings, config);
        let at = imports::first_import_line(&lines).unwrap_or(0);
        Some((at, imports::import_statement(&names, &config.helper_module)))
    };

    let results = LineEdit::apply_batch(&mut lines, edits);
    for result in &results {
        match result {
            LineEditResult::Applied { .. } => {}
            LineEditResult::NotFound { line } => {
                debug!(line, "call pattern not found, leaving line unchanged");
            }
            LineEditResult::LineOutOfRange { line, line_count } => {
                warn!(line, line_count, "finding points past end of file");
            }
        }
    }
    let calls_rewritten = results.iter().filter(|r| r.is_applied()).count();

    // the import only accompanies at least one rewritten call
    let import = import.filter(|_| calls_rewritten > 0);
    let import_added = import.is_some();
    if let Some((at, statement)) = import {
        let eol = line_ending(content);
        // a leading byte order mark stays the first character of the file
        let bom = match lines.get_mut(at) {
            Some(first) if at == 0 && first.starts_with(BOM) => {
                first.remove(0);
                BOM.to_string()
            }
            _ => String::new(),
        };
        lines.insert(at, format!("{bom}{statement}{eol}"));
    }

    SourceRewrite {
        text: lines.concat(),
        calls_rewritten,
        import_added,
    }
}

const BOM: char = '\u{feff}';

fn call_site_edit(finding: &Finding, helper: &str) -> LineEdit {
    LineEdit::new(
        finding.line,
        format!("{}.{}(", finding.variable, finding.method),
        format!("{}({}, ", helper, finding.variable),
    )
}

fn line_ending(content: &str) -> &'static str {
    match content.find('\n') {
        Some(idx) if content[..idx].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

/// A computed but not yet written rewrite of one file.
#[derive(Debug, Clone)]
pub struct FilePlan {
    pub file: String,
    pub path: PathBuf,
    pub original: String,
    pub rewritten: String,
    pub calls_rewritten: usize,
    pub import_added: bool,
}

impl FilePlan {
    pub fn is_change(&self) -> bool {
        self.original != self.rewritten
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoFindings,
    AlreadyProtected,
    /// Nothing in the file matched the report any more
    NoChange,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoFindings => write!(f, "no findings"),
            SkipReason::AlreadyProtected => write!(f, "already protected"),
            SkipReason::NoChange => write!(f, "no matching call sites"),
        }
    }
}

/// Per-file rewrite outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "FileOutcome should be checked for success/failure"]
pub enum FileOutcome {
    Modified {
        file: String,
        calls_rewritten: usize,
        import_added: bool,
    },
    Skipped { file: String, reason: SkipReason },
    Failed { file: String, reason: String },
}

impl FileOutcome {
    pub fn file(&self) -> &str {
        match self {
            FileOutcome::Modified { file, .. }
            | FileOutcome::Skipped { file, .. }
            | FileOutcome::Failed { file, .. } => file,
        }
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOutcome::Modified {
                file,
                calls_rewritten,
                import_added,
            } => {
                write!(f, "Modified {file} ({calls_rewritten} calls")?;
                if *import_added {
                    write!(f, ", import added")?;
                }
                write!(f, ")")
            }
            FileOutcome::Skipped { file, reason } => write!(f, "Skipped {file}: {reason}"),
            FileOutcome::Failed { file, reason } => write!(f, "Failed on {file}: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    pub modified: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteResult {
    pub outcomes: Vec<FileOutcome>,
}

impl RewriteResult {
    pub fn summary(&self) -> RewriteSummary {
        self.outcomes
            .iter()
            .fold(RewriteSummary::default(), |mut summary, outcome| {
                match outcome {
                    FileOutcome::Modified { .. } => summary.modified += 1,
                    FileOutcome::Skipped { .. } => summary.skipped += 1,
                    FileOutcome::Failed { .. } => summary.failed += 1,
                }
                summary
            })
    }

    pub fn modified_files(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Modified { .. }))
            .map(FileOutcome::file)
    }
}

/// Applies scan reports to files under one project root.
#[derive(Debug, Clone)]
pub struct Rewriter {
    config: RuleConfig,
    guard: WorkspaceGuard,
    dry_run: bool,
}

impl Rewriter {
    pub fn new(config: RuleConfig, project_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let guard = WorkspaceGuard::new(project_root, config.discovery.ignore_dirs.iter().cloned())?;
        Ok(Self {
            config,
            guard,
            dry_run: false,
        })
    }

    /// Compute outcomes without writing any file.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Read the file behind `report` and compute its rewrite.
    pub fn plan_file(&self, report: &FileReport) -> Result<FilePlan, RewriteError> {
        let path = self
            .guard
            .validate_path(&report.file)
            .map_err(|source| RewriteError::Safety {
                file: report.file.clone(),
                source,
            })?;

        let bytes = fs::read(&path).map_err(|source| RewriteError::Read {
            path: path.clone(),
            source,
        })?;
        let original =
            String::from_utf8(bytes).map_err(|_| RewriteError::Decode { path: path.clone() })?;

        if let Some(expected) = &report.content_hash {
            if *expected != content_hash(&original) {
                warn!(file = %report.file, "file changed since scan; trusting report line numbers");
            }
        }

        let rewrite = rewrite_source(&original, &report.issues, &self.config);
        Ok(FilePlan {
            file: report.file.clone(),
            path,
            original,
            rewritten: rewrite.text,
            calls_rewritten: rewrite.calls_rewritten,
            import_added: rewrite.import_added,
        })
    }

    /// Rewrite one file. Returns whether its content changed.
    pub fn fix_file(&self, report: &FileReport) -> Result<bool, RewriteError> {
        let plan = self.plan_file(report)?;
        if !plan.is_change() {
            return Ok(false);
        }
        self.write_plan(&plan)?;
        Ok(true)
    }

    fn write_plan(&self, plan: &FilePlan) -> Result<(), RewriteError> {
        if self.dry_run {
            return Ok(());
        }
        atomic_write(&plan.path, plan.rewritten.as_bytes()).map_err(|source| {
            RewriteError::Write {
                path: plan.path.clone(),
                source,
            }
        })?;
        info!(
            file = %plan.file,
            calls = plan.calls_rewritten,
            import_added = plan.import_added,
            "rewrote file"
        );
        Ok(())
    }

    /// Apply every entry of `report.filesWithIssues`, one file at a time.
    ///
    /// Per-file failures are recorded and do not stop the batch.
    pub fn apply(&self, report: &ScanReport) -> RewriteResult {
        let outcomes = report
            .files_with_issues
            .iter()
            .map(|file_report| self.apply_one(file_report))
            .collect();
        RewriteResult { outcomes }
    }

    fn apply_one(&self, report: &FileReport) -> FileOutcome {
        let file = report.file.clone();
        if report.issues_count == 0 {
            return FileOutcome::Skipped {
                file,
                reason: SkipReason::NoFindings,
            };
        }
        if report.already_protected {
            return FileOutcome::Skipped {
                file,
                reason: SkipReason::AlreadyProtected,
            };
        }

        let plan = match self.plan_file(report) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(file = %file, error = %e, "rewrite failed");
                return FileOutcome::Failed {
                    file,
                    reason: e.to_string(),
                };
            }
        };

        if !plan.is_change() {
            debug!(file = %file, "nothing to rewrite");
            return FileOutcome::Skipped {
                file,
                reason: SkipReason::NoChange,
            };
        }

        if let Err(e) = self.write_plan(&plan) {
            warn!(file = %file, error = %e, "rewrite failed");
            return FileOutcome::Failed {
                file,
                reason: e.to_string(),
            };
        }

        FileOutcome::Modified {
            file,
            calls_rewritten: plan.calls_rewritten,
            import_added: plan.import_added,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(line: usize, method: &str, variable: &str) -> Finding {
        Finding {
            line,
            method: method.to_string(),
            variable: variable.to_string(),
            code: String::new(),
        }
    }

    #[test]
    fn test_rewrite_inserts_import_above_first_import() {
        let source = "\"use client\";\nimport React from \"react\";\n\nconst rows = data.filter(x => x.ok);\n";
        let result = rewrite_source(
            source,
            &[finding(4, "filter", "data")],
            &RuleConfig::default(),
        );
        assert_eq!(
            result.text,
            "\"use client\";\nimport { safeFilter, isEmpty } from \"@/lib/arrayHelpers\";\nimport React from \"react\";\n\nconst rows = safeFilter(data, x => x.ok);\n"
        );
        assert_eq!(result.calls_rewritten, 1);
        assert!(result.import_added);
    }

    #[test]
    fn test_rewrite_without_imports_goes_to_top() {
        let source = "const rows = data.filter(x => x.ok);";
        let result = rewrite_source(
            source,
            &[finding(1, "filter", "data")],
            &RuleConfig::default(),
        );
        assert_eq!(
            result.text,
            "import { safeFilter, isEmpty } from \"@/lib/arrayHelpers\";\nconst rows = safeFilter(data, x => x.ok);"
        );
    }

    #[test]
    fn test_byte_order_mark_stays_first_above_existing_import() {
        let source = "\u{feff}import React from \"react\";\nconst rows = data.filter(x => x.ok);\n";
        let result = rewrite_source(
            source,
            &[finding(2, "filter", "data")],
            &RuleConfig::default(),
        );
        assert!(result.import_added);
        assert_eq!(
            result.text,
            "\u{feff}import { safeFilter, isEmpty } from \"@/lib/arrayHelpers\";\nimport React from \"react\";\nconst rows = safeFilter(data, x => x.ok);\n"
        );
        assert_eq!(result.text.matches('\u{feff}').count(), 1);
    }

    #[test]
    fn test_byte_order_mark_stays_first_without_imports() {
        let source = "\u{feff}const rows = data.filter(x => x.ok);\n";
        let result = rewrite_source(
            source,
            &[finding(1, "filter", "data")],
            &RuleConfig::default(),
        );
        assert_eq!(
            result.text,
            "\u{feff}import { safeFilter, isEmpty } from \"@/lib/arrayHelpers\";\nconst rows = safeFilter(data, x => x.ok);\n"
        );
    }

    #[test]
    fn test_existing_helper_import_is_not_duplicated() {
        let source = "import { safeMap } from \"@/lib/arrayHelpers\";\nitems.filter(f);\n";
        let result = rewrite_source(
            source,
            &[finding(2, "filter", "items")],
            &RuleConfig::default(),
        );
        assert!(!result.import_added);
        assert_eq!(
            result.text,
            "import { safeMap } from \"@/lib/arrayHelpers\";\nsafeFilter(items, f);\n"
        );
    }

    #[test]
    fn test_crlf_preserved() {
        let source = "import a from \"a\";\r\nitems.map(f);\r\n";
        let result = rewrite_source(source, &[finding(2, "map", "items")], &RuleConfig::default());
        assert_eq!(
            result.text,
            "import { safeMap, isEmpty } from \"@/lib/arrayHelpers\";\r\nimport a from \"a\";\r\nsafeMap(items, f);\r\n"
        );
    }

    #[test]
    fn test_two_findings_same_line() {
        let source = "a.map(f).concat(a.map(g));\n";
        let result = rewrite_source(
            source,
            &[finding(1, "map", "a"), finding(1, "map", "a")],
            &RuleConfig::default(),
        );
        assert_eq!(result.calls_rewritten, 2);
        assert!(result.text.ends_with("safeMap(a, f).concat(safeMap(a, g));\n"));
    }

    #[test]
    fn test_unknown_method_is_ignored() {
        let source = "rows.flatMap(f);\n";
        let result = rewrite_source(
            source,
            &[finding(1, "flatMap", "rows")],
            &RuleConfig::default(),
        );
        assert_eq!(result.text, source);
        assert!(!result.import_added);
    }

    #[test]
    fn test_drifted_line_is_left_alone() {
        let source = "rows.length;\n";
        let result = rewrite_source(source, &[finding(1, "map", "rows")], &RuleConfig::default());
        assert_eq!(result.calls_rewritten, 0);
        assert!(!result.import_added);
        assert_eq!(result.text, source);
    }

    #[test]
    fn test_outcome_display() {
        let modified = FileOutcome::Modified {
            file: "a.ts".to_string(),
            calls_rewritten: 2,
            import_added: true,
        };
        assert_eq!(modified.to_string(), "Modified a.ts (2 calls, import added)");
        let skipped = FileOutcome::Skipped {
            file: "b.ts".to_string(),
            reason: SkipReason::AlreadyProtected,
        };
        assert_eq!(skipped.to_string(), "Skipped b.ts: already protected");
    }

    #[test]
    fn test_apply_skips_and_fails_per_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "items.map(f);\n").unwrap();

        let protected = FileReport::new("b.ts", true, vec![finding(1, "map", "x")]);
        let report = ScanReport::from_file_reports(vec![
            FileReport::new("missing.ts", false, vec![finding(1, "map", "x")]),
            FileReport::new("a.ts", false, vec![finding(1, "map", "items")]),
            protected,
        ]);

        let rewriter = Rewriter::new(RuleConfig::default(), dir.path()).unwrap();
        let result = rewriter.apply(&report);
        assert_eq!(
            result.summary(),
            RewriteSummary {
                modified: 1,
                skipped: 1,
                failed: 1
            }
        );
        assert!(matches!(result.outcomes[0], FileOutcome::Failed { .. }));
        assert_eq!(result.modified_files().collect::<Vec<_>>(), vec!["a.ts"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("a.ts")).unwrap(),
            "import { safeMap, isEmpty } from \"@/lib/arrayHelpers\";\nsafeMap(items, f);\n"
        );
    }

    #[test]
    fn test_write_failure_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "items.map(f);\n").unwrap();
        let report = FileReport::new("a.ts", false, vec![finding(1, "map", "items")]);

        let rewriter = Rewriter::new(RuleConfig::default(), dir.path()).unwrap();
        let mut plan = rewriter.plan_file(&report).unwrap();
        // the destination directory disappeared after planning
        plan.path = dir.path().join("gone").join("a.ts");

        let err = rewriter.write_plan(&plan).unwrap_err();
        assert!(matches!(err, RewriteError::Write { .. }));
        assert!(err.to_string().starts_with("failed to write "), "{err}");
        assert_eq!(
            fs::read_to_string(dir.path().join("a.ts")).unwrap(),
            "items.map(f);\n"
        );
    }

    #[test]
    fn test_dry_run_leaves_files_untouched() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "items.map(f);\n").unwrap();
        let report = ScanReport::from_file_reports(vec![FileReport::new(
            "a.ts",
            false,
            vec![finding(1, "map", "items")],
        )]);

        let rewriter = Rewriter::new(RuleConfig::default(), dir.path())
            .unwrap()
            .dry_run(true);
        let result = rewriter.apply(&report);
        assert_eq!(result.summary().modified, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("a.ts")).unwrap(),
            "items.map(f);\n"
        );
    }

    #[test]
    fn test_fix_file_reports_change() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "items.map(f);\n").unwrap();
        let report = FileReport::new("a.ts", false, vec![finding(1, "map", "items")]);

        let rewriter = Rewriter::new(RuleConfig::default(), dir.path()).unwrap();
        assert!(rewriter.fix_file(&report).unwrap());
        // second pass: call already rewritten and import present
        assert!(!rewriter.fix_file(&report).unwrap());
    }
}
