//! Scan report: the contract between the detector and the rewriter.
//!
//! The rewriter never re-scans source. It trusts the line numbers and call
//! text recorded here, so a report must be regenerated whenever the rule
//! config or the scanned files change.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One flagged call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 1-based line number at scan time
    pub line: usize,
    /// Unsafe method name, e.g. `map`
    pub method: String,
    /// Receiver identifier captured before `.method(`
    pub variable: String,
    /// Trimmed text of the line at scan time
    pub code: String,
}

/// Scan result for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    /// Path relative to the project root, `/`-separated
    pub file: String,
    pub already_protected: bool,
    pub issues_count: usize,
    pub issues: Vec<Finding>,
    /// xxh3 of the scanned text, hex encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Read or decode failure; the file was not scanned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn new(file: impl Into<String>, already_protected: bool, issues: Vec<Finding>) -> Self {
        Self {
            file: file.into(),
            already_protected,
            issues_count: issues.len(),
            issues,
            content_hash: None,
            error: None,
        }
    }

    pub fn failed(file: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            already_protected: false,
            issues_count: 0,
            issues: Vec::new(),
            content_hash: None,
            error: Some(error.into()),
        }
    }

    /// True when the rewriter should touch this file.
    pub fn needs_fix(&self) -> bool {
        self.issues_count > 0 && !self.already_protected
    }
}

/// Aggregate counts over every scanned file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_files: usize,
    pub files_protected: usize,
    pub files_with_issues: usize,
    pub total_issues: usize,
}

impl RunSummary {
    pub fn from_file_reports(reports: &[FileReport]) -> Self {
        reports.iter().fold(Self::default(), |mut summary, report| {
            summary.total_files += 1;
            if report.already_protected {
                summary.files_protected += 1;
            }
            if report.issues_count > 0 {
                summary.files_with_issues += 1;
            }
            summary.total_issues += report.issues_count;
            summary
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

/// The persisted detector output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub summary: RunSummary,
    pub files_with_issues: Vec<FileReport>,
    pub files_protected: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_failed: Vec<FailedFile>,
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to access report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed report {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ScanReport {
    /// Build the report from per-file results, keeping their order.
    pub fn from_file_reports(reports: Vec<FileReport>) -> Self {
        let summary = RunSummary::from_file_reports(&reports);
        let mut files_with_issues = Vec::new();
        let mut files_protected = Vec::new();
        let mut files_failed = Vec::new();

        for report in reports {
            if let Some(error) = &report.error {
                files_failed.push(FailedFile {
                    file: report.file.clone(),
                    error: error.clone(),
                });
                continue;
            }
            if report.already_protected {
                files_protected.push(report.file.clone());
            }
            if report.issues_count > 0 {
                files_with_issues.push(report);
            }
        }

        Self {
            summary,
            files_with_issues,
            files_protected,
            files_failed,
        }
    }

    /// Reports with findings in files that do not import the helpers yet.
    pub fn fix_candidates(&self) -> impl Iterator<Item = &FileReport> {
        self.files_with_issues.iter().filter(|r| r.needs_fix())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ReportError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        let mut json = self.to_json().map_err(|source| ReportError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        json.push('\n');
        fs::write(path, json).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fix candidates ordered by descending issue count, then by path.
    pub fn worklist(&self) -> Vec<&str> {
        let mut candidates: Vec<&FileReport> = self.fix_candidates().collect();
        candidates.sort_by(|a, b| {
            b.issues_count
                .cmp(&a.issues_count)
                .then_with(|| a.file.cmp(&b.file))
        });
        candidates.into_iter().map(|r| r.file.as_str()).collect()
    }

    /// Write the human worklist, one path per line.
    pub fn write_worklist(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        let io_err = |source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut out = fs::File::create(path).map_err(io_err)?;
        for file in self.worklist() {
            writeln!(out, "{file}").map_err(io_err)?;
        }
        Ok(())
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
            code: format!("{variable}.{method}(x => x)"),
        }
    }

    fn sample_reports() -> Vec<FileReport> {
        vec![
            FileReport::new("a.ts", false, vec![finding(1, "map", "items")]),
            FileReport::new(
                "b.ts",
                true,
                vec![finding(2, "filter", "rows"), finding(3, "map", "rows")],
            ),
            FileReport::new("c.ts", true, Vec::new()),
            FileReport::new("d.ts", false, Vec::new()),
            FileReport::new(
                "e.ts",
                false,
                vec![finding(4, "find", "list"), finding(9, "some", "list")],
            ),
            FileReport::failed("f.ts", "stream did not contain valid UTF-8"),
        ]
    }

    #[test]
    fn test_summary_counts() {
        let report = ScanReport::from_file_reports(sample_reports());
        assert_eq!(
            report.summary,
            RunSummary {
                total_files: 6,
                files_protected: 2,
                files_with_issues: 3,
                total_issues: 5,
            }
        );
        assert_eq!(report.files_protected, vec!["b.ts", "c.ts"]);
        assert_eq!(report.files_with_issues.len(), 3);
        assert_eq!(report.files_failed.len(), 1);
    }

    #[test]
    fn test_fix_candidates_exclude_protected() {
        let report = ScanReport::from_file_reports(sample_reports());
        let files: Vec<_> = report.fix_candidates().map(|r| r.file.as_str()).collect();
        assert_eq!(files, vec!["a.ts", "e.ts"]);
    }

    #[test]
    fn test_worklist_sorted_by_issue_count() {
        let report = ScanReport::from_file_reports(sample_reports());
        assert_eq!(report.worklist(), vec!["e.ts", "a.ts"]);
    }

    #[test]
    fn test_json_field_names() {
        let report = ScanReport::from_file_reports(sample_reports());
        let json = report.to_json().unwrap();
        for field in [
            "\"summary\"",
            "\"totalFiles\"",
            "\"filesProtected\"",
            "\"filesWithIssues\"",
            "\"totalIssues\"",
            "\"alreadyProtected\"",
            "\"issuesCount\"",
            "\"filesFailed\"",
        ] {
            assert!(json.contains(field), "missing {field} in {json}");
        }
        assert!(!json.contains("contentHash"));
    }

    #[test]
    fn test_load_accepts_minimal_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        fs::write(
            &path,
            r#"{
  "summary": {"totalFiles": 1, "filesProtected": 0, "filesWithIssues": 1, "totalIssues": 1},
  "filesWithIssues": [
    {"file": "src/a.ts", "alreadyProtected": false, "issuesCount": 1,
     "issues": [{"line": 3, "method": "map", "variable": "items", "code": "items.map(f)"}]}
  ],
  "filesProtected": []
}"#,
        )
        .unwrap();

        let report = ScanReport::load(&path).unwrap();
        assert_eq!(report.files_with_issues[0].issues[0].line, 3);
        assert!(report.files_failed.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = ScanReport::from_file_reports(sample_reports());
        report.save(&path).unwrap();
        assert_eq!(ScanReport::load(&path).unwrap(), report);
    }

    #[test]
    fn test_malformed_report_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        fs::write(&path, "{\"summary\": 3}").unwrap();
        assert!(matches!(
            ScanReport::load(&path),
            Err(ReportError::Json { .. })
        ));
    }

    #[test]
    fn test_missing_report_is_io_error() {
        assert!(matches!(
            ScanReport::load("/nonexistent/report.json"),
            Err(ReportError::Io { .. })
        ));
    }

    #[test]
    fn test_write_worklist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worklist.txt");
        let report = ScanReport::from_file_reports(sample_reports());
        report.write_worklist(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "e.ts\na.ts\n");
    }
}
