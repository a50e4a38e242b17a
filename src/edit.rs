use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// The rewrite primitive: replace the first occurrence of `search` on one line.
///
/// Every call-site fix compiles down to this. The line number comes from the
/// scan report and is trusted as-is; only the literal `search` text is checked
/// at apply time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "LineEdit does nothing until applied"]
pub struct LineEdit {
    /// 1-based line number
    pub line: usize,
    /// Exact text expected on the line
    pub search: String,
    /// Text substituted for the first occurrence of `search`
    pub replacement: String,
}

/// Outcome of a single [`LineEdit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "LineEditResult should be checked for applied/not-found"]
pub enum LineEditResult {
    Applied { line: usize },
    /// The search text is no longer on the line; soft no-op
    NotFound { line: usize },
    /// The report points past the end of the file
    LineOutOfRange { line: usize, line_count: usize },
}

impl LineEditResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, LineEditResult::Applied { .. })
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Path has no parent directory: {0}")]
    NoParent(std::path::PathBuf),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LineEdit {
    pub fn new(line: usize, search: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            line,
            search: search.into(),
            replacement: replacement.into(),
        }
    }

    /// Apply this edit to `lines` in place.
    pub fn apply_to(&self, lines: &mut [String]) -> LineEditResult {
        let line_count = lines.len();
        let Some(target) = self.line.checked_sub(1).and_then(|idx| lines.get_mut(idx)) else {
            return LineEditResult::LineOutOfRange {
                line: self.line,
                line_count,
            };
        };

        match target.find(&self.search) {
            Some(start) => {
                target.replace_range(start..start + self.search.len(), &self.replacement);
                LineEditResult::Applied { line: self.line }
            }
            None => LineEditResult::NotFound { line: self.line },
        }
    }

    /// Apply several edits to one file's lines.
    ///
    /// Edits are applied bottom-to-top (descending line, stable for equal
    /// lines), so no edit ever changes the line a pending edit refers to.
    /// Results are returned in application order.
    pub fn apply_batch(lines: &mut [String], mut edits: Vec<LineEdit>) -> Vec<LineEditResult> {
        edits.sort_by(|a, b| b.line.cmp(&a.line));
        edits.iter().map(|edit| edit.apply_to(lines)).collect()
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full new content lands or the original file is untouched.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    // same directory keeps the rename on one filesystem
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(EditError::NoParent(path.to_path_buf())),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    // keep the original permissions
    if let Ok(metadata) = std::fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
