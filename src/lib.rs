//! Array Guard: two-phase scanner and codemod for unguarded array calls
//!
//! Finds call sites like `items.map(...)` whose receiver may not be an array
//! at runtime, and rewrites them to null-safe helper calls such as
//! `safeMap(items, ...)`.
//!
//! # Architecture
//!
//! The pipeline is split in two around a persisted report:
//!
//! 1. [`Detector`] scans source text line by line and produces a
//!    [`FileReport`] per file. Reports are collected into a [`ScanReport`].
//! 2. [`Rewriter`] loads a [`ScanReport`] and, for each file that still needs
//!    fixing, injects the helper import and rewrites every recorded call.
//!
//! The report is the only coupling between the two phases, so it can be
//! reviewed or hand-edited before any file is touched.
//!
//! # Safety
//!
//! - Call-site edits are applied bottom-to-top per file
//! - Atomic file writes (tempfile + fsync + rename)
//! - Report paths are confined to the project root
//! - A call that no longer matches is a no-op, never a partial write
//!
//! # Example
//!
//! ```no_run
//! use array_guard::{Detector, RuleConfig, Rewriter, ScanReport};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RuleConfig::default();
//! let root = Path::new("client/src");
//! let files = vec![PathBuf::from("client/src/pages/Home.tsx")];
//!
//! let detector = Detector::new(&config)?;
//! let report = ScanReport::from_file_reports(detector.scan(root, &files));
//! report.save("array-guard-report.json")?;
//!
//! let rewriter = Rewriter::new(config, root)?;
//! let result = rewriter.apply(&ScanReport::load("array-guard-report.json")?);
//! println!("{:?}", result.summary());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detect;
pub mod discover;
pub mod edit;
pub mod report;
pub mod rewrite;
pub mod safety;

// Re-exports
pub use config::{
    load_from_path, load_from_str, load_or_default, ConfigError, MethodRule, RuleConfig,
};
pub use detect::{DetectError, Detector, ExemptionRules, SafeContext, UnsafePattern};
pub use discover::discover_files;
pub use edit::{EditError, LineEdit, LineEditResult};
pub use report::{FileReport, Finding, ReportError, RunSummary, ScanReport};
pub use rewrite::{
    rewrite_source, FileOutcome, FilePlan, RewriteError, RewriteResult, RewriteSummary, Rewriter,
    SkipReason,
};
pub use safety::{SafetyError, WorkspaceGuard};
