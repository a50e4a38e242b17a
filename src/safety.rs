use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Keeps the rewriter inside the project root.
///
/// Report paths are plain strings and may have been edited by hand, so every
/// path is resolved and checked before the file is read or written.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Canonical project root
    workspace_root: PathBuf,
    /// Directory names that are never written to (e.g. `node_modules`)
    forbidden_dirs: Vec<String>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside workspace: {path} (workspace: {workspace})")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("Path is in forbidden directory '{forbidden}': {path}")]
    ForbiddenPath { path: PathBuf, forbidden: String },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl WorkspaceGuard {
    /// Create a guard for `workspace_root`, canonicalized to resolve symlinks.
    pub fn new<I, S>(workspace_root: impl AsRef<Path>, forbidden_dirs: I) -> Result<Self, SafetyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let workspace_root = workspace_root.as_ref().canonicalize()?;
        Ok(Self {
            workspace_root,
            forbidden_dirs: forbidden_dirs.into_iter().map(Into::into).collect(),
        })
    }

    /// Check if a path is safe to edit.
    ///
    /// Relative paths are resolved against the workspace root. Returns the
    /// canonical absolute path.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };

        let canonical = absolute.canonicalize()?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        let relative = canonical.strip_prefix(&self.workspace_root).map_err(|_| {
            SafetyError::OutsideWorkspace {
                path: canonical.to_path_buf(),
                workspace: self.workspace_root.clone(),
            }
        })?;

        for component in relative.components() {
            let Component::Normal(name) = component else {
                continue;
            };
            if let Some(forbidden) = self
                .forbidden_dirs
                .iter()
                .find(|dir| name.to_str() == Some(dir.as_str()))
            {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}
