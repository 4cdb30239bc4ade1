use std::path::{Path, PathBuf};
use thiserror::Error;

/// Refuses writes that would land outside the target package's `dist/`.
#[derive(Debug, Clone)]
pub struct DistGuard {
    /// Canonical path to the dist directory
    dist_root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside dist: {path} (dist: {dist})")]
    OutsideDist { path: PathBuf, dist: PathBuf },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl DistGuard {
    /// The root is canonicalized so symlinked installs compare correctly.
    pub fn new(dist_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        Ok(Self {
            dist_root: dist_root.as_ref().canonicalize()?,
        })
    }

    /// Check that a path is safe to write, returning its canonical form.
    ///
    /// Call immediately before writing: symlinks are resolved at call time.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dist_root.join(path)
        };

        let canonical = absolute.canonicalize()?;
        if !canonical.starts_with(&self.dist_root) {
            return Err(SafetyError::OutsideDist {
                path: canonical,
                dist: self.dist_root.clone(),
            });
        }
        Ok(canonical)
    }

    pub fn dist_root(&self) -> &Path {
        &self.dist_root
    }
}
