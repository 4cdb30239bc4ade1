//! Whole-file commit: write, validate, roll back on failure.
//!
//! A [`TargetFile`] remembers the exact content it was read with and is
//! consumed by [`Committer::commit`], so each read gets at most one
//! write/validate/rollback cycle.

use crate::edit::{atomic_write, EditVerification};
use crate::safety::{DistGuard, SafetyError};
use crate::validate::{OnValidatorMissing, SyntaxValidator, Validation};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommitError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} changed on disk since it was read")]
    ChangedOnDisk { path: PathBuf },

    #[error("failed to restore {path} after a rejected write: {source}")]
    Rollback {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Unsafe(#[from] SafetyError),
}

/// A bundle read for patching.
#[derive(Debug)]
pub struct TargetFile {
    path: PathBuf,
    original: String,
    fingerprint: EditVerification,
}

impl TargetFile {
    pub fn read(path: impl Into<PathBuf>) -> Result<Self, CommitError> {
        let path = path.into();
        let original = fs::read_to_string(&path).map_err(|source| CommitError::Read {
            path: path.clone(),
            source,
        })?;
        let fingerprint = EditVerification::from_text(&original);
        Ok(Self {
            path,
            original,
            fingerprint,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original(&self) -> &str {
        &self.original
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// New text equals the original; nothing written.
    Unchanged,
    /// Written and accepted by the validator.
    Written,
    /// Written; the validator could not run and the policy is `skip`.
    WrittenUnvalidated { reason: String },
    /// Rejected and restored to the original content.
    RolledBack { diagnostic: String },
}

impl CommitOutcome {
    pub fn is_syntax_failure(&self) -> bool {
        matches!(self, CommitOutcome::RolledBack { .. })
    }
}

pub struct Committer<'v> {
    validator: &'v dyn SyntaxValidator,
    on_missing: OnValidatorMissing,
    guard: Option<DistGuard>,
}

impl<'v> Committer<'v> {
    pub fn new(validator: &'v dyn SyntaxValidator, on_missing: OnValidatorMissing) -> Self {
        Self {
            validator,
            on_missing,
            guard: None,
        }
    }

    /// Only allow writes under `guard`'s dist directory.
    pub fn with_guard(mut self, guard: DistGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn commit(&self, target: TargetFile, new_text: &str) -> Result<CommitOutcome, CommitError> {
        if new_text == target.original {
            return Ok(CommitOutcome::Unchanged);
        }

        let path = match &self.guard {
            Some(guard) => guard.validate_path(&target.path)?,
            None => target.path.clone(),
        };

        let current = fs::read_to_string(&path).map_err(|source| CommitError::Read {
            path: path.clone(),
            source,
        })?;
        if !target.fingerprint.matches(&current) {
            return Err(CommitError::ChangedOnDisk { path });
        }

        atomic_write(&path, new_text.as_bytes()).map_err(|source| CommitError::Write {
            path: path.clone(),
            source,
        })?;

        let diagnostic = match self.validator.validate(&path) {
            Ok(Validation::Valid) => {
                tracing::info!(path = %path.display(), "patched");
                return Ok(CommitOutcome::Written);
            }
            Ok(Validation::Invalid { diagnostic }) => diagnostic,
            Err(error) => match self.on_missing {
                OnValidatorMissing::Skip => {
                    tracing::warn!(path = %path.display(), %error, "syntax validation skipped");
                    return Ok(CommitOutcome::WrittenUnvalidated {
                        reason: error.to_string(),
                    });
                }
                OnValidatorMissing::Fail => error.to_string(),
            },
        };

        atomic_write(&path, target.original.as_bytes())
            .map_err(|source| CommitError::Rollback {
                path: path.clone(),
                source,
            })?;
        tracing::warn!(path = %path.display(), "syntax check failed; reverted file");
        Ok(CommitOutcome::RolledBack { diagnostic })
    }
}
