//! Post-write syntax validation.
//!
//! A written bundle is only kept if an external checker accepts it. The
//! default checker is `node --check <path>`; anything implementing
//! [`SyntaxValidator`] (including plain closures) can stand in for it.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Verdict on one written file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid { diagnostic: String },
}

/// The validator itself could not run.
#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("{program} executable not found for syntax validation")]
    NotFound { program: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
}

pub trait SyntaxValidator {
    fn validate(&self, path: &Path) -> Result<Validation, ValidatorError>;
}

impl<F> SyntaxValidator for F
where
    F: Fn(&Path) -> Result<Validation, ValidatorError>,
{
    fn validate(&self, path: &Path) -> Result<Validation, ValidatorError> {
        self(path)
    }
}

/// What to do when the validator cannot be run at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OnValidatorMissing {
    /// Treat as a failed check and roll back.
    #[default]
    Fail,
    /// Keep the write and warn.
    Skip,
}

const NODE_FALLBACKS: [&str; 3] = [
    "/opt/homebrew/bin/node",
    "/usr/local/bin/node",
    "/usr/bin/node",
];

/// `node --check` runner.
#[derive(Debug, Clone)]
pub struct NodeValidator {
    node: Option<PathBuf>,
}

impl NodeValidator {
    /// Find `node` on `PATH`, then in the usual install locations.
    pub fn locate() -> Self {
        let node = crate::discover::which("node").or_else(|| {
            NODE_FALLBACKS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.is_file())
        });
        tracing::debug!(node = ?node, "located syntax validator");
        Self { node }
    }

    pub fn with_program(node: impl Into<PathBuf>) -> Self {
        Self {
            node: Some(node.into()),
        }
    }

    pub fn program(&self) -> Option<&Path> {
        self.node.as_deref()
    }
}

impl SyntaxValidator for NodeValidator {
    fn validate(&self, path: &Path) -> Result<Validation, ValidatorError> {
        let node = self.node.as_ref().ok_or_else(|| ValidatorError::NotFound {
            program: "node".to_string(),
        })?;

        let output = Command::new(node)
            .arg("--check")
            .arg(path)
            .output()
            .map_err(|source| ValidatorError::Spawn {
                program: node.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(Validation::Valid);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let diagnostic = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        Ok(Validation::Invalid { diagnostic })
    }
}
