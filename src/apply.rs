//! Batch orchestration: run the engine over every target bundle and commit
//! each one independently.

use crate::commit::{CommitError, CommitOutcome, Committer, TargetFile};
use crate::patch::{PatchEngine, PatchStatuses};
use std::path::{Path, PathBuf};

/// What happened to one file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Read-only run; nothing written.
    NotWritten,
    Committed(CommitOutcome),
    /// Read or write failed; the file is as it was.
    Failed { error: String },
}

/// Before/after text kept for diff display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    /// `None` when the file could not be read.
    pub statuses: Option<PatchStatuses>,
    pub outcome: FileOutcome,
    pub change: Option<TextChange>,
}

impl FileReport {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn is_syntax_failure(&self) -> bool {
        matches!(&self.outcome, FileOutcome::Committed(outcome) if outcome.is_syntax_failure())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Keep before/after text of changed files.
    pub capture_changes: bool,
}

/// Patch each file in order. `committer: None` means read-only.
///
/// A failure on one file is recorded in its report and never stops the
/// batch.
pub fn run_batch(
    files: &[PathBuf],
    engine: &PatchEngine,
    committer: Option<&Committer<'_>>,
    options: BatchOptions,
) -> Vec<FileReport> {
    files
        .iter()
        .map(|path| patch_file(path, engine, committer, options))
        .collect()
}

fn patch_file(
    path: &Path,
    engine: &PatchEngine,
    committer: Option<&Committer<'_>>,
    options: BatchOptions,
) -> FileReport {
    let target = match TargetFile::read(path) {
        Ok(target) => target,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "skipping unreadable bundle");
            return FileReport {
                path: path.to_path_buf(),
                statuses: None,
                outcome: FileOutcome::Failed {
                    error: error.to_string(),
                },
                change: None,
            };
        }
    };

    let output = engine.apply(target.original());
    let change = (options.capture_changes && output.changed).then(|| TextChange {
        before: target.original().to_string(),
        after: output.text.clone(),
    });

    let outcome = match committer {
        None => FileOutcome::NotWritten,
        Some(committer) => match committer.commit(target, &output.text) {
            Ok(outcome) => FileOutcome::Committed(outcome),
            Err(error) => failed(path, error),
        },
    };

    FileReport {
        path: path.to_path_buf(),
        statuses: Some(output.statuses),
        outcome,
        change,
    }
}

fn failed(path: &Path, error: CommitError) -> FileOutcome {
    tracing::warn!(path = %path.display(), %error, "commit failed");
    FileOutcome::Failed {
        error: error.to_string(),
    }
}
