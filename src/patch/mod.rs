//! The patch engine: three independent marker-guarded patches applied in a
//! fixed order to one in-memory bundle.

pub mod codegen;
pub mod identity;
pub mod matcher;
pub mod modelstamp;
pub mod postfix;

use crate::config::AliasConfig;
use codegen::GeneratedCode;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatchKind {
    /// Append-mode stamp placement.
    Postfix,
    /// Identity initial.
    IdentityShort,
    /// Model/provider/auth stamp.
    ModelStamp,
}

impl PatchKind {
    /// Application order.
    pub const ALL: [PatchKind; 3] = [
        PatchKind::Postfix,
        PatchKind::IdentityShort,
        PatchKind::ModelStamp,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PatchKind::Postfix => "postfix",
            PatchKind::IdentityShort => "idshort",
            PatchKind::ModelStamp => "modelstamp",
        }
    }
}

impl fmt::Display for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one patch on one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchStatus {
    /// Marker found, nothing to do.
    Already,
    /// Replacement applied.
    Patched,
    /// Anchor absent; text untouched.
    NoMatch,
}

impl PatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PatchStatus::Already => "already",
            PatchStatus::Patched => "patched",
            PatchStatus::NoMatch => "no-match",
        }
    }

    /// Wording used when nothing is written.
    pub fn dry_run_label(self) -> &'static str {
        match self {
            PatchStatus::Already => "already",
            PatchStatus::Patched => "would_patch",
            PatchStatus::NoMatch => "no_match",
        }
    }
}

impl fmt::Display for PatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text after one patch, with its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub text: String,
    pub status: PatchStatus,
}

impl Applied {
    pub(crate) fn unchanged(text: &str, status: PatchStatus) -> Self {
        Self {
            text: text.to_string(),
            status,
        }
    }
}

/// One status per patch kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchStatuses {
    pub postfix: PatchStatus,
    pub identity: PatchStatus,
    pub modelstamp: PatchStatus,
}

impl PatchStatuses {
    pub fn get(&self, kind: PatchKind) -> PatchStatus {
        match kind {
            PatchKind::Postfix => self.postfix,
            PatchKind::IdentityShort => self.identity,
            PatchKind::ModelStamp => self.modelstamp,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PatchKind, PatchStatus)> + '_ {
        PatchKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

/// Result of running every patch over one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub text: String,
    pub statuses: PatchStatuses,
    /// `text` differs from the input.
    pub changed: bool,
}

/// Applies the three patches with code generated once from the alias
/// config.
#[derive(Debug, Clone)]
pub struct PatchEngine {
    code: GeneratedCode,
    force_modelstamp: bool,
}

impl PatchEngine {
    pub fn new(aliases: &AliasConfig, force_modelstamp: bool) -> Self {
        Self {
            code: GeneratedCode::new(aliases),
            force_modelstamp,
        }
    }

    pub fn generated(&self) -> &GeneratedCode {
        &self.code
    }

    pub fn apply_one(&self, kind: PatchKind, text: &str) -> Applied {
        match kind {
            PatchKind::Postfix => postfix::apply(text),
            PatchKind::IdentityShort => identity::apply(text),
            PatchKind::ModelStamp => modelstamp::apply(text, &self.code, self.force_modelstamp),
        }
    }

    pub fn apply(&self, text: &str) -> EngineOutput {
        let postfix = self.apply_one(PatchKind::Postfix, text);
        let identity = self.apply_one(PatchKind::IdentityShort, &postfix.text);
        let modelstamp = self.apply_one(PatchKind::ModelStamp, &identity.text);

        tracing::debug!(
            postfix = postfix.status.as_str(),
            idshort = identity.status.as_str(),
            modelstamp = modelstamp.status.as_str(),
            "patch statuses"
        );

        EngineOutput {
            changed: modelstamp.text != text,
            statuses: PatchStatuses {
                postfix: postfix.status,
                identity: identity.status,
                modelstamp: modelstamp.status,
            },
            text: modelstamp.text,
        }
    }
}
