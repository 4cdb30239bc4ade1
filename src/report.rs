//! Batch tallies and the text shown when the anchors stop matching.

use crate::apply::{FileOutcome, FileReport};
use crate::commit::CommitOutcome;
use crate::patch::{postfix, PatchKind, PatchStatus, PatchStatuses};
use similar::TextDiff;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Counts for one patch kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindTally {
    pub patched: usize,
    pub already: usize,
    pub no_match: usize,
}

impl KindTally {
    fn bump(&mut self, status: PatchStatus) {
        match status {
            PatchStatus::Patched => self.patched += 1,
            PatchStatus::Already => self.already += 1,
            PatchStatus::NoMatch => self.no_match += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub files: usize,
    pub postfix: KindTally,
    pub identity: KindTally,
    pub modelstamp: KindTally,
    pub syntax_fail: usize,
    pub unvalidated: usize,
    pub errors: usize,
}

impl Summary {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        let mut summary = Summary {
            files: reports.len(),
            ..Summary::default()
        };
        for report in reports {
            if let Some(statuses) = &report.statuses {
                summary.record(statuses);
            }
            match &report.outcome {
                FileOutcome::Committed(CommitOutcome::RolledBack { .. }) => summary.syntax_fail += 1,
                FileOutcome::Committed(CommitOutcome::WrittenUnvalidated { .. }) => {
                    summary.unvalidated += 1
                }
                FileOutcome::Failed { .. } => summary.errors += 1,
                _ => {}
            }
        }
        summary
    }

    fn record(&mut self, statuses: &PatchStatuses) {
        for (kind, status) in statuses.iter() {
            self.tally_mut(kind).bump(status);
        }
    }

    fn tally_mut(&mut self, kind: PatchKind) -> &mut KindTally {
        match kind {
            PatchKind::Postfix => &mut self.postfix,
            PatchKind::IdentityShort => &mut self.identity,
            PatchKind::ModelStamp => &mut self.modelstamp,
        }
    }

    pub fn tally(&self, kind: PatchKind) -> KindTally {
        match kind {
            PatchKind::Postfix => self.postfix,
            PatchKind::IdentityShort => self.identity,
            PatchKind::ModelStamp => self.modelstamp,
        }
    }

    /// No bundle carries the stamp-placement patch, before or after this run.
    pub fn needs_escape_hatch(&self) -> bool {
        self.postfix.patched == 0 && self.postfix.already == 0
    }

    /// `postfix_patched=1, postfix_already=0, ...` in a stable order.
    pub fn counters_line(&self) -> String {
        let mut parts = Vec::new();
        for kind in PatchKind::ALL {
            let tally = self.tally(kind);
            let label = kind.label();
            parts.push(format!("{label}_patched={}", tally.patched));
            parts.push(format!("{label}_already={}", tally.already));
            parts.push(format!("{label}_no_match={}", tally.no_match));
        }
        parts.push(format!("syntax_fail={}", self.syntax_fail));
        parts.join(", ")
    }
}

/// `reply-a.js: postfix=would_patch, idshort=already, modelstamp=no_match`
pub fn dry_run_line(report: &FileReport) -> String {
    match &report.statuses {
        Some(statuses) => {
            let parts: Vec<String> = statuses
                .iter()
                .map(|(kind, status)| format!("{kind}={}", status.dry_run_label()))
                .collect();
            format!("{}: {}", report.file_name(), parts.join(", "))
        }
        None => format!("{}: unreadable", report.file_name()),
    }
}

/// A source line resembling the stamp-placement anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorHint {
    pub file: PathBuf,
    pub line: usize,
    pub similarity: f64,
    pub excerpt: String,
}

const HINT_KEYWORD: &str = "Prefix";
const EXCERPT_LEN: usize = 160;

/// The `limit` lines across `bundles` closest to the stock prepend
/// statement, most similar first.
pub fn nearest_anchors(bundles: &[PathBuf], limit: usize) -> Vec<AnchorHint> {
    let anchor = postfix::ANCHOR;
    let window = anchor.len() * 2;
    let mut hints = Vec::new();

    for bundle in bundles {
        let Ok(text) = fs::read_to_string(bundle) else {
            continue;
        };
        for (idx, line) in text.lines().enumerate() {
            if !line.contains(HINT_KEYWORD) {
                continue;
            }
            let candidate: String = line.trim().chars().take(window).collect();
            let similarity = strsim::normalized_levenshtein(anchor, &candidate);
            hints.push(AnchorHint {
                file: bundle.clone(),
                line: idx + 1,
                similarity,
                excerpt: candidate.chars().take(EXCERPT_LEN).collect(),
            });
        }
    }

    hints.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    hints.truncate(limit);
    hints
}

/// Multi-line report printed when no bundle could take the postfix patch.
pub fn escape_hatch(
    pkg_dir: &Path,
    version: &str,
    families: &BTreeMap<String, Vec<String>>,
    hints: &[AnchorHint],
) -> String {
    let mut out = String::new();
    out.push_str(
        "WARNING: No target bundles accepted the postfix patch. The bundle layout may have changed in this OpenClaw version.\n\n",
    );
    out.push_str(
        "To implement a fresh native patch compatible with your version, give this prompt to your coding assistant:\n\n---\n",
    );
    let _ = writeln!(out, "I'm running OpenClaw {version} installed at {}.", pkg_dir.display());
    out.push_str("The dist/ directory contains these bundle families:\n");
    if families.is_empty() {
        out.push_str("- (no .js bundles found in dist/)\n");
    }
    for (family, files) in families {
        let _ = writeln!(out, "- {family}: {}", files.join(", "));
    }
    out.push_str(
        "\nI need a postfix patch that:\n\
         1. Intercepts outbound Telegram message assembly and appends a model stamp to the end\n\
         2. The stamp format is: {provider_alias}{auth_letter}/{model_alias}@{identity_initial}\n\
         3. Must survive OpenClaw updates (marker-based, idempotent, syntax-validated)\n\
         4. Auth letters: K=api_key, O=oauth/token, T=vercel-gateway, L=local\n\
         5. Provider/model aliases from: ~/.openclaw/postfix-pack.json\n\n\
         Look at the dist/ bundles and find where effectivePrefix is applied to outbound text.\n\
         Patch that location to support postfix: mode (append instead of prepend).\n\
         Also patch createReplyPrefixContext to inject alias-resolved model/provider/auth stamps.\n---\n",
    );

    if !hints.is_empty() {
        out.push_str("\nNearest anchor candidates:\n");
        for hint in hints {
            let name = hint
                .file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  {name}:{} ({:.0}% similar): {}",
                hint.line,
                hint.similarity * 100.0,
                hint.excerpt
            );
        }
    }
    out
}

/// Unified diff of one bundle with a little context.
pub fn unified_diff(name: &str, before: &str, after: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(1)
        .header(&format!("{name} (original)"), &format!("{name} (patched)"))
        .to_string()
}
