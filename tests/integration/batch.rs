use super::{mock_package, read, DRIFTED_BUNDLE, STOCK_REPLY_BUNDLE};
use postfix_patcher::apply::{run_batch, BatchOptions, FileOutcome};
use postfix_patcher::commit::{CommitOutcome, Committer};
use postfix_patcher::discover::{family_inventory, find_target_bundles, read_target_version};
use postfix_patcher::patch::{PatchEngine, PatchStatus};
use postfix_patcher::report::{self, Summary};
use postfix_patcher::safety::DistGuard;
use postfix_patcher::validate::{OnValidatorMissing, Validation, ValidatorError};
use postfix_patcher::AliasConfig;
use std::path::Path;

fn accept(_: &Path) -> Result<Validation, ValidatorError> {
    Ok(Validation::Valid)
}

fn reject(_: &Path) -> Result<Validation, ValidatorError> {
    Ok(Validation::Invalid {
        diagnostic: "SyntaxError: Unexpected token".to_string(),
    })
}

fn no_node(_: &Path) -> Result<Validation, ValidatorError> {
    Err(ValidatorError::NotFound {
        program: "node".to_string(),
    })
}

#[test]
fn test_discovery_picks_target_families_only() {
    let (_dir, dist) = mock_package(&[
        ("reply-Ab12.js", STOCK_REPLY_BUNDLE),
        ("pi-embedded-Cd34.js", DRIFTED_BUNDLE),
        ("index.js", "export {};\n"),
    ]);

    let bundles = find_target_bundles(&dist).unwrap();
    let names: Vec<_> = bundles
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["pi-embedded-Cd34.js", "reply-Ab12.js"]);

    let families = family_inventory(&dist).unwrap();
    assert_eq!(families.len(), 3);
    assert_eq!(families["reply-*.js"], vec!["reply-Ab12.js"]);
}

#[test]
fn test_batch_writes_then_settles() {
    let (_dir, dist) = mock_package(&[
        ("reply-Ab12.js", STOCK_REPLY_BUNDLE),
        ("pi-embedded-Cd34.js", DRIFTED_BUNDLE),
    ]);
    let bundles = find_target_bundles(&dist).unwrap();
    let engine = PatchEngine::new(&AliasConfig::builtin(), false);
    let committer = Committer::new(&accept, OnValidatorMissing::Fail)
        .with_guard(DistGuard::new(&dist).unwrap());

    let reports = run_batch(&bundles, &engine, Some(&committer), BatchOptions::default());
    let summary = Summary::from_reports(&reports);
    assert_eq!(summary.files, 2);
    assert_eq!(summary.postfix.patched, 1);
    assert_eq!(summary.postfix.no_match, 1);
    assert_eq!(summary.syntax_fail, 0);
    assert!(!summary.needs_escape_hatch());

    // The drifted bundle is untouched, the reply bundle carries all markers
    assert_eq!(read(&dist.join("pi-embedded-Cd34.js")), DRIFTED_BUNDLE);
    let patched = read(&dist.join("reply-Ab12.js"));
    assert!(patched.contains("__POSTFIX_PATCHED__"));
    assert!(patched.contains("__MODELSTAMP_IDSHORT__"));
    assert!(patched.contains("__MODELSTAMP_V3__"));

    let again = run_batch(&bundles, &engine, Some(&committer), BatchOptions::default());
    let reply = again
        .iter()
        .find(|r| r.file_name() == "reply-Ab12.js")
        .unwrap();
    assert_eq!(
        reply.outcome,
        FileOutcome::Committed(CommitOutcome::Unchanged)
    );
    assert!(reply
        .statuses
        .unwrap()
        .iter()
        .all(|(_, status)| status == PatchStatus::Already));
    assert_eq!(read(&dist.join("reply-Ab12.js")), patched);
}

#[test]
fn test_failed_syntax_check_restores_bundle() {
    let (_dir, dist) = mock_package(&[("reply-Ab12.js", STOCK_REPLY_BUNDLE)]);
    let bundles = find_target_bundles(&dist).unwrap();
    let engine = PatchEngine::new(&AliasConfig::builtin(), false);
    let committer = Committer::new(&reject, OnValidatorMissing::Fail);

    let reports = run_batch(&bundles, &engine, Some(&committer), BatchOptions::default());
    assert!(reports[0].is_syntax_failure());
    assert_eq!(read(&bundles[0]), STOCK_REPLY_BUNDLE);

    let summary = Summary::from_reports(&reports);
    assert_eq!(summary.syntax_fail, 1);
    assert!(summary.counters_line().ends_with("syntax_fail=1"));
}

#[test]
fn test_missing_validator_can_be_skipped() {
    let (_dir, dist) = mock_package(&[("reply-Ab12.js", STOCK_REPLY_BUNDLE)]);
    let bundles = find_target_bundles(&dist).unwrap();
    let engine = PatchEngine::new(&AliasConfig::builtin(), false);

    let strict = Committer::new(&no_node, OnValidatorMissing::Fail);
    let reports = run_batch(&bundles, &engine, Some(&strict), BatchOptions::default());
    assert!(reports[0].is_syntax_failure());
    assert_eq!(read(&bundles[0]), STOCK_REPLY_BUNDLE);

    let lenient = Committer::new(&no_node, OnValidatorMissing::Skip);
    let reports = run_batch(&bundles, &engine, Some(&lenient), BatchOptions::default());
    assert!(matches!(
        reports[0].outcome,
        FileOutcome::Committed(CommitOutcome::WrittenUnvalidated { .. })
    ));
    assert_eq!(Summary::from_reports(&reports).unvalidated, 1);
    assert!(read(&bundles[0]).contains("__POSTFIX_PATCHED__"));
}

#[test]
fn test_read_only_batch_captures_diff() {
    let (_dir, dist) = mock_package(&[("reply-Ab12.js", STOCK_REPLY_BUNDLE)]);
    let bundles = find_target_bundles(&dist).unwrap();
    let engine = PatchEngine::new(&AliasConfig::builtin(), false);

    let reports = run_batch(
        &bundles,
        &engine,
        None,
        BatchOptions {
            capture_changes: true,
        },
    );
    assert_eq!(reports[0].outcome, FileOutcome::NotWritten);
    assert_eq!(read(&bundles[0]), STOCK_REPLY_BUNDLE);

    let change = reports[0].change.as_ref().unwrap();
    let diff = report::unified_diff("reply-Ab12.js", &change.before, &change.after);
    assert!(diff.contains("+\t/* __MODELSTAMP_V3__ */"));
    assert_eq!(
        report::dry_run_line(&reports[0]),
        "reply-Ab12.js: postfix=would_patch, idshort=would_patch, modelstamp=would_patch"
    );
}

#[test]
fn test_drifted_package_produces_escape_hatch() {
    let (dir, dist) = mock_package(&[(
        "reply-Ef56.js",
        "const effectivePrefix = opts.responsePrefix;\nsend(`${effectivePrefix} ${text}`);\n",
    )]);
    let bundles = find_target_bundles(&dist).unwrap();
    let engine = PatchEngine::new(&AliasConfig::builtin(), false);

    let reports = run_batch(&bundles, &engine, None, BatchOptions::default());
    let summary = Summary::from_reports(&reports);
    assert!(summary.needs_escape_hatch());

    let version = read_target_version(dir.path());
    assert_eq!(version, "2026.2.9");
    let hints = report::nearest_anchors(&bundles, 5);
    assert_eq!(hints.len(), 2);

    let text = report::escape_hatch(
        dir.path(),
        &version,
        &family_inventory(&dist).unwrap(),
        &hints,
    );
    assert!(text.contains("OpenClaw 2026.2.9"));
    assert!(text.contains("- reply-*.js: reply-Ef56.js"));
    assert!(text.contains("Nearest anchor candidates:"));
}
