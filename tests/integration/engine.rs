use super::{DRIFTED_BUNDLE, STOCK_REPLY_BUNDLE};
use postfix_patcher::config::load_from_str;
use postfix_patcher::patch::{identity, postfix, PatchEngine, PatchStatus};
use postfix_patcher::AliasConfig;

const MODELSTAMP_MARKER: &str = "__MODELSTAMP_V3__";

#[test]
fn test_stock_bundle_takes_all_three_patches() {
    let engine = PatchEngine::new(&AliasConfig::builtin(), false);
    let out = engine.apply(STOCK_REPLY_BUNDLE);

    assert!(out.changed);
    assert_eq!(out.statuses.postfix, PatchStatus::Patched);
    assert_eq!(out.statuses.identity, PatchStatus::Patched);
    assert_eq!(out.statuses.modelstamp, PatchStatus::Patched);

    assert!(out.text.contains(postfix::MARKER));
    assert!(out.text.contains(identity::MARKER));
    assert!(out.text.contains(MODELSTAMP_MARKER));
    assert!(!out.text.contains(postfix::ANCHOR));
    assert!(!out.text.contains(identity::ANCHOR));

    // Surrounding code is preserved
    assert!(out.text.starts_with("import { resolveIdentityName"));
    assert!(out.text.contains("return { ...payload, text };"));
    assert!(out
        .text
        .ends_with("export { createReplyPrefixContext, normalizeReplyPayload };\n"));
}

#[test]
fn test_second_run_reports_already_and_changes_nothing() {
    let engine = PatchEngine::new(&AliasConfig::builtin(), false);
    let first = engine.apply(STOCK_REPLY_BUNDLE);
    let second = engine.apply(&first.text);

    assert!(!second.changed);
    assert_eq!(second.text, first.text);
    assert!(second
        .statuses
        .iter()
        .all(|(_, status)| status == PatchStatus::Already));
}

#[test]
fn test_forced_modelstamp_repatch_is_stable() {
    let engine = PatchEngine::new(&AliasConfig::builtin(), false);
    let forced = PatchEngine::new(&AliasConfig::builtin(), true);

    let patched = engine.apply(STOCK_REPLY_BUNDLE).text;
    let once = forced.apply(&patched);
    let twice = forced.apply(&once.text);

    assert_eq!(once.text, patched);
    assert_eq!(twice.text, patched);
    assert_eq!(once.text.matches("let __rawProvider, __rawModel;").count(), 1);
    assert_eq!(once.text.matches("const __MODEL_ALIAS_MAP").count(), 1);
}

#[test]
fn test_forced_repatch_embeds_updated_aliases() {
    let patched = PatchEngine::new(&AliasConfig::builtin(), false)
        .apply(STOCK_REPLY_BUNDLE)
        .text;

    let config = load_from_str(r#"{"model_aliases": {"brand-new-model": "bnm"}}"#).unwrap();
    let out = PatchEngine::new(&config.aliases, true).apply(&patched);

    assert_eq!(out.statuses.modelstamp, PatchStatus::Patched);
    assert!(out.text.contains("\"brand-new-model\":\"bnm\""));
    assert_eq!(out.text.matches(MODELSTAMP_MARKER).count(), 1);
}

#[test]
fn test_drifted_bundle_is_left_byte_identical() {
    let engine = PatchEngine::new(&AliasConfig::builtin(), false);
    let out = engine.apply(DRIFTED_BUNDLE);

    assert!(!out.changed);
    assert_eq!(out.text, DRIFTED_BUNDLE);
    assert!(out
        .statuses
        .iter()
        .all(|(_, status)| status == PatchStatus::NoMatch));
}

#[test]
fn test_partial_bundle_patches_only_present_sites() {
    let src = format!(
        "function deliver(text, effectivePrefix) {{\n\t{}\n\treturn text;\n}}\n",
        postfix::ANCHOR
    );
    let engine = PatchEngine::new(&AliasConfig::builtin(), false);
    let out = engine.apply(&src);

    assert_eq!(out.statuses.postfix, PatchStatus::Patched);
    assert_eq!(out.statuses.identity, PatchStatus::NoMatch);
    assert_eq!(out.statuses.modelstamp, PatchStatus::NoMatch);
    assert!(out.text.contains(postfix::replacement()));
}
