//! Integration tests for the pack config: loading, merging and alias saves.

use postfix_patcher::config::{load_from_path, load_from_str, save_model_aliases, PackConfig};
use postfix_patcher::patch::PatchEngine;
use postfix_patcher::stamp::{render_template, StampParts};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_missing_file_yields_builtin() {
    let dir = TempDir::new().unwrap();
    let config = load_from_path(dir.path().join("postfix-pack.json")).unwrap();
    assert_eq!(config, PackConfig::builtin());
}

#[test]
fn test_user_tables_merge_over_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("postfix-pack.json");
    fs::write(
        &path,
        r#"{
  "response_prefix_template": "postfix:{provider}/{model}",
  "model_aliases": { "my-model": "mm" },
  "provider_aliases": { "openrouter": "OR", "broken": 7 },
  "fallback": { "model_length": 4 }
}"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    let builtin = PackConfig::builtin();

    assert_eq!(config.response_prefix_template, "postfix:{provider}/{model}");
    assert_eq!(config.aliases.model_aliases["my-model"], "mm");
    // Defaults survive alongside user entries
    for (model, alias) in &builtin.aliases.model_aliases {
        assert_eq!(&config.aliases.model_aliases[model], alias);
    }
    assert_eq!(config.aliases.provider_aliases["openrouter"], "OR");
    assert!(!config.aliases.provider_aliases.contains_key("broken"));
    assert_eq!(config.aliases.fallback.model_length, 4);
    assert_eq!(
        config.aliases.fallback.provider_length,
        builtin.aliases.fallback.provider_length
    );
}

#[test]
fn test_invalid_json_names_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("postfix-pack.json");
    fs::write(&path, "{ not json").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("postfix-pack.json"));
}

#[test]
fn test_non_object_root_is_rejected() {
    assert!(load_from_str("[1, 2, 3]").is_err());
}

#[test]
fn test_saved_aliases_reach_the_generated_hook() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("postfix-pack.json");

    let entries = BTreeMap::from([("fresh-model-9".to_string(), "fm9".to_string())]);
    assert_eq!(save_model_aliases(&path, &entries).unwrap(), 1);
    assert_eq!(save_model_aliases(&path, &entries).unwrap(), 0);

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.aliases.model_aliases["fresh-model-9"], "fm9");

    let engine = PatchEngine::new(&config.aliases, false);
    assert!(engine.generated().hook.contains("\"fresh-model-9\":\"fm9\""));
}

#[test]
fn test_preview_uses_config_tables() {
    let config = load_from_str(
        r#"{"response_prefix_template": "postfix:{provider}/{model}@{identityname}",
            "model_aliases": {"my-model": "mm"},
            "provider_aliases": {"acme": "ac"}}"#,
    )
    .unwrap();

    let parts = StampParts::resolve(&config.aliases, "acme", Some("api_key"), "my-model", Some("nova"));
    assert_eq!(parts.provider, "acK");
    assert_eq!(parts.model, "mm");
    assert_eq!(parts.model_full, "acme/my-model");
    assert_eq!(parts.identity, "N");
    assert_eq!(
        render_template(&config.response_prefix_template, &parts),
        "acK/mm@N"
    );
}
