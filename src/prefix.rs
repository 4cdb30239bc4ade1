//! Keeps the target app's `responsePrefix` settings on the postfix template.

use crate::config::loader::to_pretty_json;
use crate::edit::atomic_write;
use crate::stamp::POSTFIX_SCHEME;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrefixError {
    #[error("response prefix template is empty")]
    EmptyTemplate,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid {path}: {source}")]
    NotAnObject {
        path: PathBuf,
        #[source]
        source: ShapeError,
    },
}

/// A key that must hold a JSON object holds something else.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected a JSON object at {key}")]
pub struct ShapeError {
    /// Dotted path from the document root.
    pub key: String,
}

/// Trimmed template with the `postfix:` scheme guaranteed.
pub fn ensure_postfix_template(template: &str) -> Result<String, PrefixError> {
    let text = template.trim();
    if text.is_empty() {
        return Err(PrefixError::EmptyTemplate);
    }
    if text.starts_with(POSTFIX_SCHEME) {
        Ok(text.to_string())
    } else {
        Ok(format!("{POSTFIX_SCHEME}{text}"))
    }
}

fn child_object<'d>(
    parent: &'d mut Map<String, Value>,
    key: &str,
    dotted: &str,
) -> Result<&'d mut Map<String, Value>, ShapeError> {
    parent
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| ShapeError {
            key: dotted.to_string(),
        })
}

/// Point `channels.telegram.responsePrefix` and every object account's
/// `responsePrefix` at `template`. Returns the number of keys changed.
///
/// The error names the dotted key that was not an object.
pub fn apply_template(doc: &mut Map<String, Value>, template: &str) -> Result<usize, ShapeError> {
    let channels = child_object(doc, "channels", "channels")?;
    let telegram = child_object(channels, "telegram", "channels.telegram")?;

    let mut changed = 0;
    if telegram.get("responsePrefix").and_then(Value::as_str) != Some(template) {
        telegram.insert("responsePrefix".to_string(), Value::from(template));
        changed += 1;
    }

    if let Some(Value::Object(accounts)) = telegram.get_mut("accounts") {
        for account in accounts.values_mut() {
            let Value::Object(account) = account else {
                continue;
            };
            if account.get("responsePrefix").and_then(Value::as_str) != Some(template) {
                account.insert("responsePrefix".to_string(), Value::from(template));
                changed += 1;
            }
        }
    }

    Ok(changed)
}

pub fn backup_path(backup_dir: &Path, now: DateTime<Utc>) -> PathBuf {
    backup_dir.join(format!(
        "openclaw.json.postfix-pack.{}.bak",
        now.format("%Y%m%d-%H%M%S")
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The app config does not exist; nothing to sync.
    Missing { path: PathBuf },
    /// Check-only run.
    Checked { template: String, changed: usize },
    Written {
        template: String,
        changed: usize,
        backup: PathBuf,
    },
}

impl SyncOutcome {
    /// False when the config is missing or a check found drift.
    pub fn is_in_sync(&self) -> bool {
        match self {
            SyncOutcome::Missing { .. } => false,
            SyncOutcome::Checked { changed, .. } => *changed == 0,
            SyncOutcome::Written { .. } => true,
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PrefixError {
    let path = path.to_path_buf();
    move |source| PrefixError::Io { path, source }
}

/// Rewrite the app config's response prefixes, backing it up first.
pub fn sync_response_prefix(
    path: &Path,
    template: &str,
    check_only: bool,
    backup_dir: &Path,
) -> Result<SyncOutcome, PrefixError> {
    let template = ensure_postfix_template(template)?;

    if !path.is_file() {
        tracing::warn!(path = %path.display(), "openclaw config not found");
        return Ok(SyncOutcome::Missing {
            path: path.to_path_buf(),
        });
    }

    let original = fs::read_to_string(path).map_err(io_error(path))?;
    let mut doc: Value = serde_json::from_str(&original).map_err(|source| PrefixError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let Value::Object(root) = &mut doc else {
        return Err(PrefixError::NotAnObject {
            path: path.to_path_buf(),
            source: ShapeError {
                key: "(root)".to_string(),
            },
        });
    };

    let changed = apply_template(root, &template).map_err(|source| PrefixError::NotAnObject {
        path: path.to_path_buf(),
        source,
    })?;

    if check_only {
        return Ok(SyncOutcome::Checked { template, changed });
    }

    fs::create_dir_all(backup_dir).map_err(io_error(backup_dir))?;
    let backup = backup_path(backup_dir, Utc::now());
    fs::write(&backup, &original).map_err(io_error(&backup))?;

    atomic_write(path, to_pretty_json(&doc).as_bytes()).map_err(io_error(path))?;
    tracing::info!(path = %path.display(), changed, backup = %backup.display(), "synced response prefix");

    Ok(SyncOutcome::Written {
        template,
        changed,
        backup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_ensure_postfix_template() {
        assert_eq!(
            ensure_postfix_template("  {model} ").unwrap(),
            "postfix:{model}"
        );
        assert_eq!(
            ensure_postfix_template("postfix:{model}").unwrap(),
            "postfix:{model}"
        );
        assert!(matches!(
            ensure_postfix_template("   "),
            Err(PrefixError::EmptyTemplate)
        ));
    }

    #[test]
    fn test_apply_template_creates_and_counts() {
        let mut doc = Map::new();
        assert_eq!(apply_template(&mut doc, "postfix:x").unwrap(), 1);
        assert_eq!(
            Value::Object(doc.clone()),
            json!({"channels": {"telegram": {"responsePrefix": "postfix:x"}}})
        );
        assert_eq!(apply_template(&mut doc, "postfix:x").unwrap(), 0);
    }

    #[test]
    fn test_apply_template_updates_object_accounts() {
        let Value::Object(mut doc) = json!({
            "channels": {"telegram": {
                "responsePrefix": "postfix:x",
                "accounts": {"a": {"responsePrefix": "old"}, "b": {}, "c": "token"}
            }}
        }) else {
            unreachable!()
        };
        assert_eq!(apply_template(&mut doc, "postfix:x").unwrap(), 2);
        assert_eq!(doc["channels"]["telegram"]["accounts"]["c"], "token");
        assert_eq!(
            doc["channels"]["telegram"]["accounts"]["b"]["responsePrefix"],
            "postfix:x"
        );
    }

    #[test]
    fn test_apply_template_rejects_non_object_channel() {
        let Value::Object(mut doc) = json!({"channels": {"telegram": true}}) else {
            unreachable!()
        };
        assert_eq!(
            apply_template(&mut doc, "postfix:x").unwrap_err(),
            ShapeError {
                key: "channels.telegram".to_string()
            }
        );

        let Value::Object(mut doc) = json!({"channels": []}) else {
            unreachable!()
        };
        assert_eq!(apply_template(&mut doc, "postfix:x").unwrap_err().key, "channels");
    }

    #[test]
    fn test_sync_reports_typed_shape_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        let original = r#"{"channels": {"telegram": "off"}}"#;
        fs::write(&path, original).unwrap();

        let err = sync_response_prefix(&path, "postfix:x", false, dir.path()).unwrap_err();
        let PrefixError::NotAnObject { source, .. } = &err else {
            panic!("expected a shape error, got {err:?}");
        };
        assert_eq!(source.key, "channels.telegram");
        assert!(err.to_string().contains("openclaw.json"));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_backup_path_uses_utc_stamp() {
        let now = Utc.with_ymd_and_hms(2026, 2, 3, 4, 5, 6).unwrap();
        assert_eq!(
            backup_path(Path::new("/b"), now),
            PathBuf::from("/b/openclaw.json.postfix-pack.20260203-040506.bak")
        );
    }

    #[test]
    fn test_sync_writes_backup_and_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        let original = r#"{"b": 1, "a": {"x": "é"}}"#;
        fs::write(&path, original).unwrap();
        let backups = dir.path().join("backups");

        let outcome = sync_response_prefix(&path, "{model}", false, &backups).unwrap();
        let SyncOutcome::Written {
            template,
            changed,
            backup,
        } = outcome
        else {
            panic!("expected a write, got {outcome:?}");
        };
        assert_eq!(template, "postfix:{model}");
        assert_eq!(changed, 1);
        assert_eq!(fs::read_to_string(backup).unwrap(), original);

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("{\n  \"b\": 1,\n  \"a\""));
        assert!(written.contains("é"));
        assert!(written.ends_with("}\n"));
    }

    #[test]
    fn test_check_only_never_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        fs::write(&path, "{}").unwrap();

        let outcome = sync_response_prefix(&path, "postfix:x", true, dir.path()).unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Checked {
                template: "postfix:x".to_string(),
                changed: 1
            }
        );
        assert!(!outcome.is_in_sync());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let outcome =
            sync_response_prefix(&dir.path().join("none.json"), "x", true, dir.path()).unwrap();
        assert!(matches!(outcome, SyncOutcome::Missing { .. }));
        assert!(!outcome.is_in_sync());
    }
}
