use crate::config::schema::{
    Fallback, PackConfig, DEFAULT_AUTH_OVERRIDES, DEFAULT_MODEL_ALIASES, DEFAULT_PROVIDER_ALIASES,
    DEFAULT_RESPONSE_PREFIX_TEMPLATE, DEFAULT_SOURCE_ALIASES,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const STRING_TABLES: [&str; 3] = ["model_aliases", "provider_aliases", "source_aliases"];
const AUTH_TABLE: &str = "auth_mode_overrides";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    NotAnObject {
        path: Option<PathBuf>,
    },
    Invalid {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Json { path: None, source } => ConfigError::Json {
                path: Some(path),
                source,
            },
            ConfigError::NotAnObject { path: None } => ConfigError::NotAnObject { path: Some(path) },
            ConfigError::Invalid { path: None, source } => ConfigError::Invalid {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to access pack config {}: {}", path.display(), source)
            }
            ConfigError::Json { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse pack config JSON ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse pack config JSON: {}", source),
            },
            ConfigError::NotAnObject { path } => match path {
                Some(path) => write!(f, "pack config is not a JSON object: {}", path.display()),
                None => write!(f, "pack config is not a JSON object"),
            },
            ConfigError::Invalid { path, source } => match path {
                Some(path) => write!(f, "invalid pack config ({}): {}", path.display(), source),
                None => write!(f, "invalid pack config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Json { source, .. } => Some(source),
            ConfigError::NotAnObject { .. } => None,
            ConfigError::Invalid { source, .. } => Some(source),
        }
    }
}

/// The built-in defaults as a JSON document, the base of every merge.
pub fn default_document() -> Value {
    let table = |entries: &[(&str, &str)]| -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v)))
                .collect(),
        )
    };

    let mut overrides = Map::new();
    for (provider, mode, letter) in DEFAULT_AUTH_OVERRIDES {
        if let Value::Object(modes) = overrides
            .entry(provider.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
        {
            modes.insert(mode.to_string(), Value::from(*letter));
        }
    }

    let fallback = Fallback::default();
    serde_json::json!({
        "response_prefix_template": DEFAULT_RESPONSE_PREFIX_TEMPLATE,
        "model_aliases": table(DEFAULT_MODEL_ALIASES),
        "provider_aliases": table(DEFAULT_PROVIDER_ALIASES),
        "source_aliases": table(DEFAULT_SOURCE_ALIASES),
        "auth_mode_overrides": Value::Object(overrides),
        "fallback": {
            "provider_length": fallback.provider_length,
            "source_length": fallback.source_length,
            "model_length": fallback.model_length,
        },
    })
}

/// Merge `incoming` over `base`: nested objects merge key-wise, anything
/// else overwrites.
pub fn deep_merge(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, incoming) => *base = incoming,
    }
}

/// Repair a merged document so it deserializes: bad fallback lengths revert
/// to defaults, non-object tables become empty, non-string entries are
/// dropped.
pub fn sanitize(doc: &mut Map<String, Value>) {
    if !doc
        .get("response_prefix_template")
        .is_some_and(Value::is_string)
    {
        doc.insert(
            "response_prefix_template".to_string(),
            Value::from(DEFAULT_RESPONSE_PREFIX_TEMPLATE),
        );
    }

    let defaults = Fallback::default();
    let fallback = doc
        .entry("fallback")
        .or_insert_with(|| Value::Object(Map::new()));
    if !fallback.is_object() {
        tracing::warn!("fallback is not an object; using defaults");
        *fallback = Value::Object(Map::new());
    }
    if let Value::Object(fallback) = fallback {
        for (key, default) in [
            ("provider_length", defaults.provider_length),
            ("source_length", defaults.source_length),
            ("model_length", defaults.model_length),
        ] {
            let valid = fallback
                .get(key)
                .and_then(Value::as_u64)
                .is_some_and(|n| n > 0);
            if !valid {
                if fallback.contains_key(key) {
                    tracing::warn!(key, "invalid fallback length; using default {}", default);
                }
                fallback.insert(key.to_string(), Value::from(default));
            }
        }
    }

    for key in STRING_TABLES {
        with_object(doc, key, |table| retain_strings(table, key));
    }

    with_object(doc, AUTH_TABLE, |overrides| {
        overrides.retain(|provider, modes| match modes {
            Value::Object(modes) => {
                retain_strings(modes, provider);
                true
            }
            _ => {
                tracing::warn!(provider = provider.as_str(), "dropping non-object auth override");
                false
            }
        })
    });
}

/// Run `f` on the object at `key`, replacing a missing or non-object value
/// with an empty object first.
fn with_object<R: Default>(
    doc: &mut Map<String, Value>,
    key: &str,
    f: impl FnOnce(&mut Map<String, Value>) -> R,
) -> R {
    let slot = doc
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        tracing::warn!(key, "table is not an object; resetting to empty");
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => f(map),
        _ => R::default(),
    }
}

fn retain_strings(table: &mut Map<String, Value>, table_name: &str) {
    table.retain(|key, value| {
        let keep = value.is_string();
        if !keep {
            tracing::warn!(table = table_name, key = key.as_str(), "dropping non-string alias");
        }
        keep
    });
}

pub fn load_from_str(input: &str) -> Result<PackConfig, ConfigError> {
    let incoming: Value =
        serde_json::from_str(input).map_err(|source| ConfigError::Json { path: None, source })?;
    load_from_value(incoming)
}

pub fn load_from_value(incoming: Value) -> Result<PackConfig, ConfigError> {
    if !incoming.is_object() {
        return Err(ConfigError::NotAnObject { path: None });
    }

    let mut merged = default_document();
    deep_merge(&mut merged, incoming);
    if let Value::Object(doc) = &mut merged {
        sanitize(doc);
    }

    serde_json::from_value(merged).map_err(|source| ConfigError::Invalid { path: None, source })
}

/// Load the pack config; a missing file yields the built-in defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<PackConfig, ConfigError> {
    let path = path.as_ref();
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "pack config not found; using defaults");
        return Ok(PackConfig::builtin());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Merge `entries` into the file's `model_aliases` object, creating the
/// file if needed. Returns how many keys were added or changed.
pub fn save_model_aliases(
    path: impl AsRef<Path>,
    entries: &BTreeMap<String, String>,
) -> Result<usize, ConfigError> {
    let path = path.as_ref();
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut doc = if path.is_file() {
        let contents = fs::read_to_string(path).map_err(io_err)?;
        serde_json::from_str::<Value>(&contents)
            .map_err(|source| ConfigError::Json { path: None, source }.with_path(path))?
    } else {
        Value::Object(Map::new())
    };

    let Value::Object(root) = &mut doc else {
        return Err(ConfigError::NotAnObject {
            path: Some(path.to_path_buf()),
        });
    };

    let changed = with_object(root, "model_aliases", |table| {
        let mut changed = 0usize;
        for (model, alias) in entries {
            if table.get(model).and_then(Value::as_str) != Some(alias.as_str()) {
                table.insert(model.clone(), Value::from(alias.as_str()));
                changed += 1;
            }
        }
        changed
    });

    if changed == 0 && path.is_file() {
        return Ok(0);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    crate::edit::atomic_write(path, to_pretty_json(&doc).as_bytes()).map_err(io_err)?;
    tracing::info!(path = %path.display(), changed, "saved model aliases");
    Ok(changed)
}

/// Two-space indented JSON with a trailing newline.
pub fn to_pretty_json(doc: &Value) -> String {
    // Serializing a `Value` cannot fail.
    let mut out = serde_json::to_string_pretty(doc).unwrap_or_else(|_| doc.to_string());
    out.push('\n');
    out
}

pub fn expand_tilde(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

fn home_dir() -> PathBuf {
    home::home_dir().unwrap_or_default()
}

/// `$OPENCLAW_HOME`, else `~/.openclaw`.
pub fn openclaw_home() -> PathBuf {
    match std::env::var_os("OPENCLAW_HOME") {
        Some(dir) if !dir.is_empty() => expand_tilde(PathBuf::from(dir)),
        _ => home_dir().join(".openclaw"),
    }
}

pub fn default_config_path() -> PathBuf {
    home_dir().join(".openclaw").join("postfix-pack.json")
}

pub fn default_openclaw_json_path() -> PathBuf {
    openclaw_home().join("openclaw.json")
}
