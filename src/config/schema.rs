use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_RESPONSE_PREFIX_TEMPLATE: &str = "postfix:{provider}/{model}@{identityname}";

pub const DEFAULT_PROVIDER_FALLBACK_LEN: usize = 2;
pub const DEFAULT_SOURCE_FALLBACK_LEN: usize = 2;
pub const DEFAULT_MODEL_FALLBACK_LEN: usize = 12;

pub const DEFAULT_MODEL_ALIASES: &[(&str, &str)] = &[
    ("claude-opus-4-6", "o46"),
    ("claude-sonnet-4-6", "s46-1m"),
    ("claude-sonnet-4-5", "s45"),
    ("claude-haiku-4-5", "h45"),
    ("gpt-5.3-codex", "53c"),
    ("gpt-5.2-codex", "52c"),
    ("gpt-5.2", "52"),
    ("minimax-m2.5", "m25"),
    ("glm-5", "g5"),
    ("kimi-k2.5", "k25"),
    ("grok-4-1-fast", "g41f"),
    ("grok-4-1-fast-reasoning", "g41fr"),
];

pub const DEFAULT_PROVIDER_ALIASES: &[(&str, &str)] = &[
    ("anthropic", "an"),
    ("openrouter", "or"),
    ("openai-codex", "oc"),
    ("openai", "oa"),
    ("vercel-ai-gateway", "ve"),
    ("opencode", "op"),
    ("xai", "xa"),
    ("lmstudio", "lm"),
];

pub const DEFAULT_SOURCE_ALIASES: &[(&str, &str)] = &[
    ("openai", "oa"),
    ("anthropic", "an"),
    ("minimax", "mm"),
    ("mistral", "ms"),
    ("deepseek", "ds"),
    ("google", "gg"),
    ("meta-llama", "ml"),
    ("moonshotai", "mo"),
    ("z-ai", "za"),
    ("zai", "za"),
    ("xai", "xa"),
];

/// `(provider, auth mode, letter)`
pub const DEFAULT_AUTH_OVERRIDES: &[(&str, &str, &str)] = &[
    ("anthropic", "token", "O"),
    ("vercel-ai-gateway", "api_key", "T"),
];

/// Lengths used to truncate identifiers that miss their alias table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fallback {
    pub provider_length: usize,
    pub source_length: usize,
    pub model_length: usize,
}

impl Default for Fallback {
    fn default() -> Self {
        Self {
            provider_length: DEFAULT_PROVIDER_FALLBACK_LEN,
            source_length: DEFAULT_SOURCE_FALLBACK_LEN,
            model_length: DEFAULT_MODEL_FALLBACK_LEN,
        }
    }
}

/// The four alias tables plus fallback lengths.
///
/// Built once per run and shared read-only by the patch engine and the
/// host-side stamp resolver. `BTreeMap` keeps serialized output sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasConfig {
    #[serde(default)]
    pub model_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub provider_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub source_aliases: BTreeMap<String, String>,
    /// provider -> auth mode -> letter
    #[serde(default)]
    pub auth_mode_overrides: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub fallback: Fallback,
}

impl AliasConfig {
    pub fn builtin() -> Self {
        let mut auth_mode_overrides: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (provider, mode, letter) in DEFAULT_AUTH_OVERRIDES {
            auth_mode_overrides
                .entry(provider.to_string())
                .or_default()
                .insert(mode.to_string(), letter.to_string());
        }

        Self {
            model_aliases: owned_table(DEFAULT_MODEL_ALIASES),
            provider_aliases: owned_table(DEFAULT_PROVIDER_ALIASES),
            source_aliases: owned_table(DEFAULT_SOURCE_ALIASES),
            auth_mode_overrides,
            fallback: Fallback::default(),
        }
    }

    /// Every alias value across the model, provider and source tables.
    pub fn used_aliases(&self) -> impl Iterator<Item = &str> {
        self.model_aliases
            .values()
            .chain(self.provider_aliases.values())
            .chain(self.source_aliases.values())
            .map(String::as_str)
    }
}

/// Everything read from the pack config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackConfig {
    #[serde(default = "default_template")]
    pub response_prefix_template: String,
    #[serde(flatten)]
    pub aliases: AliasConfig,
}

impl PackConfig {
    pub fn builtin() -> Self {
        Self {
            response_prefix_template: default_template(),
            aliases: AliasConfig::builtin(),
        }
    }
}

impl Default for PackConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

fn default_template() -> String {
    DEFAULT_RESPONSE_PREFIX_TEMPLATE.to_string()
}

pub(crate) fn owned_table(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables() {
        let config = AliasConfig::builtin();
        assert_eq!(config.model_aliases["claude-sonnet-4-6"], "s46-1m");
        assert_eq!(config.provider_aliases["vercel-ai-gateway"], "ve");
        assert_eq!(config.source_aliases["zai"], "za");
        assert_eq!(config.auth_mode_overrides["anthropic"]["token"], "O");
        assert_eq!(config.fallback, Fallback::default());
    }

    #[test]
    fn test_used_aliases_spans_tables() {
        let config = AliasConfig::builtin();
        let used: Vec<&str> = config.used_aliases().collect();
        assert!(used.contains(&"o46"));
        assert!(used.contains(&"lm"));
        assert!(used.contains(&"ml"));
    }

    #[test]
    fn test_pack_config_flattens_aliases() {
        let value = serde_json::json!({
            "response_prefix_template": "postfix:{model}",
            "model_aliases": { "glm-5": "g5" },
            "fallback": { "provider_length": 3, "source_length": 2, "model_length": 8 }
        });
        let config: PackConfig = serde_json::from_value(value).unwrap();
        assert_eq!(config.response_prefix_template, "postfix:{model}");
        assert_eq!(config.aliases.model_aliases["glm-5"], "g5");
        assert!(config.aliases.provider_aliases.is_empty());
        assert_eq!(config.aliases.fallback.provider_length, 3);
    }
}
