//! Host-side stamp resolution.
//!
//! These functions compute, from an [`AliasConfig`], the same stamp parts
//! the generated runtime code computes inside the target bundle. The
//! constants here are also what [`crate::patch::codegen`] embeds, so the
//! two views cannot drift apart.

use crate::config::AliasConfig;

/// Reserved template prefix selecting append mode.
pub const POSTFIX_SCHEME: &str = "postfix:";

/// Providers that route to an upstream vendor named in the model path.
pub const AGGREGATOR_PROVIDERS: [&str; 2] = ["openrouter", "vercel-ai-gateway"];

/// Provider whose API keys are really gateway tokens.
pub const GATEWAY_PROVIDER: &str = "vercel-ai-gateway";

/// Provider whose `token` auth is an OAuth token.
pub const OAUTH_TOKEN_PROVIDER: &str = "anthropic";

/// Provider that runs locally and needs no credentials.
pub const LOCAL_PROVIDER: &str = "lmstudio";

pub const LOCAL_AUTH_LETTER: &str = "L";
pub const UNKNOWN_AUTH_LETTER: &str = "?";

/// Source alias used when the upstream segment is empty.
pub const SOURCE_SENTINEL: &str = "??";

/// Translation of an auth-profile mode into its stamp letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRule {
    pub mode: &'static str,
    pub letter: &'static str,
    /// A provider that gets a different letter for this mode.
    pub exception: Option<(&'static str, &'static str)>,
}

impl AuthRule {
    pub fn letter_for(&self, provider: &str) -> &'static str {
        match self.exception {
            Some((special, letter)) if special == provider => letter,
            _ => self.letter,
        }
    }
}

pub const AUTH_RULES: [AuthRule; 3] = [
    AuthRule {
        mode: "oauth",
        letter: "O",
        exception: None,
    },
    AuthRule {
        mode: "api_key",
        letter: "K",
        exception: Some((GATEWAY_PROVIDER, "T")),
    },
    AuthRule {
        mode: "token",
        letter: "T",
        exception: Some((OAUTH_TOKEN_PROVIDER, "O")),
    },
];

pub fn is_aggregator(provider: &str) -> bool {
    AGGREGATOR_PROVIDERS.contains(&provider)
}

fn truncate_chars(s: &str, len: usize) -> String {
    s.chars().take(len).collect()
}

/// Provider table lookup, else the first `fallback.provider_length` chars.
pub fn provider_alias(aliases: &AliasConfig, provider: &str) -> String {
    match aliases.provider_aliases.get(provider) {
        Some(alias) => alias.clone(),
        None => truncate_chars(provider, aliases.fallback.provider_length),
    }
}

/// Letter used when no auth mode can be resolved.
pub fn default_auth_letter(provider: &str) -> &'static str {
    if provider == LOCAL_PROVIDER {
        LOCAL_AUTH_LETTER
    } else {
        UNKNOWN_AUTH_LETTER
    }
}

/// Resolve the auth letter for `provider` authenticated via `mode`.
///
/// Overrides win, then the built-in translation, then the provider default.
pub fn auth_letter(aliases: &AliasConfig, provider: &str, mode: Option<&str>) -> String {
    let Some(mode) = mode else {
        return default_auth_letter(provider).to_string();
    };

    if let Some(letter) = aliases
        .auth_mode_overrides
        .get(provider)
        .and_then(|modes| modes.get(mode))
        .filter(|letter| !letter.is_empty())
    {
        return letter.clone();
    }

    AUTH_RULES
        .iter()
        .find(|rule| rule.mode == mode)
        .map(|rule| rule.letter_for(provider))
        .unwrap_or_else(|| default_auth_letter(provider))
        .to_string()
}

/// Upstream-source alias for aggregator providers; `None` for direct ones.
pub fn source_alias(aliases: &AliasConfig, provider: &str, raw_model: &str) -> Option<String> {
    if !is_aggregator(provider) {
        return None;
    }
    let segment = raw_model.split('/').next().unwrap_or_default().to_lowercase();
    let alias = match aliases.source_aliases.get(&segment) {
        Some(alias) => alias.clone(),
        None => truncate_chars(&segment, aliases.fallback.source_length),
    };
    Some(if alias.is_empty() {
        SOURCE_SENTINEL.to_string()
    } else {
        alias
    })
}

/// `{provider_alias}{auth_letter}[.{source_alias}]`
pub fn provider_stamp(
    aliases: &AliasConfig,
    provider: &str,
    mode: Option<&str>,
    raw_model: &str,
) -> String {
    let base = provider_alias(aliases, provider);
    let auth = auth_letter(aliases, provider, mode);
    match source_alias(aliases, provider, raw_model) {
        Some(source) => format!("{base}{auth}.{source}"),
        None => format!("{base}{auth}"),
    }
}

/// Lowercase, keep ASCII alphanumerics, truncate.
pub fn fallback_model_alias(model: &str, len: usize) -> String {
    model
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(len)
        .collect()
}

/// Model part of the stamp: last path segment, exact table hit, else the
/// truncated fallback.
pub fn model_stamp(aliases: &AliasConfig, raw_model: &str) -> String {
    let short = raw_model.rsplit('/').next().unwrap_or_default();
    match aliases
        .model_aliases
        .get(short)
        .filter(|alias| !alias.is_empty())
    {
        Some(alias) => alias.clone(),
        None => fallback_model_alias(short, aliases.fallback.model_length),
    }
}

/// First character of the trimmed identity, uppercased.
pub fn identity_initial(identity: &str) -> Option<String> {
    identity
        .trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
}

/// Identity shown in previews when neither a name nor a host name is known.
pub const PREVIEW_IDENTITY: &str = "A";

/// Values substituted into a response-prefix template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StampParts {
    pub provider: String,
    pub model: String,
    pub model_full: String,
    pub identity: String,
}

impl StampParts {
    pub fn resolve(
        aliases: &AliasConfig,
        provider: &str,
        mode: Option<&str>,
        raw_model: &str,
        identity: Option<&str>,
    ) -> Self {
        Self {
            provider: provider_stamp(aliases, provider, mode, raw_model),
            model: model_stamp(aliases, raw_model),
            model_full: format!("{provider}/{raw_model}"),
            identity: identity.and_then(identity_initial).unwrap_or_default(),
        }
    }

    /// Fill an empty identity the way a preview does: the initial of the
    /// first label of `host`, else [`PREVIEW_IDENTITY`].
    pub fn with_preview_identity(mut self, host: Option<&str>) -> Self {
        if self.identity.is_empty() {
            self.identity = host
                .and_then(|h| h.split('.').next())
                .and_then(identity_initial)
                .unwrap_or_else(|| PREVIEW_IDENTITY.to_string());
        }
        self
    }
}

/// Render a template the way the target app renders its response prefix,
/// with the scheme stripped.
pub fn render_template(template: &str, parts: &StampParts) -> String {
    let body = template.strip_prefix(POSTFIX_SCHEME).unwrap_or(template);
    body.replace("{provider}", &parts.provider)
        .replace("{modelfull}", &parts.model_full)
        .replace("{model}", &parts.model)
        .replace("{identityname}", &parts.identity)
}
