//! Replacement source for the model/provider stamp patch.
//!
//! Only data is serialized here: the alias tables and fallback lengths go
//! in as compact JSON with sorted keys, and the auth/source constants come
//! from [`crate::stamp`].

use crate::config::AliasConfig;
use crate::stamp::{
    AGGREGATOR_PROVIDERS, AUTH_RULES, LOCAL_AUTH_LETTER, LOCAL_PROVIDER, SOURCE_SENTINEL,
    UNKNOWN_AUTH_LETTER,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const MARKER: &str = "__MODELSTAMP_V3__";

/// Present only when the auth-profile store probe is guarded.
pub const SAFE_STORE_GUARD: &str =
    "typeof resolveAgentDir === \"function\" && typeof ensureAuthProfileStore === \"function\"";

/// Present only when the local profile fallback is in place.
pub const SAFE_PROFILE_LOOKUP: &str = "const __profiles = cfg?.auth?.profiles;";

/// Source for both replaced sites, generated once per config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    /// Declarations plus the `onModelSelected` hook.
    pub hook: String,
    /// The `responsePrefixContextProvider` property.
    pub provider_context: String,
}

impl GeneratedCode {
    pub fn new(aliases: &AliasConfig) -> Self {
        Self {
            hook: hook_source(aliases),
            provider_context: provider_context_source(),
        }
    }
}

fn js_table(table: &BTreeMap<String, String>) -> Value {
    Value::Object(
        table
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect(),
    )
}

fn js_nested_table(table: &BTreeMap<String, BTreeMap<String, String>>) -> Value {
    Value::Object(
        table
            .iter()
            .map(|(k, inner)| (k.clone(), js_table(inner)))
            .collect(),
    )
}

fn js_string(s: &str) -> String {
    Value::from(s).to_string()
}

fn hook_source(aliases: &AliasConfig) -> String {
    let fallback = &aliases.fallback;
    let declarations = [
        ("__MODEL_ALIAS_MAP", js_table(&aliases.model_aliases).to_string()),
        ("__MODEL_FALLBACK_LEN", fallback.model_length.to_string()),
        ("__PROVIDER_ALIAS_MAP", js_table(&aliases.provider_aliases).to_string()),
        ("__SOURCE_ALIAS_MAP", js_table(&aliases.source_aliases).to_string()),
        ("__AUTH_OVERRIDES", js_nested_table(&aliases.auth_mode_overrides).to_string()),
        ("__PROVIDER_FALLBACK_LEN", fallback.provider_length.to_string()),
        ("__SOURCE_FALLBACK_LEN", fallback.source_length.to_string()),
    ];

    let mut out = String::from("\tlet __rawProvider, __rawModel;\n");
    for (name, value) in declarations {
        let _ = writeln!(out, "\tconst {name} = {value};");
    }
    out.push_str("\tconst onModelSelected = (ctx) => {\n");
    let _ = writeln!(
        out,
        "\t/* {MARKER} */ __rawProvider = ctx.provider; __rawModel = ctx.model;"
    );
    out.push_str(
        "\tconst __m0 = extractShortModelName(ctx.model);\n\
         \tlet __ms = __MODEL_ALIAS_MAP[__m0];\n\
         \tif (!__ms) __ms = __m0.toLowerCase().replace(/[^a-z0-9]+/g, \"\").slice(0, __MODEL_FALLBACK_LEN);\n\
         \tprefixContext.model = __ms;\n\
         \tprefixContext.modelFull = `${ctx.provider}/${ctx.model}`;\n\
         \tprefixContext.thinkingLevel = ctx.thinkLevel ?? \"off\";\n\
         \t};",
    );
    out
}

/// `if`/`else if` chain translating `mode_var` into `__auth`.
fn auth_translation(mode_var: &str, indent: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{indent}const __override = __AUTH_OVERRIDES?.[__rawProvider]?.[{mode_var}];"
    );
    let _ = writeln!(out, "{indent}if (__override) __auth = __override;");
    for rule in AUTH_RULES {
        let letter = match rule.exception {
            Some((provider, special)) => format!(
                "(__rawProvider === {} ? {} : {})",
                js_string(provider),
                js_string(special),
                js_string(rule.letter)
            ),
            None => js_string(rule.letter),
        };
        let _ = writeln!(
            out,
            "{indent}else if ({mode_var} === {}) __auth = {letter};",
            js_string(rule.mode)
        );
    }
    out
}

fn provider_context_source() -> String {
    let aggregator_test = AGGREGATOR_PROVIDERS
        .iter()
        .map(|p| format!("__rawProvider === {}", js_string(p)))
        .collect::<Vec<_>>()
        .join(" || ");

    let mut out = String::from("responsePrefixContextProvider: () => {\n\tif (__rawProvider) {\n");
    out.push_str(
        "\t\tconst __base = (__PROVIDER_ALIAS_MAP[__rawProvider] ?? __rawProvider.slice(0, __PROVIDER_FALLBACK_LEN));\n",
    );
    let _ = writeln!(
        out,
        "\t\tlet __auth = __rawProvider === {} ? {} : {};",
        js_string(LOCAL_PROVIDER),
        js_string(LOCAL_AUTH_LETTER),
        js_string(UNKNOWN_AUTH_LETTER)
    );
    out.push_str("\t\ttry {\n");
    let _ = writeln!(out, "\t\t\tif ({SAFE_STORE_GUARD}) {{");
    out.push_str(
        "\t\t\t\tconst __adir = resolveAgentDir(cfg, agentId);\n\
         \t\t\t\tif (__adir) {\n\
         \t\t\t\t\tconst __store = ensureAuthProfileStore(__adir, { allowKeychainPrompt: false });\n\
         \t\t\t\t\tconst __pid = __store.lastGood?.[__rawProvider];\n\
         \t\t\t\t\tconst __ptype = __pid ? __store.profiles?.[__pid]?.type : void 0;\n",
    );
    out.push_str(&auth_translation("__ptype", "\t\t\t\t\t"));
    out.push_str("\t\t\t\t}\n\t\t\t}\n");
    let _ = writeln!(
        out,
        "\t\t\tif (__auth === {}) {{",
        js_string(UNKNOWN_AUTH_LETTER)
    );
    let _ = writeln!(out, "\t\t\t\t{SAFE_PROFILE_LOOKUP}");
    out.push_str(
        "\t\t\t\tconst __defaultId = `${__rawProvider}:default`;\n\
         \t\t\t\tconst __entry = __profiles?.[__defaultId] ?? Object.values(__profiles ?? {}).find((p) => p?.provider === __rawProvider);\n\
         \t\t\t\tconst __mode = __entry?.mode;\n",
    );
    out.push_str(&auth_translation("__mode", "\t\t\t\t"));
    out.push_str("\t\t\t}\n\t\t} catch {}\n");
    out.push_str("\t\tlet __src = null;\n");
    let _ = writeln!(out, "\t\tif ({aggregator_test}) {{");
    out.push_str(
        "\t\t\tconst __seg = String(__rawModel ?? \"\").split(\"/\")[0].toLowerCase();\n\
         \t\t\tconst __src0 = (__SOURCE_ALIAS_MAP[__seg] ?? __seg.slice(0, __SOURCE_FALLBACK_LEN));\n",
    );
    let _ = writeln!(out, "\t\t\t__src = __src0 || {};", js_string(SOURCE_SENTINEL));
    out.push_str(
        "\t\t}\n\
         \t\tprefixContext.provider = __src ? `${__base}${__auth}.${__src}` : `${__base}${__auth}`;\n\
         \t}\n\
         \treturn prefixContext;\n\
         },",
    );
    out
}
