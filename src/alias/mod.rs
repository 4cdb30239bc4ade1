//! Alias resolution: turning provider, source and model identifiers into
//! the short codes that make up a stamp.
//!
//! Lookup always goes through an explicit table first; [`derive_alias`] is
//! the deterministic fallback used when syncing new models into the table.

pub mod collision;
pub mod derive;
pub mod normalize;

pub use collision::{resolve_collisions, AliasAssignment};
pub use derive::{derive_alias, MAX_ALIAS_LEN, SENTINEL_ALIAS};
pub use normalize::normalize_model_name;

use std::collections::BTreeMap;

/// Look a model up in an alias table.
///
/// Tries the normalized name, then the name with dots as dashes, then with
/// dashes as dots, returning the first non-empty value (trimmed). The table
/// is never modified.
///
/// ```
/// use postfix_patcher::alias::lookup_alias;
/// use std::collections::BTreeMap;
///
/// let table = BTreeMap::from([("gpt-5-2".to_string(), "52".to_string())]);
/// assert_eq!(lookup_alias("GPT-5.2", &table), Some("52"));
/// assert_eq!(lookup_alias("gpt-6", &table), None);
/// ```
pub fn lookup_alias<'t>(model: &str, table: &'t BTreeMap<String, String>) -> Option<&'t str> {
    let normalized = normalize_model_name(model);
    if normalized.is_empty() {
        return None;
    }

    let candidates = [
        normalized.replace('.', "-"),
        normalized.replace('-', "."),
    ];

    std::iter::once(normalized.as_str())
        .chain(candidates.iter().map(String::as_str))
        .find_map(|key| {
            table
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        })
}
