//! Deterministic short-code derivation for models missing from the alias table.
//!
//! A derived alias is `prefix + version + variant`, at most
//! [`MAX_ALIAS_LEN`] characters and never shorter than two:
//!
//! - `prefix` comes from the model family (`gpt` → `g`) or, for the
//!   claude family, from its role word (`sonnet` → `s`)
//! - `version` is the first version-like run found after the family
//! - `variant` collects hints such as `turbo` → `tb` or `pro` → `p`
//!
//! ```
//! use postfix_patcher::alias::derive_alias;
//!
//! assert_eq!(derive_alias("claude-sonnet-4-6"), "s46");
//! assert_eq!(derive_alias("gpt-4-turbo"), "g4tb");
//! assert_eq!(derive_alias(""), "xx");
//! ```

use super::normalize::normalize_model_name;

/// Code returned for inputs with nothing to derive from.
pub const SENTINEL_ALIAS: &str = "xx";

/// Upper bound on the length of a derived alias.
pub const MAX_ALIAS_LEN: usize = 5;

const MIN_ALIAS_LEN: usize = 2;

const ROLE_FAMILY: &str = "claude";

const ROLE_PREFIXES: &[(&str, &str)] = &[
    ("sonnet", "s"),
    ("opus", "o"),
    ("haiku", "h"),
    ("instant", "i"),
];

const FAMILY_PREFIXES: &[(&str, &str)] = &[
    ("claude", "c"),
    ("gpt", "g"),
    ("glm", "gl"),
    ("grok", "gk"),
    ("gemini", "gm"),
    ("gemma", "ge"),
    ("llama", "l"),
    ("mistral", "m"),
    ("mixtral", "mx"),
    ("minimax", "mm"),
    ("kimi", "k"),
    ("qwen", "q"),
    ("deepseek", "d"),
    ("phi", "ph"),
    ("command", "c"),
    ("o", "o"),
];

/// Derive a short alias from a raw model identifier.
///
/// Depends only on `model`; the result is always 2..=5 lowercase ASCII
/// alphanumerics.
pub fn derive_alias(model: &str) -> String {
    let normalized = normalize_model_name(model);
    // Aggregator ids carry the upstream vendor as a path prefix.
    let name = normalized.rsplit('/').next().unwrap_or_default();
    let segments: Vec<&str> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect();

    let Some((first, rest)) = segments.split_first() else {
        return SENTINEL_ALIAS.to_string();
    };

    let family_len = first
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(first.len());
    let (family, tail) = first.split_at(family_len);
    // Without family letters the first segment is scanned as a version token.
    let (initial_version, mut remaining): (&str, Vec<&str>) = if family.is_empty() {
        ("", segments.clone())
    } else {
        (&tail[..leading_digits(tail)], rest.to_vec())
    };

    let prefix = if family == ROLE_FAMILY {
        match take_role(&mut remaining) {
            Some(role) => role.to_string(),
            None => lookup(FAMILY_PREFIXES, family).unwrap_or("c").to_string(),
        }
    } else if let Some(prefix) = lookup(FAMILY_PREFIXES, family) {
        prefix.to_string()
    } else {
        heuristic_prefix(family, rest.first().copied())
    };

    let version = scan_version(initial_version, &remaining);
    let variant = scan_variants(&remaining);

    let alias = compose(&prefix, &version, &variant);
    pad(alias, name)
}

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Remove the first role word from `segments`, returning its prefix.
fn take_role(segments: &mut Vec<&str>) -> Option<&'static str> {
    let idx = segments
        .iter()
        .position(|s| lookup(ROLE_PREFIXES, s).is_some())?;
    let role = segments.remove(idx);
    lookup(ROLE_PREFIXES, role)
}

fn heuristic_prefix(family: &str, second: Option<&str>) -> String {
    let mut prefix = String::with_capacity(2);
    let mut family_chars = family.chars();
    if let Some(c) = family_chars.next() {
        prefix.push(c);
    }

    let second_letter = second
        .filter(|s| !is_version_token(s))
        .and_then(|s| s.chars().next())
        .filter(|c| c.is_ascii_alphabetic());

    match second_letter {
        Some(c) => prefix.push(c),
        None => {
            if let Some(c) = family_chars.next() {
                prefix.push(c);
            }
        }
    }
    prefix
}

fn leading_digits(s: &str) -> usize {
    s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len())
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `0528`, `0613`: snapshot stamps, not versions.
fn looks_like_date(s: &str) -> bool {
    s.len() >= 4 && s.starts_with('0')
}

fn is_version_token(s: &str) -> bool {
    is_digits(s)
        || s.strip_prefix('r').is_some_and(is_digits)
        || s.strip_prefix('v').is_some_and(is_digits)
}

/// First digit run of a segment that mixes letters and digits (`4o`, `k2`).
fn embedded_digit_run(segment: &str) -> Option<&str> {
    if !segment.bytes().any(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    let start = segment.find(|c: char| c.is_ascii_digit())?;
    let run = &segment[start..];
    Some(&run[..leading_digits(run)])
}

fn scan_version(initial: &str, segments: &[&str]) -> String {
    let mut version = initial.to_string();
    let mut accumulating = !version.is_empty();

    for segment in segments {
        if accumulating {
            if is_digits(segment) && !looks_like_date(segment) {
                version.push_str(segment);
                continue;
            }
            break;
        }

        if let Some(digits) = segment.strip_prefix('r').filter(|d| is_digits(d)) {
            return format!("r{digits}");
        }
        if let Some(digits) = segment.strip_prefix('v').filter(|d| is_digits(d)) {
            version.push_str(digits);
            accumulating = true;
            continue;
        }
        if is_digits(segment) {
            if looks_like_date(segment) {
                break;
            }
            version.push_str(segment);
            accumulating = true;
            continue;
        }
        if let Some(run) = embedded_digit_run(segment) {
            version.push_str(run);
            break;
        }
    }

    version
}

fn variant_hint(segment: &str) -> Option<&'static str> {
    if segment.contains("turbo") {
        return Some("tb");
    }
    if segment.contains("think") || segment.contains("reason") {
        return Some("t");
    }
    if segment.contains("coder") || segment.contains("codex") {
        return Some("c");
    }
    match segment {
        "pro" | "plus" => Some("p"),
        "mini" => Some("m"),
        "nano" => Some("n"),
        "flash" | "fast" => Some("f"),
        "lite" | "light" => Some("l"),
        "max" => Some("x"),
        "instruct" => Some("i"),
        "vision" => Some("v"),
        _ => None,
    }
}

fn scan_variants(segments: &[&str]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for hint in segments.iter().filter_map(|s| variant_hint(s)) {
        if !seen.contains(&hint) {
            seen.push(hint);
        }
    }
    seen.concat()
}

fn truncated(s: &str, len: usize) -> &str {
    // Derived parts are ASCII-only.
    &s[..s.len().min(len)]
}

fn compose(prefix: &str, version: &str, variant: &str) -> String {
    if prefix.len() + version.len() + variant.len() <= MAX_ALIAS_LEN {
        return format!("{prefix}{version}{variant}");
    }

    let prefix = truncated(prefix, 2);
    let mut variant = truncated(variant, 2);
    if prefix.len() + version.len() + variant.len() > MAX_ALIAS_LEN {
        variant = truncated(variant, 1);
    }
    let budget = MAX_ALIAS_LEN.saturating_sub(prefix.len() + variant.len());
    let version = truncated(version, budget);

    let mut alias = format!("{prefix}{version}{variant}");
    alias.truncate(MAX_ALIAS_LEN);
    alias
}

fn pad(mut alias: String, source: &str) -> String {
    if alias.len() >= MIN_ALIAS_LEN {
        return alias;
    }
    let filler = source
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .skip(alias.len())
        .chain(SENTINEL_ALIAS.chars());
    for c in filler {
        if alias.len() >= MIN_ALIAS_LEN {
            break;
        }
        alias.push(c);
    }
    alias
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_family() {
        assert_eq!(derive_alias("claude-sonnet-4-6"), "s46");
        assert_eq!(derive_alias("claude-opus-4-1"), "o41");
        assert_eq!(derive_alias("Claude-Haiku-4.5-20251001"), "h45");
        // Older naming puts the role after the version.
        assert_eq!(derive_alias("claude-3-5-sonnet-20241022"), "s35");
    }

    #[test]
    fn test_role_family_without_role_word() {
        assert_eq!(derive_alias("claude"), "cl");
        assert_eq!(derive_alias("claude-2"), "c2");
    }

    #[test]
    fn test_known_families() {
        assert_eq!(derive_alias("gpt-5"), "g5");
        assert_eq!(derive_alias("glm-5"), "gl5");
        assert_eq!(derive_alias("gpt-5.2-codex"), "g52c");
        assert_eq!(derive_alias("deepseek-r1"), "dr1");
        assert_eq!(derive_alias("kimi-k2.5"), "k2");
        assert_eq!(derive_alias("o3-mini"), "o3m");
    }

    #[test]
    fn test_embedded_digit_run_stops_scan() {
        assert_eq!(derive_alias("gpt-4o-mini"), "g4m");
        assert_eq!(derive_alias("llama-3.3-70b-instruct"), "l33i");
    }

    #[test]
    fn test_date_like_token_stops_accumulation() {
        assert_eq!(derive_alias("gpt-4-0613"), "g4");
        assert_eq!(derive_alias("deepseek-r1-0528"), "dr1");
    }

    #[test]
    fn test_family_digits_start_version() {
        assert_eq!(derive_alias("qwen2.5-coder-32b-instruct"), "q25ci");
    }

    #[test]
    fn test_shrinks_to_budget() {
        assert_eq!(derive_alias("grok-4-1-fast-reasoning"), "gk41f");
        assert_eq!(derive_alias("gemini-2.5-flash-thinking"), "gm25f");
        assert_eq!(derive_alias("gemini-2.5-pro"), "gm25p");
    }

    #[test]
    fn test_unknown_family_heuristic() {
        assert_eq!(derive_alias("mystery"), "my");
        assert_eq!(derive_alias("acme-turbo-2"), "at2tb");
        assert_eq!(derive_alias("acme-v3"), "ac3");
    }

    #[test]
    fn test_pads_short_aliases() {
        assert_eq!(derive_alias("x"), "xx");
        assert_eq!(derive_alias("o"), "ox");
    }

    #[test]
    fn test_sentinel_for_empty() {
        assert_eq!(derive_alias(""), SENTINEL_ALIAS);
        assert_eq!(derive_alias("---"), SENTINEL_ALIAS);
    }

    #[test]
    fn test_vendor_path_prefix_ignored() {
        assert_eq!(derive_alias("openai/gpt-5"), "g5");
    }
}
