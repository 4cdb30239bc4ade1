use once_cell::sync::Lazy;
use regex::Regex;

/// Vendor family whose dotted point releases (`-4.6`) are published as `-4-6`.
pub const DOTTED_VERSION_VENDOR: &str = "claude-";

// Applied repeatedly: `foo-latest-20250101` sheds both suffixes.
static STRIPPABLE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-(?:\d{8}|latest|preview)$").expect("valid suffix regex"));

static DOTTED_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-(\d+)\.(\d+)$").expect("valid version regex"));

/// Canonical form of a raw model identifier, used as the key of alias tables.
///
/// Lowercases, drops any `:tag` suffix, strips trailing date (`-YYYYMMDD`),
/// `-latest` and `-preview` suffixes until none remain, and rewrites a
/// trailing `-N.M` to `-N-M` for the dotted-version vendor family.
///
/// ```
/// use postfix_patcher::alias::normalize_model_name;
///
/// assert_eq!(normalize_model_name("Claude-Sonnet-4.6-20250101"), "claude-sonnet-4-6");
/// assert_eq!(normalize_model_name("gpt-5.2:beta"), "gpt-5.2");
/// assert_eq!(normalize_model_name(""), "");
/// ```
pub fn normalize_model_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let mut model = match lowered.split_once(':') {
        Some((head, _tag)) => head.to_string(),
        None => lowered,
    };

    loop {
        let next = STRIPPABLE_SUFFIX.replace(&model, "").into_owned();
        if next == model {
            break;
        }
        model = next;
    }

    if model.starts_with(DOTTED_VERSION_VENDOR) {
        model = DOTTED_VERSION.replace(&model, "-${1}-${2}").into_owned();
    }

    model
}
