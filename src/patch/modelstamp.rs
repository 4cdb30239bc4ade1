//! Model/provider stamp: capture the selected provider and model, then
//! resolve aliases and the auth letter when the prefix context is read.

use crate::patch::codegen::{GeneratedCode, MARKER, SAFE_PROFILE_LOOKUP, SAFE_STORE_GUARD};
use crate::patch::matcher::{replace_first, Matcher};
use crate::patch::{Applied, PatchStatus};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Stock provider accessor.
pub const PROVIDER_ANCHOR: &str = "responsePrefixContextProvider: () => prefixContext,";

// Leading declarations are absorbed so a forced re-patch replaces them
// instead of stacking a second copy. Only whole declaration lines qualify.
static HOOK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ms)(?:^[ \t]*let __rawProvider, __rawModel;\n)*(?:^[ \t]*const __[A-Z_]+ = [^\n]*;\n)*[ \t]*const onModelSelected = \(ctx\) => \{.*?\n[ \t]*\};",
    )
    .expect("model hook pattern is valid")
});

static PROVIDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ms)(?:^const __[A-Z_]+ = [^\n]*;\n)*responsePrefixContextProvider:\s*\(\)\s*=>\s*\{.*?return prefixContext;\s*\},",
    )
    .expect("provider accessor pattern is valid")
});

static DUPLICATE_DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\n[ \t]*let __rawProvider, __rawModel;\n)(?:[ \t]*let __rawProvider, __rawModel;\n)+")
        .expect("declaration dedup pattern is valid")
});

/// Collapse repeated adjacent `let __rawProvider, __rawModel;` lines.
pub fn dedup_declarations(text: &str) -> Cow<'_, str> {
    DUPLICATE_DECL_RE.replace_all(text, "$1")
}

/// Both guarded sub-expressions of the current provider logic are present.
pub fn has_safe_signature(text: &str) -> bool {
    text.contains(SAFE_STORE_GUARD) && text.contains(SAFE_PROFILE_LOOKUP)
}

pub fn apply(text: &str, code: &GeneratedCode, force: bool) -> Applied {
    let deduped = dedup_declarations(text);
    let marker_present = deduped.contains(MARKER);

    if marker_present && !force && has_safe_signature(&deduped) {
        let status = if deduped != text {
            PatchStatus::Patched
        } else {
            PatchStatus::Already
        };
        return Applied {
            text: deduped.into_owned(),
            status,
        };
    }

    let hooked = match replace_first(&deduped, &[Matcher::Pattern(&HOOK_RE)], &code.hook) {
        Some(hooked) => hooked,
        None if marker_present => deduped.into_owned(),
        None => return Applied::unchanged(text, PatchStatus::NoMatch),
    };

    let provided = replace_first(
        &hooked,
        &[
            Matcher::Literal(PROVIDER_ANCHOR),
            Matcher::Pattern(&PROVIDER_RE),
        ],
        &code.provider_context,
    )
    .unwrap_or_else(|| {
        tracing::debug!("provider accessor not found; hook patched alone");
        hooked
    });

    let finished = dedup_declarations(&provided).into_owned();
    let status = if finished != text {
        PatchStatus::Patched
    } else {
        PatchStatus::Already
    };
    Applied {
        text: finished,
        status,
    }
}
