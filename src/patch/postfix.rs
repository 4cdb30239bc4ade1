//! Stamp placement: teach the outbound prefix logic to append when the
//! prefix starts with `postfix:`.

use crate::patch::matcher::{Matcher, Recipe};
use crate::patch::Applied;
use crate::stamp::POSTFIX_SCHEME;
use once_cell::sync::Lazy;
use regex::Regex;

pub const MARKER: &str = "__POSTFIX_PATCHED__";

/// The stock prepend statement.
pub const ANCHOR: &str = "if (effectivePrefix && text && text.trim() !== HEARTBEAT_TOKEN && !text.startsWith(effectivePrefix)) text = `${effectivePrefix} ${text}`;";

static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"if\s*\(\s*effectivePrefix\s*&&\s*text\s*&&\s*text\.trim\(\)\s*!==\s*HEARTBEAT_TOKEN\s*&&\s*!text\.startsWith\(effectivePrefix\)\s*\)\s*\{?\s*text\s*=\s*`\$\{effectivePrefix\}\s+\$\{text\}`;\s*\}?",
    )
    .expect("postfix anchor pattern is valid")
});

static REPLACEMENT: Lazy<String> = Lazy::new(|| {
    format!(
        "/* {MARKER} */ if (effectivePrefix && text && text.trim() !== HEARTBEAT_TOKEN) {{ \
         if (effectivePrefix.startsWith(\"{POSTFIX_SCHEME}\")) {{ \
         const suffix = effectivePrefix.slice({scheme_len}); \
         if (!text.endsWith(suffix)) text = `${{text}}\\n${{suffix}}`; \
         }} else if (!text.startsWith(effectivePrefix)) {{ \
         text = `${{effectivePrefix}} ${{text}}`; \
         }} }}",
        scheme_len = POSTFIX_SCHEME.len(),
    )
});

pub fn replacement() -> &'static str {
    &REPLACEMENT
}

pub fn apply(text: &str) -> Applied {
    Recipe {
        marker: MARKER,
        matchers: &[Matcher::Literal(ANCHOR), Matcher::Pattern(&ANCHOR_RE)],
        replacement: replacement(),
    }
    .run(text)
}
