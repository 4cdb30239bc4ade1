//! Identity shortening: keep only the uppercased first character of the
//! resolved identity name.

use crate::patch::matcher::{Matcher, Recipe};
use crate::patch::Applied;
use once_cell::sync::Lazy;
use regex::Regex;

pub const MARKER: &str = "__MODELSTAMP_IDSHORT__";

pub const ANCHOR: &str =
    "const prefixContext = { identityName: resolveIdentityName(cfg, agentId) };";

static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"const\s+prefixContext\s*=\s*\{\s*identityName:\s*resolveIdentityName\(cfg,\s*agentId\)\s*\};",
    )
    .expect("identity anchor pattern is valid")
});

static REPLACEMENT: Lazy<String> = Lazy::new(|| {
    format!(
        "/* {MARKER} */ const __id0 = resolveIdentityName(cfg, agentId);\
         const prefixContext = {{ identityName: __id0 ? __id0.trim().slice(0, 1).toUpperCase() || void 0 : void 0 }};"
    )
});

pub fn apply(text: &str) -> Applied {
    Recipe {
        marker: MARKER,
        matchers: &[Matcher::Literal(ANCHOR), Matcher::Pattern(&ANCHOR_RE)],
        replacement: &REPLACEMENT,
    }
    .run(text)
}
