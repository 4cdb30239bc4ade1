use crate::edit::Edit;
use crate::patch::{Applied, PatchStatus};
use regex::Regex;
use std::ops::Range;

/// One way of locating a patch site.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Exact text.
    Literal(&'static str),
    /// Whitespace-tolerant fallback; the first match wins.
    Pattern(&'static Regex),
}

impl Matcher {
    pub fn find(&self, text: &str) -> Option<Range<usize>> {
        match self {
            Matcher::Literal(needle) => text
                .find(needle)
                .map(|start| start..start + needle.len()),
            Matcher::Pattern(re) => re.find(text).map(|m| m.range()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Matcher::Literal(_) => "literal",
            Matcher::Pattern(_) => "pattern",
        }
    }
}

/// Replace the first site found by the first matcher that hits.
///
/// The replacement is inserted verbatim; `$` in it is never expanded.
pub fn replace_first(text: &str, matchers: &[Matcher], replacement: &str) -> Option<String> {
    for matcher in matchers {
        let Some(span) = matcher.find(text) else {
            tracing::debug!(matcher = matcher.kind(), "no match");
            continue;
        };

        tracing::debug!(matcher = matcher.kind(), start = span.start, end = span.end, "matched");
        let edit = Edit::new(span.start, span.end, replacement, &text[span.clone()]);
        match edit.apply_to(text) {
            Ok(patched) => return Some(patched),
            Err(error) => tracing::error!(%error, "failed to apply matched span"),
        }
    }
    None
}

/// A marker-guarded patch: marker present means already applied, otherwise
/// the matchers are tried in order.
#[derive(Debug, Clone, Copy)]
pub struct Recipe<'a> {
    pub marker: &'static str,
    pub matchers: &'a [Matcher],
    pub replacement: &'a str,
}

impl Recipe<'_> {
    pub fn run(&self, text: &str) -> Applied {
        if text.contains(self.marker) {
            return Applied::unchanged(text, PatchStatus::Already);
        }
        match replace_first(text, self.matchers, self.replacement) {
            Some(patched) => Applied {
                text: patched,
                status: PatchStatus::Patched,
            },
            None => Applied::unchanged(text, PatchStatus::NoMatch),
        }
    }
}
