use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

pub const HASH_THRESHOLD: usize = 1024;

/// Byte-span replacement over an in-memory text buffer, with verification
/// of the text being replaced.
///
/// Every patch compiles down to one of these: matchers acquire the span,
/// the edit applies it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until apply_to() is called"]
pub struct Edit {
    pub byte_start: usize,
    /// Exclusive.
    pub byte_end: usize,
    /// Inserted verbatim; no `$` expansion.
    pub new_text: String,
    /// Must match the span's current text or the edit is refused.
    pub expected_before: EditVerification,
}

/// How an edit recognizes the text it is about to replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    ExactMatch(String),
    /// xxh3 of the expected text, for whole-bundle fingerprints.
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Spans above [`HASH_THRESHOLD`] bytes are held as a hash.
    pub fn from_text(text: &str) -> Self {
        if text.len() > HASH_THRESHOLD {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("text at [{byte_start}, {byte_end}) no longer matches the located span")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("span [{byte_start}, {byte_end}) is out of bounds or splits a character (text is {text_len} bytes)")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        text_len: usize,
    },
}

impl Edit {
    /// `expected_before` is the span text as the matcher saw it.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: &str,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before),
        }
    }

    fn validate<'a>(&self, text: &'a str) -> Result<&'a str, EditError> {
        let range_error = || EditError::InvalidByteRange {
            byte_start: self.byte_start,
            byte_end: self.byte_end,
            text_len: text.len(),
        };

        if self.byte_start > self.byte_end || self.byte_end > text.len() {
            return Err(range_error());
        }
        // Also rejects spans that split a UTF-8 sequence.
        let current = text.get(self.byte_start..self.byte_end).ok_or_else(range_error)?;

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: current.to_string(),
            });
        }

        Ok(current)
    }

    /// Apply this edit to `text`, returning the new buffer.
    pub fn apply_to(&self, text: &str) -> Result<String, EditError> {
        let current = self.validate(text)?;

        let mut out = String::with_capacity(text.len() - current.len() + self.new_text.len());
        out.push_str(&text[..self.byte_start]);
        out.push_str(&self.new_text);
        out.push_str(&text[self.byte_end..]);
        Ok(out)
    }
}

/// Replace `path` with `content` via a synced sibling tempfile and rename.
///
/// Readers see either the old or the new bundle. Existing permissions are
/// carried over and the mtime is bumped.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // Same directory keeps the rename on one filesystem.
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let permissions = fs::metadata(path).ok().map(|m| m.permissions());

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    if let Some(permissions) = permissions {
        temp.as_file().set_permissions(permissions)?;
    }
    temp.persist(path).map_err(|e| e.error)?;

    filetime::set_file_mtime(path, filetime::FileTime::now())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "const prefix = effectivePrefix;";

    #[test]
    fn test_verification_strategies() {
        let exact = EditVerification::from_text("effectivePrefix");
        assert_eq!(exact, EditVerification::ExactMatch("effectivePrefix".into()));
        assert!(exact.matches("effectivePrefix"));
        assert!(!exact.matches("responsePrefix"));

        let bundle = "a;".repeat(HASH_THRESHOLD);
        let hashed = EditVerification::from_text(&bundle);
        assert_eq!(hashed, EditVerification::Hash(xxh3_64(bundle.as_bytes())));
        assert!(hashed.matches(&bundle));
        assert!(!hashed.matches(&bundle[1..]));
    }

    #[test]
    fn test_apply_to_replaces_span_verbatim() {
        let edit = Edit::new(15, 30, "`${$1}`", "effectivePrefix");
        assert_eq!(edit.apply_to(LINE).unwrap(), "const prefix = `${$1}`;");
    }

    #[test]
    fn test_apply_to_rejects_moved_text() {
        let edit = Edit::new(15, 30, "x", "responsePrefixx");
        assert!(matches!(
            edit.apply_to(LINE),
            Err(EditError::BeforeTextMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_ranges() {
        for (start, end) in [(20, 99), (10, 5)] {
            assert!(matches!(
                Edit::new(start, end, "x", "").apply_to(LINE),
                Err(EditError::InvalidByteRange { .. })
            ));
        }
        // Splits the two-byte 'é'.
        let edit = Edit::new(0, 1, "x", "\u{fffd}");
        assert!(matches!(
            edit.apply_to("é"),
            Err(EditError::InvalidByteRange { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("reply-abc.js");
        fs::write(&file_path, b"original").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o640)).unwrap();

        atomic_write(&file_path, b"modified").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "modified");
        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
