//! Object-key derivation.
//!
//! The caller's filename only contributes its extension. The rest of the key
//! is a GMT+8 wall-clock timestamp and a random UUID v4, so keys never leak
//! the original name and collisions are negligible without asking storage.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Offset of the key timestamp from UTC, in hours.
const KEY_TIMESTAMP_OFFSET_HOURS: i64 = 8;

/// Timestamp layout inside the key, e.g. `2026-10-17_203045`.
const KEY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// Storage key for an upload: `{timestamp}_{uuid}{extension}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Derive a fresh key for `filename` at instant `now`.
    pub fn generate(filename: &str, now: DateTime<Utc>) -> Self {
        Self::from_parts(filename, now, Uuid::new_v4())
    }

    /// Deterministic form of [`ObjectKey::generate`].
    pub fn from_parts(filename: &str, now: DateTime<Utc>, id: Uuid) -> Self {
        let local = now.naive_utc() + Duration::hours(KEY_TIMESTAMP_OFFSET_HOURS);
        let timestamp = local.format(KEY_TIMESTAMP_FORMAT);
        Self(format!(
            "{timestamp}_{}{}",
            id.hyphenated(),
            extension(filename)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extension of `filename`, including the dot.
///
/// Empty when there is no dot, when the only dot is the first character
/// (`.bashrc`), or when the text after the last dot holds a path separator.
pub fn extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => {
            let ext = &filename[idx..];
            if ext.contains(|c| c == '/' || c == '\\') {
                ""
            } else {
                ext
            }
        }
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn fixed_uuid() -> Uuid {
        Uuid::parse_str("0f8fad5b-d9cb-469f-a165-70867728950e").unwrap()
    }

    #[test]
    fn test_key_layout() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 30, 45).unwrap();
        let key = ObjectKey::from_parts("photo.png", now, fixed_uuid());
        assert_eq!(
            key.as_str(),
            "2026-10-17_203045_0f8fad5b-d9cb-469f-a165-70867728950e.png"
        );
    }

    #[test]
    fn test_key_timestamp_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 20, 0, 1).unwrap();
        let key = ObjectKey::from_parts("a.txt", now, fixed_uuid());
        assert!(key.as_str().starts_with("2027-01-01_040001_"));
    }

    #[test]
    fn test_key_drops_base_name() {
        let now = Utc::now();
        let key = ObjectKey::generate("secret-report.pdf", now);
        assert!(!key.as_str().contains("secret-report"));
        assert!(key.as_str().ends_with(".pdf"));
    }

    #[test]
    fn test_key_never_contains_separators() {
        let now = Utc::now();
        for name in ["dir/file.png", "a.b/c", "..\\evil", "x.y\\z", "/etc/passwd"] {
            let key = ObjectKey::generate(name, now);
            assert!(!key.as_str().contains('/'), "{name} -> {key}");
            assert!(!key.as_str().contains('\\'), "{name} -> {key}");
        }
    }

    #[test]
    fn test_extension_rules() {
        assert_eq!(extension("photo.png"), ".png");
        assert_eq!(extension("archive.tar.gz"), ".gz");
        assert_eq!(extension("README"), "");
        assert_eq!(extension(".bashrc"), "");
        assert_eq!(extension("trailing."), ".");
        assert_eq!(extension("dir/file.png"), ".png");
        assert_eq!(extension("a.b/c"), "");
        assert_eq!(extension(""), "");
    }

    #[test]
    fn test_keys_unique_for_same_filename() {
        let now = Utc::now();
        let keys: HashSet<ObjectKey> = (0..10_000)
            .map(|_| ObjectKey::generate("photo.png", now))
            .collect();
        assert_eq!(keys.len(), 10_000);
    }
}
