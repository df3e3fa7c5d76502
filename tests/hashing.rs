//! Property-based tests for path hashing and sanitizing.

use proptest::prelude::*;

use hashfs::extract::sanitize::{sanitize_path, sanitize_segment};
use hashfs::hash::{canonicalize, hash_path};

/// Strategy for absolute archive paths of 1-4 segments.
fn archive_path_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-zA-Z0-9_äöü][a-zA-Z0-9_. -]{0,12}", 1..5)
        .prop_map(|parts| format!("/{}", parts.join("/")))
}

#[test]
fn test_known_vector() {
    assert_eq!(hash_path("/käsefondue.txt", 0), 8645157520230346068);
}

proptest! {
    /// Hashing is a pure function of path and salt.
    #[test]
    fn hash_is_stable(path in archive_path_strategy(), salt in any::<u16>()) {
        prop_assert_eq!(hash_path(&path, salt), hash_path(&path, salt));
    }

    /// The leading slash does not change the hash.
    #[test]
    fn leading_slash_is_ignored(path in archive_path_strategy()) {
        prop_assert_eq!(hash_path(&path, 0), hash_path(&path[1..], 0));
    }

    /// One trailing slash does not change the hash.
    #[test]
    fn trailing_slash_is_ignored(path in archive_path_strategy(), salt in any::<u16>()) {
        let with_slash = format!("{path}/");
        prop_assert_eq!(hash_path(&with_slash, salt), hash_path(&path, salt));
    }

    /// Newlines are dropped from the hash input.
    #[test]
    fn canonical_form_has_no_newlines(path in archive_path_strategy(), at in 0usize..8) {
        let mut with_newline = path.clone();
        let at = with_newline.char_indices().nth(at).map_or(with_newline.len(), |(i, _)| i);
        with_newline.insert(at, '\n');
        prop_assert!(!canonicalize(&with_newline).contains('\n'));
        prop_assert_eq!(hash_path(&with_newline, 0), hash_path(&path, 0));
    }

    /// A salt changes the hash input.
    #[test]
    fn salt_changes_hash(path in archive_path_strategy(), salt in 1u16..=u16::MAX) {
        let canonical = canonicalize(&path);
        prop_assert_eq!(
            hash_path(&path, salt),
            hashfs::hash::city_hash64(format!("{salt}{canonical}").as_bytes())
        );
    }

    /// Sanitized segments are legal on every common filesystem.
    #[test]
    fn sanitized_segments_are_legal(segment in "\\PC{0,16}") {
        let clean = sanitize_segment(&segment);
        prop_assert!(!clean.is_empty());
        prop_assert!(!clean.chars().any(|c| c.is_control() || "<>:\"\\|?*".contains(c)));
        prop_assert!(!clean.ends_with('.') && !clean.ends_with(' '));
    }

    /// Sanitizing is idempotent.
    #[test]
    fn sanitize_is_idempotent(path in archive_path_strategy()) {
        let once = sanitize_path(&path);
        prop_assert_eq!(sanitize_path(&once), once.clone());
        prop_assert!(once.starts_with('/'));
    }
}
