//! Matching keys
//!
//! Tracks and downloaded files are compared through a slug that ignores
//! case, diacritics and punctuation:
//!
//! 1. compatibility-decompose the text (NFKD), which splits accented
//!    letters into a base letter and a combining mark;
//! 2. keep only alphanumerics, `_`, `-` and whitespace (combining marks and
//!    punctuation go);
//! 3. lowercase;
//! 4. join the remaining whitespace-separated words with `-`.
//!
//! ```
//! use core_sync::normalize::{normalize, track_key};
//!
//! assert_eq!(normalize("Beyoncé - Halo (Live)"), "beyonce---halo-live");
//! assert_eq!(track_key("Billie Eilish", "bad guy!"), "billie-eilish---bad-guy");
//! ```

use unicode_normalization::UnicodeNormalization;

/// Slug used for fuzzy matching. Pure: equal input always gives equal output.
pub fn normalize(text: &str) -> String {
    let kept: String = text
        .nfkd()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Key for a track given its joined artist names and title
///
/// Built from `"<artists> - <name>"` so it lines up with the
/// `Artist - Title` file names the download tool writes. A key with no
/// letters or digits left (only the separator) comes back empty.
pub fn track_key(artists: &str, name: &str) -> String {
    let key = normalize(&format!("{} - {}", artists, name));
    if key.chars().any(char::is_alphanumeric) {
        key
    } else {
        String::new()
    }
}
