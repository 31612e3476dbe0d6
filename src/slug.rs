//! Descriptive file names derived from image alt text.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Longest slug produced, in characters.
pub const MAX_SLUG_LEN: usize = 60;

/// Slug used when the alt text has no usable characters.
pub const PLACEHOLDER_SLUG: &str = "image";

/// Generate a file-name slug from alt text.
///
/// Lowercases, strips diacritics, collapses every run of other characters
/// into a single hyphen and trims hyphens from both ends. The result is at
/// most [`MAX_SLUG_LEN`] characters and never ends in a hyphen.
///
/// # Examples
///
/// ```
/// use polish_epub::slug::slugify;
///
/// assert_eq!(slugify("Frederick I of Prussia"), "frederick-i-of-prussia");
/// assert_eq!(slugify("Žemaitė, 1890"), "zemaite-1890");
/// assert_eq!(slugify("???"), "image");
/// ```
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    // Slugs are pure ASCII, so byte and character lengths agree.
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        let trimmed = slug.trim_end_matches('-').len();
        slug.truncate(trimmed);
    }

    if slug.is_empty() {
        PLACEHOLDER_SLUG.to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_slugify_simple() {
        assert_eq!(slugify("Amber Room"), "amber-room");
    }

    #[test]
    fn test_slugify_with_punctuation() {
        assert_eq!(
            slugify("Frederick I of Prussia, who commissioned the Amber Room"),
            "frederick-i-of-prussia-who-commissioned-the-amber-room"
        );
    }

    #[test]
    fn test_slugify_strips_diacritics() {
        assert_eq!(slugify("Catherine's Palace at Tsárskoye Seló"), "catherine-s-palace-at-tsarskoye-selo");
        assert_eq!(slugify("Königsberg Castle"), "konigsberg-castle");
    }

    #[test]
    fn test_slugify_leading_trailing_noise() {
        assert_eq!(slugify("  -- Hello World!! --  "), "hello-world");
    }

    #[test]
    fn test_slugify_empty_becomes_placeholder() {
        assert_eq!(slugify(""), "image");
        assert_eq!(slugify("   "), "image");
        assert_eq!(slugify("!!!"), "image");
        assert_eq!(slugify("漢字"), "image");
    }

    #[test]
    fn test_slugify_truncates_without_trailing_hyphen() {
        // The 60th character falls right after a word boundary.
        let alt = format!("{} {}", "a".repeat(59), "b".repeat(10));
        let slug = slugify(&alt);
        assert_eq!(slug, "a".repeat(59));
    }

    #[test]
    fn test_slugify_truncates_long_words() {
        let slug = slugify(&"x".repeat(100));
        assert_eq!(slug.len(), MAX_SLUG_LEN);
    }

    proptest! {
        #[test]
        fn slug_is_well_formed(alt in "\\PC{0,120}") {
            let slug = slugify(&alt);
            prop_assert!(!slug.is_empty());
            prop_assert!(slug.len() <= MAX_SLUG_LEN);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }

        #[test]
        fn slug_is_stable(alt in "[a-zA-Z0-9 ,.'-]{0,80}") {
            let slug = slugify(&alt);
            prop_assert_eq!(slugify(&slug), slug);
        }
    }
}
