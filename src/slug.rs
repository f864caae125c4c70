//! Slug derivation for sermons and announcements.

use regex::Regex;

lazy_static::lazy_static! {
    // ASCII word chars only; accented letters are dropped, not transliterated
    static ref NON_SLUG_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_\s-]").unwrap();
    static ref SEPARATOR_RUNS: Regex = Regex::new(r"[\s_-]+").unwrap();
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

/// Generate a URL-friendly slug from a title string.
/// Lowercases, strips special characters, and collapses whitespace,
/// underscore and hyphen runs into single hyphens.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = NON_SLUG_CHARS.replace_all(lowered.trim(), "");
    let hyphenated = SEPARATOR_RUNS.replace_all(&stripped, "-");
    hyphenated.trim_matches('-').to_string()
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// Candidate slugs for collision probing: `base`, `base-1`, `base-2`, ...
pub fn with_suffix(base: &str, counter: u32) -> String {
    if counter == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic_title() {
        assert_eq!(slugify("Grace Upon Grace"), "grace-upon-grace");
    }

    #[test]
    fn test_slugify_strips_special_characters() {
        assert_eq!(slugify("What's Next? (Part 2)"), "whats-next-part-2");
    }

    #[test]
    fn test_slugify_collapses_separator_runs() {
        assert_eq!(slugify("a   b__c--d"), "a-b-c-d");
    }

    #[test]
    fn test_slugify_trims_leading_and_trailing_hyphens() {
        assert_eq!(slugify("--hello world--"), "hello-world");
        assert!(!slugify("  !wow!  ").starts_with('-'));
    }

    #[test]
    fn test_slugify_is_idempotent() {
        let once = slugify("The LORD Is My Shepherd!");
        assert_eq!(slugify(&once), once);
    }

    #[test]
    fn test_slugify_output_charset() {
        let slug = slugify("Jésus: Amour & Vérité (2024)!");
        assert!(slug.chars().all(|c| c.is_ascii_lowercase()
            || c.is_ascii_digit()
            || c == '-'));
        assert!(!slug.starts_with('-') && !slug.ends_with('-'));
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("grace-upon-grace"));
        assert!(is_valid_slug("grace-upon-grace-1"));
        assert!(!is_valid_slug("Grace"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("trailing-"));
        assert!(!is_valid_slug("double--hyphen"));
    }

    #[test]
    fn test_with_suffix_sequence_is_distinct() {
        let base = "grace-upon-grace";
        let slugs: Vec<String> = (0..4).map(|i| with_suffix(base, i)).collect();
        assert_eq!(slugs[0], "grace-upon-grace");
        assert_eq!(slugs[1], "grace-upon-grace-1");
        assert_eq!(slugs[2], "grace-upon-grace-2");
        for (i, a) in slugs.iter().enumerate() {
            for b in slugs.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
