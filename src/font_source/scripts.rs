//! Unicode script discovery for the live font
//!
//! Script tags here are lower-cased ISO 15924 codes (`latn`, `arab`), the
//! form used for `languagesystem` statements injected before kerning
//! synthesis.

use super::SourceFont;
use std::collections::BTreeSet;
use unicode_script::{Script, UnicodeScript};

/// Scripts written right to left, as lower-cased ISO 15924 codes
const RIGHT_TO_LEFT_SCRIPTS: &[&str] = &[
    "adlm", "arab", "armi", "avst", "chrs", "cprt", "elym", "hatr", "hebr", "khar", "lydi",
    "mand", "mani", "mend", "merc", "mero", "narb", "nbat", "nkoo", "orkh", "ougr", "palm",
    "phli", "phlp", "phnx", "prti", "rohg", "samr", "sarb", "sogd", "sogo", "syrc", "thaa",
    "yezi",
];

/// The script tag for a code point, or `None` for common, inherited and
/// unknown characters
pub fn script_tag(ch: char) -> Option<String> {
    match ch.script() {
        Script::Common | Script::Inherited | Script::Unknown => None,
        script => Some(script.short_name().to_ascii_lowercase()),
    }
}

/// Distinct scripts of every code point assigned in the font, sorted
pub fn font_scripts(font: &SourceFont<'_>) -> BTreeSet<String> {
    font.code_points().filter_map(script_tag).collect()
}

pub fn is_right_to_left(script_tag: &str) -> bool {
    RIGHT_TO_LEFT_SCRIPTS.contains(&script_tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font_source::test_fonts::font_with_glyphs;

    #[test]
    fn test_script_tag_skips_generic_scripts() {
        assert_eq!(script_tag('A').as_deref(), Some("latn"));
        assert_eq!(script_tag('\u{0627}').as_deref(), Some("arab"));
        assert_eq!(script_tag('1'), None);
        assert_eq!(script_tag(' '), None);
        assert_eq!(script_tag('\u{0301}'), None);
    }

    #[test]
    fn test_font_scripts_are_distinct_and_sorted() {
        let font = font_with_glyphs(&[
            ("beh-ar", 600.0, &['\u{0628}']),
            ("A", 500.0, &['A']),
            ("B", 500.0, &['B']),
            ("zero", 500.0, &['0']),
        ]);
        let scripts: Vec<_> = font_scripts(&SourceFont::new(&font)).into_iter().collect();
        assert_eq!(scripts, vec!["arab", "latn"]);
    }

    #[test]
    fn test_font_without_code_points_has_no_scripts() {
        let font = font_with_glyphs(&[("A.alt", 500.0, &[])]);
        assert!(font_scripts(&SourceFont::new(&font)).is_empty());
    }

    #[test]
    fn test_direction_of_scripts() {
        assert!(is_right_to_left("arab"));
        assert!(is_right_to_left("hebr"));
        assert!(!is_right_to_left("latn"));
    }
}
