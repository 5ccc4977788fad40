//! Normalisation: fold OCR line structure into a single line of text.
//!
//! Tesseract reproduces the visual layout: hard line breaks at every column
//! edge, blank lines between paragraphs, trailing spaces. None of that is
//! meaningful once the text is handed on, so all of it collapses to single
//! spaces.
//!
//! ## Rule Order
//!
//! Rules run in a fixed order. Trailing horizontal whitespace is removed
//! before newlines become spaces, otherwise `"a \nb"` would turn into
//! `"a  b"` and rely on the space-collapsing pass to recover.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static RE_TRAILING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").unwrap());
static RE_SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

/// Apply all normalisation rules to recognised text.
///
/// Rules (applied in order):
/// 1. Collapse 3+ consecutive newlines to exactly 2
/// 2. Strip spaces and tabs before a newline
/// 3. Replace each remaining double newline with a space
/// 4. Replace each remaining newline with a space
/// 5. Collapse 2+ consecutive spaces to one
/// 6. Trim leading and trailing whitespace
///
/// The result contains no `\n` and no run of two spaces, and
/// `normalize_text(&normalize_text(s)) == normalize_text(s)`.
pub fn normalize_text(input: &str) -> String {
    let s = RE_BLANK_RUN.replace_all(input, "\n\n");
    let s = RE_TRAILING_WS.replace_all(&s, "\n");
    let s = s.replace("\n\n", " ");
    let s = s.replace('\n', " ");
    let s = RE_SPACE_RUN.replace_all(&s, " ");
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn collapses_layout_whitespace() {
        assert_eq!(normalize_text("Hello   World\n\n\nFoo"), "Hello World Foo");
    }

    #[test]
    fn paragraphs_become_single_spaces() {
        assert_eq!(
            normalize_text("Name: Ada\nRole: Engineer\n\nDate: 1843"),
            "Name: Ada Role: Engineer Date: 1843"
        );
    }

    #[test]
    fn trailing_tabs_before_newline_are_dropped() {
        assert_eq!(normalize_text("Total:\t\t\n42 \n"), "Total: 42");
    }

    #[test]
    fn empty_and_blank_inputs() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text(" \n\n\n \t "), "");
    }

    #[test]
    fn interior_tabs_are_kept() {
        assert_eq!(normalize_text("a\tb"), "a\tb");
    }

    proptest! {
        #[test]
        fn idempotent(s in "[a-z \t\n\r]{0,64}") {
            let once = normalize_text(&s);
            prop_assert_eq!(normalize_text(&once), once);
        }

        #[test]
        fn idempotent_any_string(s in any::<String>()) {
            let once = normalize_text(&s);
            prop_assert_eq!(normalize_text(&once), once);
        }

        #[test]
        fn single_line_without_double_spaces(s in "[a-z \t\n]{0,64}") {
            let out = normalize_text(&s);
            prop_assert!(!out.contains('\n'));
            prop_assert!(!out.contains("  "));
        }
    }
}
