//! Noise filtering for extracted message text.

use std::sync::LazyLock;

use regex::Regex;

/// Zero-width, invisible and exotic space characters replaced by a plain space.
const INVISIBLE: &[char] = &[
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}', '\u{2060}', '\u{2800}', '\u{00A0}',
    '\u{202F}', '\u{205F}', '\u{3000}', '\u{2000}', '\u{2001}', '\u{2002}', '\u{2003}',
    '\u{2004}', '\u{2005}', '\u{2006}', '\u{2007}', '\u{2008}', '\u{2009}', '\u{200A}',
    '\u{2028}', '\u{2029}',
];

static SEPARATOR_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;]{3,}").expect("static pattern"));
static EMPTY_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*\]|\(\s*\)|\{\s*\}").expect("static pattern"));
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("static pattern"));
static NEWLINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static pattern"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));

/// Strip invisible characters, separator runs and brackets, drop lines that
/// are mostly symbols, and collapse all whitespace to single spaces.
///
/// The result is a single line. `clean(clean(x)) == clean(x)`.
pub fn clean(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text: String = text
        .chars()
        .map(|c| if INVISIBLE.contains(&c) { ' ' } else { c })
        .collect();
    let text = SEPARATOR_RUN.replace_all(&text, " ");
    let text = EMPTY_BRACKETS.replace_all(&text, " ");
    let text = text.replace(['[', ']', '(', ')', '{', '}'], " ");
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = BLANK_RUN.replace_all(&text, " ");
    let text = NEWLINE_RUN.replace_all(&text, "\n\n");

    let kept: Vec<&str> = text
        .split('\n')
        .map(str::trim)
        .filter(|line| is_meaningful(line))
        .collect();

    let joined = WHITESPACE_RUN.replace_all(&kept.join("\n"), " ").into_owned();
    // Short lines joined together can form a symbol-only line of their own.
    if is_meaningful(&joined) {
        joined
    } else {
        String::new()
    }
}

/// Empty lines are dropped. Lines of up to 3 characters are kept; longer
/// lines need at least 3 letters or more than 30% letters.
fn is_meaningful(line: &str) -> bool {
    let total = line.chars().count();
    if total == 0 {
        return false;
    }
    if total <= 3 {
        return true;
    }
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 3 || letters as f64 / total as f64 > 0.3
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_invisible_characters_become_spaces() {
        assert_eq!(clean("Hello\u{200B}world\u{00A0}again"), "Hello world again");
    }

    #[test]
    fn test_separator_runs_and_brackets() {
        assert_eq!(clean("Total;;;; due (see) [] {x}"), "Total due see x");
    }

    #[test]
    fn test_symbol_lines_are_dropped() {
        let text = "Dear customer,\r\n-----\r\n\r\n\r\n\r\n12/34\r\nYour order shipped.\r\n";
        assert_eq!(clean(text), "Dear customer, Your order shipped.");
    }

    #[test]
    fn test_short_lines_are_kept() {
        assert_eq!(clean("Hi\nThanks a lot\nBob"), "Hi Thanks a lot Bob");
        assert_eq!(clean("ok\nДа"), "ok Да");
    }

    #[test]
    fn test_long_symbol_line_is_dropped() {
        assert_eq!(clean("Regards\n----=====----\nBob"), "Regards Bob");
        assert_eq!(clean("----=====----"), "");
    }

    #[test]
    fn test_joined_short_symbols_are_dropped() {
        assert_eq!(clean("--\n--"), "");
        assert_eq!(clean(&clean("--\n--")), "");
    }

    #[test]
    fn test_cyrillic_counts_as_letters() {
        assert_eq!(clean("Привет, мир\n------"), "Привет, мир");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean(""), "");
        assert_eq!(clean(" \n\t "), "");
    }

    proptest! {
        #[test]
        fn proptest_clean_is_idempotent(text in "\\PC{0,200}") {
            let once = clean(&text);
            prop_assert_eq!(clean(&once), once.clone());
        }

        #[test]
        fn proptest_clean_output_has_single_spaces(text in "[a-zA-Z ,;\\[\\]\\n\\t]{0,120}") {
            let out = clean(&text);
            prop_assert!(!out.contains("  "));
            prop_assert!(!out.contains('\n'));
            prop_assert_eq!(out.trim(), out.as_str());
        }
    }
}
