//! URL extraction and removal.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

static URL: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"https?://\S+|www\.\S+")
        .case_insensitive(true)
        .build()
        .expect("static pattern")
});
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));

/// Remove every URL from `text`, replacing each with `placeholder`.
///
/// Returns the rewritten text and the URLs in order of occurrence,
/// duplicates included. Adjacent placeholders (optionally separated by
/// whitespace) collapse into one; whitespace is normalized and trimmed.
pub fn extract_and_remove_urls(text: &str, placeholder: &str) -> (String, Vec<String>) {
    let urls: Vec<String> = URL.find_iter(text).map(|m| m.as_str().to_string()).collect();
    if urls.is_empty() {
        return (text.to_string(), urls);
    }

    let mut result = URL.replace_all(text, regex::NoExpand(placeholder)).into_owned();
    if !placeholder.is_empty() {
        let escaped = regex::escape(placeholder);
        if let Ok(run) = Regex::new(&format!(r"{escaped}(?:\s*{escaped})+")) {
            result = run.replace_all(&result, regex::NoExpand(placeholder)).into_owned();
        }
    }
    let result = WHITESPACE_RUN.replace_all(&result, " ");
    (result.trim().to_string(), urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_urls_removed_in_order() {
        let (text, urls) = extract_and_remove_urls(
            "See https://a.example/x and www.b.example then HTTP://A.EXAMPLE/x",
            "",
        );
        assert_eq!(text, "See and then");
        assert_eq!(
            urls,
            vec!["https://a.example/x", "www.b.example", "HTTP://A.EXAMPLE/x"]
        );
    }

    #[test]
    fn test_duplicates_are_kept() {
        let (_, urls) = extract_and_remove_urls("https://x.io https://x.io", "");
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn test_placeholder_runs_collapse() {
        let (text, urls) =
            extract_and_remove_urls("Links: https://a.io https://b.io  www.c.io end", "[link]");
        assert_eq!(text, "Links: [link] end");
        assert_eq!(urls.len(), 3);
    }

    #[test]
    fn test_no_urls_is_unchanged() {
        let (text, urls) = extract_and_remove_urls("  plain   text ", "");
        assert_eq!(text, "  plain   text ");
        assert!(urls.is_empty());
    }

    proptest! {
        #[test]
        fn proptest_no_url_survives(
            words in proptest::collection::vec("[a-z]{1,8}", 0..8),
            hosts in proptest::collection::vec("[a-z]{1,8}\\.[a-z]{2,3}", 0..4),
        ) {
            let mut parts = words.clone();
            for (i, host) in hosts.iter().enumerate() {
                let url = if i % 2 == 0 { format!("https://{host}/p") } else { format!("www.{host}") };
                parts.insert(i.min(parts.len()), url);
            }
            let text = parts.join(" ");
            let (cleaned, urls) = extract_and_remove_urls(&text, "");
            prop_assert!(URL.find(&cleaned).is_none());
            prop_assert_eq!(urls.len(), hosts.len());
        }
    }
}
