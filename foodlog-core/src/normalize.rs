// Text normalization helpers shared by the note services
// Filename sanitization and order-preserving deduplication

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Default upper bound for sanitized filenames (in characters, not bytes)
pub const DEFAULT_MAX_FILENAME_LEN: usize = 80;

/// Returned when nothing usable survives sanitization
pub const FALLBACK_FILENAME: &str = "food";

fn illegal_chars() -> &'static Regex {
    static ILLEGAL: OnceLock<Regex> = OnceLock::new();
    // Characters rejected by at least one common filesystem, plus control codes
    ILLEGAL.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F\x7F]"#).unwrap())
}

fn whitespace_runs() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn trim_tail(text: &str) -> &str {
    text.trim_end_matches(|c: char| c == '.' || c.is_whitespace())
}

/// Turn arbitrary user text into something safe to use as a file stem.
///
/// Illegal characters are dropped, whitespace runs collapse to one space,
/// and the result never ends in a space or a dot. The output is at most
/// `max_length` characters and never empty.
pub fn sanitize_filename(text: &str, max_length: usize) -> String {
    let max_length = max_length.max(1);

    let stripped = illegal_chars().replace_all(text, "");
    let collapsed = whitespace_runs().replace_all(&stripped, " ");
    let trimmed = trim_tail(collapsed.trim_start());

    let truncated: String = trimmed.chars().take(max_length).collect();
    let result = trim_tail(&truncated);

    if result.is_empty() {
        return FALLBACK_FILENAME.chars().take(max_length).collect();
    }

    result.to_string()
}

/// Comparison key used for deduplication: trimmed and lowercased
pub fn normalize_key(item: &str) -> String {
    item.trim().to_lowercase()
}

/// Remove duplicates while keeping the first occurrence of each item.
///
/// Items compare case-insensitively; the surviving item keeps its casing.
pub fn deduplicate_preserve_order<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(AsRef::as_ref)
        .filter(|item| seen.insert(normalize_key(item)))
        .map(str::to_string)
        .collect()
}

/// Split free-form chat text into ingredient lines, dropping blanks
pub fn extract_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_removes_invalid_symbols() {
        assert_eq!(
            sanitize_filename("сыр 9% (моцарелла):*?\"<>|", DEFAULT_MAX_FILENAME_LEN),
            "сыр 9% (моцарелла)"
        );
    }

    #[test]
    fn test_sanitize_limits_length() {
        let long_name = "a".repeat(200);
        assert_eq!(sanitize_filename(&long_name, 80).chars().count(), 80);
    }

    #[test]
    fn test_sanitize_counts_characters_not_bytes() {
        let long_name = "щ".repeat(100);
        let result = sanitize_filename(&long_name, 10);
        assert_eq!(result, "щ".repeat(10));
    }

    #[test]
    fn test_sanitize_collapses_whitespace_and_trailing_dots() {
        assert_eq!(sanitize_filename("  green \t\n tea...  ", 80), "green tea");
    }

    #[test]
    fn test_sanitize_truncation_never_leaves_trailing_space() {
        // Cut lands right after the space
        let result = sanitize_filename("abcd efgh", 5);
        assert_eq!(result, "abcd");
    }

    #[test]
    fn test_sanitize_falls_back_when_nothing_left() {
        assert_eq!(sanitize_filename("?*<>|", 80), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("   ", 80), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("...", 80), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("", 2), "fo");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "сыр 9% (моцарелла):*?",
            "  spaced   out  ",
            "tail dots...",
            "a/b\\c",
            "",
            "x".repeat(120).as_str(),
        ]
        .map(String::from);

        for input in inputs {
            for max in [1, 3, 10, 80] {
                let once = sanitize_filename(&input, max);
                assert_eq!(sanitize_filename(&once, max), once, "input: {input:?}");
                assert!(!once.is_empty());
                assert!(once.chars().count() <= max);
                assert!(!once.ends_with(char::is_whitespace));
            }
        }
    }

    #[test]
    fn test_deduplicate_keeps_first_occurrence() {
        let items = ["milk", "cheese", "milk", "bread"];
        assert_eq!(deduplicate_preserve_order(&items), vec!["milk", "cheese", "bread"]);
    }

    #[test]
    fn test_deduplicate_is_case_insensitive() {
        let items = ["Паста", "Сыр", "паста"];
        assert_eq!(deduplicate_preserve_order(&items), vec!["Паста", "Сыр"]);
    }

    #[test]
    fn test_extract_lines() {
        assert_eq!(extract_lines("Паста\n\n  Сыр  \r\n   "), vec!["Паста", "Сыр"]);
        assert!(extract_lines("").is_empty());
    }
}
