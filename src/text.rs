//! Plain-text normalization for rich-text tracker fields.
//!
//! Work-item trackers store description and repro-step fields as HTML
//! fragments. The helpers here flatten that markup into plain text suitable
//! for tokenization and display. Every function is total: malformed markup
//! and broken entities degrade to whitespace or nothing, never to an error.

use once_cell::sync::Lazy;
use regex::Regex;

static BR_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*br\s*/?>").unwrap());
static P_CLOSE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*/p\s*>").unwrap());
static P_OPEN_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*p\b[^>]*>").unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)&(nbsp|amp|lt|gt|quot|#39);").unwrap());
static DECIMAL_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#(\d+);").unwrap());
static HEX_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#x([0-9a-fA-F]+);").unwrap());
static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\x0b\x0c]+").unwrap());
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Convert an HTML fragment into plain text.
///
/// Line breaks and paragraph closings become newlines, all other tags become
/// a single space, a small whitelist of named entities plus numeric character
/// references are decoded, and the result is whitespace-collapsed.
pub fn strip_markup(input: &str) -> String {
    let text = input.replace("\r\n", "\n");
    let text = BR_TAG.replace_all(&text, "\n");
    let text = P_CLOSE_TAG.replace_all(&text, "\n");
    let text = P_OPEN_TAG.replace_all(&text, "");

    // Drop remaining tags.
    let text = ANY_TAG.replace_all(&text, " ");

    // Decode a small set of common entities.
    let text = NAMED_ENTITY.replace_all(&text, |caps: &regex::Captures| {
        match caps[1].to_ascii_lowercase().as_str() {
            "nbsp" => " ",
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            "#39" => "'",
            _ => "",
        }
        .to_string()
    });

    // Numeric entities. References outside the valid code point range are
    // dropped silently.
    let text = DECIMAL_ENTITY.replace_all(&text, |caps: &regex::Captures| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    let text = HEX_ENTITY.replace_all(&text, |caps: &regex::Captures| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    collapse_whitespace(&text)
}

/// Collapse runs of horizontal whitespace to single spaces and 3+ newlines
/// to exactly two, converting non-breaking spaces along the way.
pub fn collapse_whitespace(input: &str) -> String {
    let text = input.replace('\u{00a0}', " ");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Truncate to a character budget, appending an ellipsis when a cut is made.
///
/// A budget of zero yields an empty string. Input within the budget is
/// returned unchanged.
pub fn truncate(input: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let sliced: String = input.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", sliced.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup_breaks_and_paragraphs() {
        let html = "<p>First line<br/>second line</p><p>next paragraph</p>";
        let text = strip_markup(html);
        assert_eq!(text, "First line\nsecond line\nnext paragraph");
    }

    #[test]
    fn test_strip_markup_drops_unknown_tags() {
        let html = "click <a href=\"http://example.com\">here</a> now";
        assert_eq!(strip_markup(html), "click here now");
    }

    #[test]
    fn test_strip_markup_decodes_entities() {
        assert_eq!(strip_markup("a&nbsp;&amp;&nbsp;b"), "a & b");
        assert_eq!(strip_markup("&lt;div&gt;"), "<div>");
        assert_eq!(strip_markup("it&#39;s &quot;fine&quot;"), "it's \"fine\"");
    }

    #[test]
    fn test_strip_markup_numeric_references() {
        assert_eq!(strip_markup("&#65;&#66;&#67;"), "ABC");
        assert_eq!(strip_markup("&#x41;&#x42;"), "AB");
        // Invalid code point is dropped, not an error.
        assert_eq!(strip_markup("a&#1114300;b"), "ab");
    }

    #[test]
    fn test_strip_markup_empty() {
        assert_eq!(strip_markup(""), "");
    }

    #[test]
    fn test_collapse_whitespace_runs() {
        assert_eq!(collapse_whitespace("a \t  b"), "a b");
        assert_eq!(collapse_whitespace("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_whitespace("  padded  "), "padded");
        assert_eq!(collapse_whitespace("a\u{00a0}b"), "a b");
    }

    #[test]
    fn test_truncate_within_budget() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exact", 5), "exact");
    }

    #[test]
    fn test_truncate_cuts_with_ellipsis() {
        let out = truncate("hello world", 8);
        assert!(out.ends_with('…'));
        assert!(out.chars().count() <= 8);
        assert_eq!(out, "hello w…");
    }

    #[test]
    fn test_truncate_trims_trailing_whitespace_at_cut() {
        assert_eq!(truncate("hello   world", 8), "hello…");
    }

    #[test]
    fn test_truncate_zero_budget() {
        assert_eq!(truncate("anything", 0), "");
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        assert_eq!(truncate("héllo", 5), "héllo");
        let out = truncate("héllo wörld", 7);
        assert!(out.chars().count() <= 7);
    }
}
