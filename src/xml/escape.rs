//! XML text/attribute escaping.
//!
//! Adapted near-verbatim from the teacher's `common::xml::escape` module,
//! which builds `aho_corasick` automatons once (via `once_cell::sync::Lazy`)
//! rather than doing a chain of `str::replace` calls per string.

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

static ESCAPE_PATTERNS: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(["&", "<", ">", "\"", "'"]).expect("fixed pattern set always compiles")
});
const ESCAPE_REPLACEMENTS: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"];

static UNESCAPE_PATTERNS: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(["&amp;", "&lt;", "&gt;", "&quot;", "&apos;", "&#39;"])
        .expect("fixed pattern set always compiles")
});
const UNESCAPE_REPLACEMENTS: [&str; 6] = ["&", "<", ">", "\"", "'", "'"];

/// Escape the five XML-reserved characters for use in text content or
/// double-quoted attribute values.
pub fn escape_xml(input: &str) -> String {
    if !input.as_bytes().iter().any(|b| matches!(b, b'&' | b'<' | b'>' | b'"' | b'\'')) {
        return input.to_string();
    }
    ESCAPE_PATTERNS.replace_all(input, &ESCAPE_REPLACEMENTS)
}

/// Reverse of [`escape_xml`], tolerant of the numeric apostrophe entity.
pub fn unescape_xml(input: &str) -> String {
    if !input.as_bytes().contains(&b'&') {
        return input.to_string();
    }
    UNESCAPE_PATTERNS.replace_all(input, &UNESCAPE_REPLACEMENTS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_five() {
        assert_eq!(escape_xml("<a>&\"'"), "&lt;a&gt;&amp;&quot;&apos;");
    }

    #[test]
    fn roundtrip() {
        let s = "a <b> & \"c\" 'd'";
        assert_eq!(unescape_xml(&escape_xml(s)), s);
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(escape_xml("plain text"), "plain text");
    }
}
