//! Unique substring resolution (§4.9).
//!
//! No teacher precedent builds this progressively-looser normalization
//! pipeline; it is implemented directly from the spec. Each mode is a
//! transform applied identically to haystack and needle that also maintains
//! a per-character offset map back into the *original* haystack, so a match
//! found under a normalized mode still reports byte offsets the caller can
//! slice the original string with.

/// Outcome of [`find_unique_substring_match`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Unique { start: usize, end: usize, matched_text: String },
    Multiple,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Exact,
    QuoteNormalized,
    FlexibleWhitespace,
    QuoteOptional,
}

const MODES: [Mode; 4] = [
    Mode::Exact,
    Mode::QuoteNormalized,
    Mode::FlexibleWhitespace,
    Mode::QuoteOptional,
];

/// A normalized string plus, for every byte offset in the normalized string,
/// the corresponding *starting* byte offset in the original string.
struct Normalized {
    text: String,
    /// `offsets[i]` = original-string byte offset of `text`'s byte `i`.
    offsets: Vec<usize>,
}

fn is_smart_quote(c: char) -> bool {
    matches!(c, '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}' | '\u{2032}' | '\u{2033}')
}

fn normalize_quote(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{2032}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{2033}' => '"',
        other => other,
    }
}

fn is_quote_char(c: char) -> bool {
    matches!(c, '"' | '\'') || is_smart_quote(c)
}

/// Apply the transform for `mode` to `input`, returning the normalized text
/// plus its origin-offset map.
fn normalize(input: &str, mode: Mode) -> Normalized {
    let mut text = String::with_capacity(input.len());
    let mut offsets = Vec::with_capacity(input.len());
    let mut prev_was_space = false;

    for (byte_off, c) in input.char_indices() {
        let quote_normalized = if mode != Mode::Exact { normalize_quote(c) } else { c };

        let collapse_whitespace = matches!(mode, Mode::FlexibleWhitespace | Mode::QuoteOptional);
        if collapse_whitespace && quote_normalized.is_whitespace() {
            if prev_was_space {
                continue;
            }
            prev_was_space = true;
            text.push(' ');
            offsets.push(byte_off);
            continue;
        }
        prev_was_space = false;

        let strip_quotes = mode == Mode::QuoteOptional;
        if strip_quotes && is_quote_char(quote_normalized) {
            continue;
        }

        let start = text.len();
        text.push(quote_normalized);
        for _ in start..text.len() {
            offsets.push(byte_off);
        }
    }

    Normalized { text, offsets }
}

/// Count non-overlapping matches of `needle` in `haystack`, returning the
/// list of (start, end) byte ranges in `haystack`.
fn find_all_matches(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    if needle.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut search_from = 0;
    while let Some(rel) = haystack[search_from..].find(needle) {
        let start = search_from + rel;
        let end = start + needle.len();
        out.push((start, end));
        search_from = end;
    }
    out
}

/// Resolve `needle` against `haystack` by progressively looser normalization,
/// returning byte offsets into the *original* `haystack`.
pub fn find_unique_substring_match(haystack: &str, needle: &str) -> MatchOutcome {
    for &mode in &MODES {
        let norm_hay = normalize(haystack, mode);
        let norm_needle = normalize(needle, mode);
        let matches = find_all_matches(&norm_hay.text, &norm_needle.text);
        match matches.len() {
            0 => continue,
            1 => {
                let (n_start, n_end) = matches[0];
                let start = norm_hay.offsets.get(n_start).copied().unwrap_or(haystack.len());
                let end = if n_end < norm_hay.offsets.len() {
                    norm_hay.offsets[n_end]
                } else {
                    haystack.len()
                };
                return MatchOutcome::Unique {
                    start,
                    end,
                    matched_text: haystack[start..end].to_string(),
                };
            }
            _ => return MatchOutcome::Multiple,
        }
    }
    MatchOutcome::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_found_first() {
        let outcome = find_unique_substring_match("hello world", "world");
        assert_eq!(
            outcome,
            MatchOutcome::Unique { start: 6, end: 11, matched_text: "world".to_string() }
        );
    }

    #[test]
    fn smart_quotes_resolve_under_quote_normalized() {
        let haystack = "A \u{201C}smart\u{201D} quote";
        let needle = "A \"smart\" quote";
        let outcome = find_unique_substring_match(haystack, needle);
        match outcome {
            MatchOutcome::Unique { start, end, matched_text } => {
                assert_eq!(start, 0);
                assert_eq!(end, haystack.len());
                assert_eq!(matched_text, haystack);
            }
            other => panic!("expected unique match, got {other:?}"),
        }
    }

    #[test]
    fn multiple_hits_reported_as_multiple() {
        let outcome = find_unique_substring_match("cat cat cat", "cat");
        assert_eq!(outcome, MatchOutcome::Multiple);
    }

    #[test]
    fn no_hits_in_any_mode_is_not_found() {
        let outcome = find_unique_substring_match("hello", "xyz");
        assert_eq!(outcome, MatchOutcome::NotFound);
    }

    #[test]
    fn flexible_whitespace_collapses_runs() {
        let haystack = "word   gap";
        let needle = "word gap";
        let outcome = find_unique_substring_match(haystack, needle);
        assert!(matches!(outcome, MatchOutcome::Unique { .. }));
    }
}
