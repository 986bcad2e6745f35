//! Header detection (§4.10): split a paragraph's visible text into an
//! optional header prefix and the remaining body text.
//!
//! No teacher or pack precedent attempts this; the run-in strategy (longest
//! emphasized prefix ending in sentence punctuation) and the pattern
//! fallback are both built directly from the spec, using `once_cell` +
//! `regex` the way the rest of this crate reaches for them (definition-span
//! detection in `format_tags.rs` shares the same two regexes' style).

use indextree::NodeId;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::xml::XmlDocument;

use super::styles::StyleSheet;
use crate::docx::text::visible_runs;

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderResult {
    pub header_text: String,
    pub body_text: String,
}

const HEADER_TERMINATORS: [char; 3] = ['.', ':', '-'];

/// `detectHeader`: run-in strategy first, pattern fallback second.
pub fn detect_header(doc: &XmlDocument, styles: &StyleSheet, p: NodeId) -> Option<HeaderResult> {
    run_in_header(doc, styles, p).or_else(|| pattern_header(doc, p))
}

fn run_in_header(doc: &XmlDocument, styles: &StyleSheet, p: NodeId) -> Option<HeaderResult> {
    let runs = visible_runs(doc, p);
    if runs.is_empty() {
        return None;
    }

    let mut prefix_len_chars = 0usize;
    let mut prefix_text = String::new();
    for run in &runs {
        let fmt = styles.run_formatting(doc, p, run.run_id);
        if !fmt.is_emphasized() {
            break;
        }
        prefix_text.push_str(&run.text);
        prefix_len_chars += run.text.chars().count();
    }
    if prefix_text.is_empty() {
        return None;
    }

    let trimmed = prefix_text.trim_end();
    if !trimmed.ends_with(HEADER_TERMINATORS.as_slice()) {
        return None;
    }

    let full_text: String = runs.iter().map(|r| r.text.as_str()).collect();
    let body: String = full_text.chars().skip(prefix_len_chars).collect();
    Some(HeaderResult { header_text: trimmed.trim().to_string(), body_text: body.trim_start().to_string() })
}

static PATTERN_TERMINATED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z][\w'’\-]*(?:\s+[\w'’\-]+){0,7})\s*[.:]\s+(\S.*)?$").expect("valid regex"));

static PATTERN_TITLE_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:[A-Z][\w'’\-]*\s+){1,4}[A-Z][\w'’\-]*)\s+([a-z].*)$").expect("valid regex"));

fn pattern_header(doc: &XmlDocument, p: NodeId) -> Option<HeaderResult> {
    let text = crate::docx::text::paragraph_text(doc, p);
    let trimmed = text.trim_start();

    if let Some(caps) = PATTERN_TERMINATED.captures(trimmed) {
        let header = caps.get(1)?.as_str().to_string();
        let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string();
        return Some(HeaderResult { header_text: header, body_text: rest });
    }
    if let Some(caps) = PATTERN_TITLE_CASE.captures(trimmed) {
        let header = caps.get(1)?.as_str().trim().to_string();
        if header.split_whitespace().count() <= 5 {
            let rest = caps.get(2)?.as_str().to_string();
            return Some(HeaderResult { header_text: header, body_text: rest });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::namespaces::{w, NS_W};
    use crate::xml::node::XmlNodeData;

    fn paragraph_with_runs(doc: &mut XmlDocument, parts: &[(&str, bool)]) -> NodeId {
        let p = doc.add_child(doc.root().unwrap(), XmlNodeData::element(w("p")));
        for &(text, bold) in parts {
            let r = doc.add_child(p, XmlNodeData::element(w("r")));
            if bold {
                let rpr = doc.add_child(r, XmlNodeData::element(w("rPr")));
                doc.add_child(rpr, XmlNodeData::element(w("b")));
            }
            let t = doc.add_child(r, XmlNodeData::element(w("t")));
            doc.add_child(t, XmlNodeData::text(text));
        }
        p
    }

    #[test]
    fn run_in_bold_prefix_ending_in_colon_becomes_header() {
        let mut doc = XmlDocument::new();
        doc.add_root(XmlNodeData::element(w("body")));
        let p = paragraph_with_runs(&mut doc, &[("Termination:", true), (" Either party may end this.", false)]);
        let styles = StyleSheet::default();

        let result = detect_header(&doc, &styles, p).unwrap();
        assert_eq!(result.header_text, "Termination:");
        assert_eq!(result.body_text, "Either party may end this.");
    }

    #[test]
    fn no_emphasis_and_no_pattern_match_yields_no_header() {
        let mut doc = XmlDocument::new();
        doc.add_root(XmlNodeData::element(w("body")));
        let p = paragraph_with_runs(&mut doc, &[("just a plain sentence with no structure", false)]);
        let styles = StyleSheet::default();
        assert!(detect_header(&doc, &styles, p).is_none());
        assert!(doc.descendants(p).all(|n| !doc.is_element(n, NS_W, "tbl")));
    }

    #[test]
    fn pattern_fallback_matches_capitalized_segment_before_colon() {
        let mut doc = XmlDocument::new();
        doc.add_root(XmlNodeData::element(w("body")));
        let p = paragraph_with_runs(&mut doc, &[("Scope of work: the contractor shall perform.", false)]);
        let styles = StyleSheet::default();
        let result = detect_header(&doc, &styles, p).unwrap();
        assert_eq!(result.header_text, "Scope of work");
    }
}
