//! Visible-text extraction from a paragraph (§4.1).
//!
//! Field-code awareness is modeled as an explicit three-state enum per run,
//! per the "field-code state machine" design note — never inferred from
//! element position. Grounded structurally on the teacher's
//! `ooxml::docx::parts::document_part` text-extraction walk (which also
//! special-cases `w:t`/`w:tab`/`w:br`/`w:fldChar` while streaming), adapted
//! from a one-shot byte-offset scan into a per-run record keyed to DOM nodes
//! so replacement/matching can map back to them.

use indextree::NodeId;

use crate::xml::namespaces::{w, NS_W};
use crate::xml::XmlDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Outside,
    InCode,
    InResult,
}

/// The visible text contributed by one `w:r` element, plus whether any of it
/// came from inside a field result (`fldChar[type=separate]` .. `[type=end]`).
#[derive(Debug, Clone)]
pub struct TextRun {
    pub run_id: NodeId,
    pub text: String,
    pub is_field_result: bool,
}

/// Walk every `w:r` within `paragraph` (including ones nested inside tracked
/// change wrappers) in document order, applying the field-code state machine.
pub fn visible_runs(doc: &XmlDocument, paragraph: NodeId) -> Vec<TextRun> {
    doc.descendants(paragraph)
        .skip(1) // skip the paragraph element itself
        .filter(|&id| doc.is_element(id, NS_W, "r"))
        .map(|run| extract_run(doc, run))
        .collect()
}

fn extract_run(doc: &XmlDocument, run: NodeId) -> TextRun {
    let mut state = FieldState::Outside;
    let mut text = String::new();
    let mut is_field_result = false;

    for child in doc.children(run) {
        let Some((name, _)) = doc.get(child).and_then(|d| d.as_element()) else {
            continue;
        };
        if name.namespace != NS_W {
            continue;
        }
        match name.local() {
            "fldChar" => {
                if let Some(kind) = doc.attr(child, &w("fldCharType")) {
                    state = match kind {
                        "begin" => FieldState::InCode,
                        "separate" => FieldState::InResult,
                        "end" => FieldState::Outside,
                        _ => state,
                    };
                }
            }
            "instrText" => {
                if state != FieldState::InCode {
                    text.push_str(&doc.direct_text(child));
                    if state == FieldState::InResult {
                        is_field_result = true;
                    }
                }
            }
            "t" => {
                text.push_str(&doc.direct_text(child));
                if state == FieldState::InResult {
                    is_field_result = true;
                }
            }
            "tab" => {
                text.push('\t');
                if state == FieldState::InResult {
                    is_field_result = true;
                }
            }
            "br" => {
                text.push('\n');
                if state == FieldState::InResult {
                    is_field_result = true;
                }
            }
            _ => {}
        }
    }

    TextRun {
        run_id: run,
        text,
        is_field_result,
    }
}

/// The concatenation of every run's visible text, in document order.
pub fn paragraph_text(doc: &XmlDocument, paragraph: NodeId) -> String {
    visible_runs(doc, paragraph).into_iter().map(|r| r.text).collect()
}

/// Normalize text for bookmark-seed hashing: collapse whitespace runs and lowercase.
pub fn normalize_for_seed(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.extend(c.to_lowercase());
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::node::XmlNodeData;
    use crate::xml::xname::XName;

    fn w_el(local: &str) -> XName {
        XName::new(NS_W, local)
    }

    #[test]
    fn field_result_is_visible_and_flagged_while_code_is_suppressed() {
        let mut doc = XmlDocument::new();
        let p = doc.add_root(XmlNodeData::element(w_el("p")));
        let run = doc.add_child(p, XmlNodeData::element(w_el("r")));

        let begin = doc.add_child(run, XmlNodeData::element(w_el("fldChar")));
        doc.set_attr(begin, w("fldCharType"), "begin");
        let instr = doc.add_child(run, XmlNodeData::element(w_el("instrText")));
        doc.add_child(instr, XmlNodeData::text("PAGE"));
        let sep = doc.add_child(run, XmlNodeData::element(w_el("fldChar")));
        doc.set_attr(sep, w("fldCharType"), "separate");
        let t = doc.add_child(run, XmlNodeData::element(w_el("t")));
        doc.add_child(t, XmlNodeData::text("3"));
        let end = doc.add_child(run, XmlNodeData::element(w_el("fldChar")));
        doc.set_attr(end, w("fldCharType"), "end");

        let runs = visible_runs(&doc, p);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "3");
        assert!(runs[0].is_field_result);
    }

    #[test]
    fn tab_and_break_map_to_control_characters() {
        let mut doc = XmlDocument::new();
        let p = doc.add_root(XmlNodeData::element(w_el("p")));
        let run = doc.add_child(p, XmlNodeData::element(w_el("r")));
        doc.add_child(run, XmlNodeData::element(w_el("tab")));
        let t = doc.add_child(run, XmlNodeData::element(w_el("t")));
        doc.add_child(t, XmlNodeData::text("x"));
        doc.add_child(run, XmlNodeData::element(w_el("br")));

        assert_eq!(paragraph_text(&doc, p), "\tx\n");
    }
}
