//! Footnote CRUD and display numbering (§4.8).
//!
//! Part bootstrap (templates, content type, relationship) lives on the
//! `Document` facade, next to the equivalent comment-part bootstrap; this
//! module only touches already-parsed DOMs. Anchor placement reuses the
//! unique-substring matcher and the run-splitting primitives `replace.rs`
//! exposes for text replacement, rather than re-deriving run offsets here.

use indextree::NodeId;

use crate::error::{Error, Result};
use crate::xml::namespaces::{w, xml_ns, NS_W};
use crate::xml::node::XmlNodeData;
use crate::xml::xname::XAttribute;
use crate::xml::XmlDocument;

use super::matching::{find_unique_substring_match, MatchOutcome};
use super::replace::{map_visible_range, split_before};
use super::text::{paragraph_text, visible_runs};

/// Footnote ids Word reserves for the separator/continuation-separator
/// bodies; never shown to the reader and excluded from display numbering.
const RESERVED_IDS: [i64; 2] = [-1, 0];

/// A footnote as read from `word/footnotes.xml`, joined with its reference
/// in the document body (spec §3 Footnote).
#[derive(Debug, Clone, PartialEq)]
pub struct Footnote {
    pub id: i64,
    pub display_number: u32,
    pub text: String,
    pub anchored_paragraph_id: Option<String>,
}

fn footnote_elements(footnotes_doc: &XmlDocument) -> Vec<NodeId> {
    let Some(root) = footnotes_doc.root() else { return Vec::new() };
    footnotes_doc.children(root).filter(|&c| footnotes_doc.is_element(c, NS_W, "footnote")).collect()
}

fn footnote_id(footnotes_doc: &XmlDocument, footnote: NodeId) -> Option<i64> {
    footnotes_doc.attr(footnote, &w("id")).and_then(|v| v.parse().ok())
}

/// `footnoteId -> displayNumber`, assigned 1..N by first-seen order of
/// `w:footnoteReference` in the document body, skipping reserved ids.
pub fn display_numbering(document: &XmlDocument, document_root: NodeId) -> std::collections::HashMap<i64, u32> {
    let mut map = std::collections::HashMap::new();
    let mut next = 1u32;
    for node in document.descendants(document_root) {
        if !document.is_element(node, NS_W, "footnoteReference") {
            continue;
        }
        let Some(id) = document.attr(node, &w("id")).and_then(|v| v.parse::<i64>().ok()) else { continue };
        if RESERVED_IDS.contains(&id) || map.contains_key(&id) {
            continue;
        }
        map.insert(id, next);
        next += 1;
    }
    map
}

/// Read every footnote, joined against the body's reference markup for its
/// anchor paragraph and against [`display_numbering`] for its reader-facing
/// number.
pub fn read_footnotes(document: &XmlDocument, document_root: NodeId, footnotes_doc: &XmlDocument) -> Vec<Footnote> {
    let numbering = display_numbering(document, document_root);
    footnote_elements(footnotes_doc)
        .into_iter()
        .filter_map(|fe| {
            let id = footnote_id(footnotes_doc, fe)?;
            if RESERVED_IDS.contains(&id) {
                return None;
            }
            let text = footnote_body_text(footnotes_doc, fe);
            let anchored_paragraph_id = find_anchor(document, document_root, id);
            let display_number = numbering.get(&id).copied().unwrap_or(0);
            Some(Footnote { id, display_number, text, anchored_paragraph_id })
        })
        .collect()
}

fn footnote_body_text(footnotes_doc: &XmlDocument, footnote: NodeId) -> String {
    footnotes_doc
        .descendants(footnote)
        .filter(|&n| footnotes_doc.is_element(n, NS_W, "t"))
        .map(|n| footnotes_doc.direct_text(n))
        .collect()
}

fn find_anchor(document: &XmlDocument, document_root: NodeId, id: i64) -> Option<String> {
    let id_str = id.to_string();
    let reference = document
        .descendants(document_root)
        .find(|&n| document.is_element(n, NS_W, "footnoteReference") && document.attr(n, &w("id")) == Some(id_str.as_str()))?;
    let p = document.ancestors(reference).find(|&a| document.is_element(a, NS_W, "p"))?;
    super::bookmark::get_paragraph_bookmark_id(document, p)
}

fn next_footnote_id(footnotes_doc: &XmlDocument) -> i64 {
    footnote_elements(footnotes_doc)
        .iter()
        .filter_map(|&fe| footnote_id(footnotes_doc, fe))
        .filter(|id| !RESERVED_IDS.contains(id))
        .max()
        .map_or(1, |m| m + 1)
}

/// `addFootnote`: insert a reference into `paragraph` and append its body to
/// `footnotes_doc`. If `after_text` is given, the reference is placed right
/// after the unique match for it in the paragraph's visible text; otherwise
/// it is appended at the end of the paragraph.
pub fn add(document: &mut XmlDocument, footnotes_doc: &mut XmlDocument, paragraph: NodeId, text: &str, after_text: Option<&str>) -> Result<i64> {
    let id = next_footnote_id(footnotes_doc);
    insert_reference(document, paragraph, after_text, id)?;
    append_footnote_body(footnotes_doc, id, text);
    Ok(id)
}

fn insert_reference(document: &mut XmlDocument, paragraph: NodeId, after_text: Option<&str>, id: i64) -> Result<()> {
    let reference_run = build_reference_run(document, id);
    let Some(after_text) = after_text else {
        document.append(paragraph, reference_run);
        return Ok(());
    };

    let haystack = paragraph_text(document, paragraph);
    let offset = match find_unique_substring_match(&haystack, after_text) {
        MatchOutcome::Unique { end, .. } => end,
        MatchOutcome::Multiple => {
            return Err(Error::InvalidArgument(format!("{after_text:?} matches more than one location")));
        }
        MatchOutcome::NotFound => {
            return Err(Error::InvalidArgument(format!("{after_text:?} not found in paragraph")));
        }
    };

    let (_, _, end_run, end_local) = map_visible_range(document, paragraph, offset, offset)?;
    let runs = visible_runs(document, paragraph);
    match runs.get(end_run) {
        None => document.append(paragraph, reference_run),
        Some(r) => {
            let run_len: usize = r.text.chars().count();
            if end_local == 0 {
                document.insert_before(reference_run, r.run_id);
            } else if end_local >= run_len {
                document.insert_after(reference_run, r.run_id);
            } else {
                let (_, tail) = split_before(document, r.run_id, end_local);
                document.insert_before(reference_run, tail);
            }
        }
    }
    Ok(())
}

fn build_reference_run(doc: &mut XmlDocument, id: i64) -> NodeId {
    let run = doc.new_node(XmlNodeData::element(w("r")));
    let rpr = doc.new_node(XmlNodeData::element(w("rPr")));
    let rstyle = doc.new_node(XmlNodeData::element_with_attrs(w("rStyle"), vec![XAttribute::new(w("val"), "FootnoteReference")]));
    doc.append(rpr, rstyle);
    doc.append(run, rpr);
    let reference = doc.new_node(XmlNodeData::element_with_attrs(w("footnoteReference"), vec![XAttribute::new(w("id"), id.to_string())]));
    doc.append(run, reference);
    run
}

fn append_footnote_body(footnotes_doc: &mut XmlDocument, id: i64, text: &str) {
    let root = footnotes_doc.root().expect("footnotes doc has a root");
    let footnote = footnotes_doc.new_node(XmlNodeData::element_with_attrs(w("footnote"), vec![XAttribute::new(w("id"), id.to_string())]));
    let p = footnotes_doc.new_node(XmlNodeData::element(w("p")));

    let ppr = footnotes_doc.new_node(XmlNodeData::element(w("pPr")));
    let pstyle = footnotes_doc.new_node(XmlNodeData::element_with_attrs(w("pStyle"), vec![XAttribute::new(w("val"), "FootnoteText")]));
    footnotes_doc.append(ppr, pstyle);
    footnotes_doc.append(p, ppr);

    let ref_run = build_footnote_ref_run(footnotes_doc);
    footnotes_doc.append(p, ref_run);
    let space_run = build_space_run(footnotes_doc);
    footnotes_doc.append(p, space_run);
    let text_run = build_text_run(footnotes_doc, text);
    footnotes_doc.append(p, text_run);

    footnotes_doc.append(footnote, p);
    footnotes_doc.append(root, footnote);
}

fn build_footnote_ref_run(doc: &mut XmlDocument) -> NodeId {
    let run = doc.new_node(XmlNodeData::element(w("r")));
    let rpr = doc.new_node(XmlNodeData::element(w("rPr")));
    let rstyle = doc.new_node(XmlNodeData::element_with_attrs(w("rStyle"), vec![XAttribute::new(w("val"), "FootnoteReference")]));
    doc.append(rpr, rstyle);
    doc.append(run, rpr);
    let footnote_ref = doc.new_node(XmlNodeData::element(w("footnoteRef")));
    doc.append(run, footnote_ref);
    run
}

fn build_space_run(doc: &mut XmlDocument) -> NodeId {
    let run = doc.new_node(XmlNodeData::element(w("r")));
    let t = doc.new_node(XmlNodeData::element_with_attrs(w("t"), vec![XAttribute::new(xml_ns("space"), "preserve")]));
    let text = doc.new_node(XmlNodeData::text(" "));
    doc.append(t, text);
    doc.append(run, t);
    run
}

fn build_text_run(doc: &mut XmlDocument, text: &str) -> NodeId {
    let run = doc.new_node(XmlNodeData::element(w("r")));
    let t = doc.new_node(XmlNodeData::element(w("t")));
    let text_node = doc.new_node(XmlNodeData::text(text));
    doc.append(t, text_node);
    doc.append(run, t);
    run
}

/// `updateFootnoteText`: replace the body text of footnote `id`, keeping its
/// `footnoteRef` run but discarding every other run in the first body
/// paragraph.
pub fn update_text(footnotes_doc: &mut XmlDocument, id: i64, text: &str) -> Result<()> {
    let footnote = footnote_elements(footnotes_doc)
        .into_iter()
        .find(|&fe| footnote_id(footnotes_doc, fe) == Some(id))
        .ok_or_else(|| Error::InvalidArgument(format!("no footnote with id {id}")))?;
    let p = footnotes_doc
        .children(footnote)
        .find(|&c| footnotes_doc.is_element(c, NS_W, "p"))
        .ok_or_else(|| Error::InvalidArgument(format!("footnote {id} has no body paragraph")))?;

    let to_remove: Vec<NodeId> = footnotes_doc
        .children(p)
        .filter(|&c| footnotes_doc.is_element(c, NS_W, "r"))
        .filter(|&r| !run_contains_footnote_ref(footnotes_doc, r))
        .collect();
    for r in to_remove {
        footnotes_doc.remove_subtree(r);
    }

    let space_run = build_space_run(footnotes_doc);
    let text_run = build_text_run(footnotes_doc, text);
    footnotes_doc.append(p, space_run);
    footnotes_doc.append(p, text_run);
    Ok(())
}

fn run_contains_footnote_ref(doc: &XmlDocument, run: NodeId) -> bool {
    doc.children(run).any(|c| doc.is_element(c, NS_W, "footnoteRef"))
}

/// `deleteFootnote`: remove the footnote body and every reference to it in
/// the document body (element-first; the enclosing run is removed too if it
/// is left with no other content).
pub fn delete(document: &mut XmlDocument, document_root: NodeId, footnotes_doc: &mut XmlDocument, id: i64) -> Result<()> {
    let footnote = footnote_elements(footnotes_doc)
        .into_iter()
        .find(|&fe| footnote_id(footnotes_doc, fe) == Some(id))
        .ok_or_else(|| Error::InvalidArgument(format!("no footnote with id {id}")))?;
    footnotes_doc.remove_subtree(footnote);

    let id_str = id.to_string();
    let references: Vec<NodeId> = document
        .descendants(document_root)
        .filter(|&n| document.is_element(n, NS_W, "footnoteReference") && document.attr(n, &w("id")) == Some(id_str.as_str()))
        .collect();
    for reference in references {
        let parent_run = document.parent(reference);
        document.remove_subtree(reference);
        if let Some(run) = parent_run {
            if is_run_empty_of_visible_content(document, run) {
                document.remove_subtree(run);
            }
        }
    }
    Ok(())
}

fn is_run_empty_of_visible_content(doc: &XmlDocument, run: NodeId) -> bool {
    doc.children(run).all(|c| doc.is_element(c, NS_W, "rPr"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::namespaces::w;

    fn doc_with_paragraph(text: &str) -> (XmlDocument, NodeId) {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let p = doc.add_child(body, XmlNodeData::element(w("p")));
        let r = doc.add_child(p, XmlNodeData::element(w("r")));
        let t = doc.add_child(r, XmlNodeData::element(w("t")));
        doc.add_child(t, XmlNodeData::text(text));
        (doc, p)
    }

    fn fresh_footnotes_doc() -> XmlDocument {
        crate::xml::parse_document(crate::docx::templates::default_footnotes_xml().as_bytes()).unwrap()
    }

    #[test]
    fn add_appends_reference_after_matched_text_and_body() {
        let (mut document, p) = doc_with_paragraph("The quick brown fox");
        let mut footnotes = fresh_footnotes_doc();

        let id = add(&mut document, &mut footnotes, p, "see citation", Some("quick")).unwrap();
        assert_eq!(id, 1);

        let refs: Vec<NodeId> = document.descendants(p).filter(|&n| document.is_element(n, NS_W, "footnoteReference")).collect();
        assert_eq!(refs.len(), 1);

        let numbering = display_numbering(&document, p);
        assert_eq!(numbering.get(&1), Some(&1));

        let footnotes_read = read_footnotes(&document, p, &footnotes);
        assert_eq!(footnotes_read.len(), 1);
        assert_eq!(footnotes_read[0].text, "see citation");
    }

    #[test]
    fn delete_removes_body_and_body_reference() {
        let (mut document, p) = doc_with_paragraph("alpha beta");
        let mut footnotes = fresh_footnotes_doc();
        let id = add(&mut document, &mut footnotes, p, "note", None).unwrap();

        delete(&mut document, p, &mut footnotes, id).unwrap();
        assert!(!document.descendants(p).any(|n| document.is_element(n, NS_W, "footnoteReference")));
        assert!(read_footnotes(&document, p, &footnotes).is_empty());
    }

    #[test]
    fn reserved_ids_excluded_from_display_numbering() {
        let footnotes = fresh_footnotes_doc();
        let ids: Vec<i64> = footnote_elements(&footnotes).iter().filter_map(|&fe| footnote_id(&footnotes, fe)).collect();
        assert!(ids.contains(&-1));
        assert!(ids.contains(&0));
        assert!(RESERVED_IDS.iter().all(|r| ids.contains(r)));
    }
}
