//! Document view projection (§4.10): the read-only, paragraph-by-paragraph
//! rendering consumers use instead of walking raw WordprocessingML — list
//! labels resolved, styles resolved, headers split out, formatting reduced
//! to a small tag vocabulary, and paragraphs grouped into named style
//! buckets.
//!
//! No teacher precedent builds this projection; litchi is a read/write
//! editing layer with no rendering concern. Each sub-module documents its
//! own grounding; this file only wires them into one per-paragraph pass.

pub mod fingerprint;
pub mod format_tags;
pub mod header;
pub mod numbering;
pub mod styles;

use indextree::NodeId;

use crate::opc::Relationships;
use crate::xml::XmlDocument;

use self::fingerprint::StyleFingerprint;
use self::format_tags::ModalBaseline;
use self::header::HeaderResult;
use self::numbering::{ListLabel, Numbering, NumberingState};
use self::styles::{ParagraphFormatting, RunFormatting, StyleSheet};

use super::bookmark::get_paragraph_bookmark_id;
use super::text::paragraph_text;

#[derive(Debug, Clone, Copy)]
pub struct DocumentViewOptions {
    /// Render `tagged_text` (§4.10's optional formatting-tag projection).
    /// Off by default: most consumers only need `clean_text`.
    pub emit_formatting_tags: bool,
}

impl Default for DocumentViewOptions {
    fn default() -> Self {
        Self { emit_formatting_tags: false }
    }
}

/// One paragraph's projected view.
#[derive(Debug, Clone)]
pub struct DocumentViewNode {
    pub paragraph: NodeId,
    pub id: Option<String>,
    pub clean_text: String,
    pub tagged_text: Option<String>,
    pub header: Option<String>,
    pub header_formatting: Option<RunFormatting>,
    pub body_run_formatting: Option<RunFormatting>,
    pub list_label: Option<ListLabel>,
    pub style_fingerprint: String,
    pub paragraph_style_id: Option<String>,
    pub paragraph_alignment: Option<String>,
    pub left_indent_pt: Option<i32>,
    pub first_line_indent_pt: Option<i32>,
    pub num_id: Option<u32>,
    pub ilvl: Option<u32>,
    pub is_auto_numbered: bool,
}

/// `buildDocumentView`: project every paragraph in `paragraphs` (document
/// order) into a [`DocumentViewNode`], threading numbering counter state and
/// the style-fingerprint grouping across the whole pass.
pub fn build_document_view(
    doc: &XmlDocument,
    paragraphs: &[NodeId],
    styles: &StyleSheet,
    numbering: &Numbering,
    rels: Option<&Relationships>,
    options: DocumentViewOptions,
) -> Vec<DocumentViewNode> {
    let mut num_state = NumberingState::new();

    let per_paragraph: Vec<(NodeId, ParagraphFormatting, Option<String>, Option<HeaderResult>, Option<ListLabel>)> =
        paragraphs
            .iter()
            .map(|&p| {
                let fmt = styles.paragraph_formatting(doc, p);
                let style_id = styles.paragraph_style_id(doc, p);
                let header = header::detect_header(doc, styles, p);
                let label = match (fmt.num_id, fmt.ilvl) {
                    (Some(num_id), Some(ilvl)) => num_state.resolve(numbering, num_id, ilvl),
                    _ => None,
                };
                (p, fmt, style_id, header, label)
            })
            .collect();

    let baseline = if options.emit_formatting_tags {
        let body_paragraphs: Vec<NodeId> =
            per_paragraph.iter().filter(|(_, _, _, header, _)| header.is_none()).map(|(p, ..)| *p).collect();
        format_tags::compute_modal_baseline(doc, styles, &body_paragraphs)
    } else {
        ModalBaseline::default()
    };

    let fingerprints: Vec<(NodeId, StyleFingerprint)> = per_paragraph
        .iter()
        .map(|(p, fmt, style_id, ..)| (*p, StyleFingerprint::compute(styles, fmt, style_id.as_deref())))
        .collect();
    let groups = fingerprint::group_paragraphs(&fingerprints);
    let mut semantic_id_of: std::collections::HashMap<NodeId, String> = std::collections::HashMap::new();
    for group in &groups {
        for &member in &group.members {
            semantic_id_of.insert(member, group.semantic_id.clone());
        }
    }

    per_paragraph
        .into_iter()
        .map(|(p, fmt, style_id, header, label)| {
            let clean_text = paragraph_text(doc, p);
            let skip_chars = header.as_ref().map(|h| h.header_text.chars().count()).unwrap_or(0);

            let tagged_text = options
                .emit_formatting_tags
                .then(|| format_tags::render_formatting_tags(doc, styles, p, skip_chars, baseline, rels));

            let header_formatting = header.as_ref().and_then(|_| {
                super::text::visible_runs(doc, p).first().map(|r| styles.run_formatting(doc, p, r.run_id))
            });
            let body_run_formatting =
                super::text::visible_runs(doc, p).last().map(|r| styles.run_formatting(doc, p, r.run_id));

            DocumentViewNode {
                id: get_paragraph_bookmark_id(doc, p),
                paragraph: p,
                clean_text,
                tagged_text,
                header: header.map(|h| h.header_text),
                header_formatting,
                body_run_formatting,
                is_auto_numbered: label.as_ref().map(|l| l.is_auto_numbered).unwrap_or(false),
                list_label: label,
                style_fingerprint: semantic_id_of.get(&p).cloned().unwrap_or_default(),
                paragraph_style_id: style_id,
                paragraph_alignment: fmt.alignment,
                left_indent_pt: fmt.left_indent_twips.map(|t| (t as f64 / 20.0).round() as i32),
                first_line_indent_pt: fmt.first_line_indent_twips.map(|t| (t as f64 / 20.0).round() as i32),
                num_id: fmt.num_id,
                ilvl: fmt.ilvl,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::namespaces::w;
    use crate::xml::node::XmlNodeData;

    fn plain_paragraph(doc: &mut XmlDocument, parent: NodeId, text: &str) -> NodeId {
        let p = doc.add_child(parent, XmlNodeData::element(w("p")));
        let r = doc.add_child(p, XmlNodeData::element(w("r")));
        let t = doc.add_child(r, XmlNodeData::element(w("t")));
        doc.add_child(t, XmlNodeData::text(text));
        p
    }

    #[test]
    fn builds_one_view_node_per_paragraph_with_clean_text() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let p1 = plain_paragraph(&mut doc, body, "First paragraph.");
        let p2 = plain_paragraph(&mut doc, body, "Second paragraph.");

        let styles = StyleSheet::default();
        let numbering = Numbering::default();
        let nodes = build_document_view(&doc, &[p1, p2], &styles, &numbering, None, DocumentViewOptions::default());

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].clean_text, "First paragraph.");
        assert_eq!(nodes[1].clean_text, "Second paragraph.");
        assert!(nodes[0].tagged_text.is_none());
    }

    #[test]
    fn formatting_tags_are_only_rendered_when_requested() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let p = plain_paragraph(&mut doc, body, "Body text.");

        let styles = StyleSheet::default();
        let numbering = Numbering::default();
        let opts = DocumentViewOptions { emit_formatting_tags: true };
        let nodes = build_document_view(&doc, &[p], &styles, &numbering, None, opts);
        assert!(nodes[0].tagged_text.is_some());
    }

    #[test]
    fn repeated_plain_paragraphs_share_a_body_fingerprint() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let p1 = plain_paragraph(&mut doc, body, "One.");
        let p2 = plain_paragraph(&mut doc, body, "Two.");

        let styles = StyleSheet::default();
        let numbering = Numbering::default();
        let nodes = build_document_view(&doc, &[p1, p2], &styles, &numbering, None, DocumentViewOptions::default());
        assert_eq!(nodes[0].style_fingerprint, "body");
        assert_eq!(nodes[1].style_fingerprint, "body");
    }
}
