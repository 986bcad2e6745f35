//! Read-only structural validation (§4.12).
//!
//! Every check here is non-destructive; per spec §6 propagation policy,
//! validator output is advisory metadata, never an error that blocks a
//! write. Grounded structurally on the field-code state machine in
//! `text.rs` (the unmatched-`fldChar` check is the same begin/separate/end
//! tracking, generalized from one paragraph to the whole subtree and turned
//! into a mismatch detector instead of a text extractor).

use std::collections::HashMap;

use indextree::NodeId;

use crate::xml::namespaces::{w, NS_W, REVISION_WRAPPER_ELEMENTS};
use crate::xml::XmlDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationWarningKind {
    OrphanBookmarkStart,
    OrphanBookmarkEnd,
    TrackedChangeMissingAttribute,
    EmptyTrackedChange,
    UnmatchedFieldBegin,
    UnmatchedFieldEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub kind: ValidationWarningKind,
    pub message: String,
    pub node: Option<NodeId>,
}

/// `validate`: run every check over `document_root`'s subtree.
pub fn validate(doc: &XmlDocument, document_root: NodeId) -> Vec<ValidationWarning> {
    let mut warnings = orphan_bookmark_warnings(doc, document_root);
    warnings.extend(tracked_change_warnings(doc, document_root));
    warnings.extend(unmatched_field_marker_warnings(doc, document_root));
    warnings
}

fn orphan_bookmark_warnings(doc: &XmlDocument, root: NodeId) -> Vec<ValidationWarning> {
    let mut starts: HashMap<String, NodeId> = HashMap::new();
    let mut ends: HashMap<String, NodeId> = HashMap::new();
    for n in doc.descendants(root) {
        if doc.is_element(n, NS_W, "bookmarkStart") {
            if let Some(id) = doc.attr(n, &w("id")) {
                starts.insert(id.to_string(), n);
            }
        } else if doc.is_element(n, NS_W, "bookmarkEnd") {
            if let Some(id) = doc.attr(n, &w("id")) {
                ends.insert(id.to_string(), n);
            }
        }
    }

    let mut out = Vec::new();
    for (id, &node) in &starts {
        if !ends.contains_key(id) {
            out.push(ValidationWarning {
                kind: ValidationWarningKind::OrphanBookmarkStart,
                message: format!("bookmarkStart id={id} has no matching bookmarkEnd"),
                node: Some(node),
            });
        }
    }
    for (id, &node) in &ends {
        if !starts.contains_key(id) {
            out.push(ValidationWarning {
                kind: ValidationWarningKind::OrphanBookmarkEnd,
                message: format!("bookmarkEnd id={id} has no matching bookmarkStart"),
                node: Some(node),
            });
        }
    }
    out
}

fn tracked_change_warnings(doc: &XmlDocument, root: NodeId) -> Vec<ValidationWarning> {
    let mut out = Vec::new();
    for n in doc.descendants(root) {
        if !REVISION_WRAPPER_ELEMENTS.iter().any(|&local| doc.is_element(n, NS_W, local)) {
            continue;
        }
        let local = doc.local_name(n).unwrap_or("");
        for attr in ["id", "author", "date"] {
            if doc.attr(n, &w(attr)).is_none() {
                out.push(ValidationWarning {
                    kind: ValidationWarningKind::TrackedChangeMissingAttribute,
                    message: format!("w:{local} missing w:{attr}"),
                    node: Some(n),
                });
            }
        }
        if doc.children(n).next().is_none() {
            out.push(ValidationWarning {
                kind: ValidationWarningKind::EmptyTrackedChange,
                message: format!("w:{local} has no content"),
                node: Some(n),
            });
        }
    }
    out
}

fn unmatched_field_marker_warnings(doc: &XmlDocument, root: NodeId) -> Vec<ValidationWarning> {
    let mut out = Vec::new();
    let mut open: Vec<NodeId> = Vec::new();
    for n in doc.descendants(root) {
        if !doc.is_element(n, NS_W, "fldChar") {
            continue;
        }
        match doc.attr(n, &w("fldCharType")) {
            Some("begin") => open.push(n),
            Some("end") => {
                if open.pop().is_none() {
                    out.push(ValidationWarning {
                        kind: ValidationWarningKind::UnmatchedFieldEnd,
                        message: "fldChar[type=end] has no matching begin".to_string(),
                        node: Some(n),
                    });
                }
            }
            _ => {}
        }
    }
    for n in open {
        out.push(ValidationWarning {
            kind: ValidationWarningKind::UnmatchedFieldBegin,
            message: "fldChar[type=begin] has no matching end".to_string(),
            node: Some(n),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::node::XmlNodeData;

    fn el(doc: &mut XmlDocument, parent: NodeId, local: &str) -> NodeId {
        doc.add_child(parent, XmlNodeData::element(w(local)))
    }

    #[test]
    fn flags_orphan_bookmark_start() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let start = el(&mut doc, body, "bookmarkStart");
        doc.set_attr(start, w("id"), "0");

        let warnings = validate(&doc, body);
        assert!(warnings.iter().any(|w| w.kind == ValidationWarningKind::OrphanBookmarkStart));
    }

    #[test]
    fn flags_tracked_change_missing_author_and_empty() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let ins = el(&mut doc, body, "ins");
        doc.set_attr(ins, w("id"), "1");
        doc.set_attr(ins, w("date"), "2024-01-01T00:00:00Z");

        let warnings = validate(&doc, body);
        assert!(warnings
            .iter()
            .any(|w| w.kind == ValidationWarningKind::TrackedChangeMissingAttribute && w.message.contains("author")));
        assert!(warnings.iter().any(|w| w.kind == ValidationWarningKind::EmptyTrackedChange));
    }

    #[test]
    fn flags_unmatched_field_begin_and_end() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let begin = el(&mut doc, body, "fldChar");
        doc.set_attr(begin, w("fldCharType"), "begin");
        let end = el(&mut doc, body, "fldChar");
        doc.set_attr(end, w("fldCharType"), "end");
        let stray_end = el(&mut doc, body, "fldChar");
        doc.set_attr(stray_end, w("fldCharType"), "end");

        let warnings = validate(&doc, body);
        assert_eq!(warnings.iter().filter(|w| w.kind == ValidationWarningKind::UnmatchedFieldEnd).count(), 1);
        assert!(!warnings.iter().any(|w| w.kind == ValidationWarningKind::UnmatchedFieldBegin));
    }

    #[test]
    fn no_warnings_for_well_formed_markup() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let start = el(&mut doc, body, "bookmarkStart");
        doc.set_attr(start, w("id"), "0");
        let end = el(&mut doc, body, "bookmarkEnd");
        doc.set_attr(end, w("id"), "0");

        assert!(validate(&doc, body).is_empty());
    }
}
