//! Revision extraction (§4.6).
//!
//! The "resolve before/after text via independent accept/reject clones,
//! joined back by `_bk_*` identity" algorithm is built directly from the
//! spec; it leans on [`crate::xml::XmlDocument`]'s `Clone` impl preserving
//! `NodeId` values. Reject's bookmark-relocation phase keeps an
//! entirely-inserted paragraph's `_bk_*` name alive by moving it onto a
//! surviving neighbor once the paragraph itself is removed — which means a
//! bare lookup of that name in the rejected clone resolves to the
//! *neighbor*, not to "nothing". Spec §4.6 step 2's explicit
//! entirely-inserted/entirely-deleted guards exist precisely to short-circuit
//! around that relocation rather than trust the lookup.

use indextree::NodeId;

use crate::xml::namespaces::{w, NS_W, PR_CHANGE_ELEMENTS};
use crate::xml::XmlDocument;

use super::accept_reject::content_only_in;
use super::bookmark;
use super::comments::Comment;
use super::text::paragraph_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionKind {
    Insertion,
    Deletion,
    MoveFrom,
    MoveTo,
    FormatChange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevisionEntry {
    pub kind: RevisionKind,
    pub text: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevisionChange {
    pub paragraph_id: String,
    pub before_text: String,
    pub after_text: String,
    pub revisions: Vec<RevisionEntry>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractResult {
    pub changes: Vec<RevisionChange>,
    pub total_changes: usize,
    pub has_more: bool,
}

/// `extractRevisions`: build the paginated change list described in spec
/// §4.6, given independently accepted/rejected clones of the same document.
#[allow(clippy::too_many_arguments)]
pub fn extract(
    original: &XmlDocument,
    document_root: NodeId,
    accepted: &XmlDocument,
    accepted_root: NodeId,
    rejected: &XmlDocument,
    rejected_root: NodeId,
    comments: &[Comment],
    offset: usize,
    limit: usize,
) -> ExtractResult {
    let flat_comments = flatten_comments(comments);

    let mut changes: Vec<RevisionChange> = Vec::new();
    for p in bookmark::all_paragraphs(original, document_root) {
        if !carries_revision_markup(original, p) {
            continue;
        }
        let Some(para_id) = bookmark::get_paragraph_bookmark_id(original, p) else { continue };

        // An entirely-inserted/entirely-deleted paragraph has no "before"/
        // "after" counterpart at all; its `_bk_*` name only resolves in the
        // opposite clone because reject/accept relocated it onto a surviving
        // neighbor. Short-circuit before the lookup can borrow that
        // neighbor's text.
        let entirely_inserted = content_only_in(original, p, &["ins", "moveTo"]);
        let entirely_deleted = content_only_in(original, p, &["del", "moveFrom"]);

        let before_text = if entirely_inserted {
            String::new()
        } else {
            bookmark::find_paragraph_by_bookmark_id(rejected, rejected_root, &para_id)
                .map(|rp| paragraph_text(rejected, rp))
                .unwrap_or_default()
        };
        let after_text = if entirely_deleted {
            String::new()
        } else {
            bookmark::find_paragraph_by_bookmark_id(accepted, accepted_root, &para_id)
                .map(|ap| paragraph_text(accepted, ap))
                .unwrap_or_default()
        };

        let revisions = enumerate_revisions(original, p);
        if before_text.is_empty() && after_text.is_empty() && revisions.is_empty() {
            continue;
        }

        let attached_comments: Vec<Comment> = flat_comments
            .iter()
            .filter(|c| c.anchored_paragraph_id.as_deref() == Some(para_id.as_str()))
            .cloned()
            .collect();

        changes.push(RevisionChange { paragraph_id: para_id, before_text, after_text, revisions, comments: attached_comments });
    }

    let total_changes = changes.len();
    let has_more = offset + limit < total_changes;
    let page = changes.into_iter().skip(offset).take(limit).collect();

    ExtractResult { changes: page, total_changes, has_more }
}

fn flatten_comments(comments: &[Comment]) -> Vec<Comment> {
    let mut out = Vec::new();
    flatten_comments_into(comments, &mut out);
    out
}

fn flatten_comments_into(comments: &[Comment], out: &mut Vec<Comment>) {
    for c in comments {
        flatten_comments_into(&c.replies, out);
        out.push(c.clone());
    }
}

fn carries_revision_markup(doc: &XmlDocument, p: NodeId) -> bool {
    doc.descendants(p).skip(1).any(|n| {
        wrapper_kind(doc, n).is_some() || doc.local_name(n).is_some_and(|local| PR_CHANGE_ELEMENTS.contains(&local))
    })
}

fn enumerate_revisions(doc: &XmlDocument, p: NodeId) -> Vec<RevisionEntry> {
    let mut out = Vec::new();
    for n in doc.descendants(p).skip(1) {
        if let Some(kind) = wrapper_kind(doc, n) {
            if is_paragraph_mark_marker(doc, n) {
                continue;
            }
            let author = doc.attr(n, &w("author")).unwrap_or_default().to_string();
            let text = wrapper_text(doc, n);
            out.push(RevisionEntry { kind, text, author });
        } else if doc.local_name(n).is_some_and(|local| PR_CHANGE_ELEMENTS.contains(&local)) {
            let author = doc.attr(n, &w("author")).unwrap_or_default().to_string();
            out.push(RevisionEntry { kind: RevisionKind::FormatChange, text: String::new(), author });
        }
    }
    out
}

fn wrapper_kind(doc: &XmlDocument, n: NodeId) -> Option<RevisionKind> {
    if doc.is_element(n, NS_W, "ins") {
        Some(RevisionKind::Insertion)
    } else if doc.is_element(n, NS_W, "del") {
        Some(RevisionKind::Deletion)
    } else if doc.is_element(n, NS_W, "moveFrom") {
        Some(RevisionKind::MoveFrom)
    } else if doc.is_element(n, NS_W, "moveTo") {
        Some(RevisionKind::MoveTo)
    } else {
        None
    }
}

fn is_paragraph_mark_marker(doc: &XmlDocument, node: NodeId) -> bool {
    doc.parent(node)
        .is_some_and(|rpr| doc.is_element(rpr, NS_W, "rPr") && doc.parent(rpr).is_some_and(|ppr| doc.is_element(ppr, NS_W, "pPr")))
}

fn wrapper_text(doc: &XmlDocument, wrapper: NodeId) -> String {
    let mut out = String::new();
    for n in doc.descendants(wrapper) {
        match doc.local_name(n) {
            Some("t") | Some("delText") => out.push_str(&doc.direct_text(n)),
            Some("tab") => out.push('\t'),
            Some("br") | Some("cr") => out.push('\n'),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::namespaces::w;
    use crate::xml::node::XmlNodeData;

    fn el(doc: &mut XmlDocument, parent: NodeId, local: &str) -> NodeId {
        doc.add_child(parent, XmlNodeData::element(w(local)))
    }

    fn run_text(doc: &mut XmlDocument, parent: NodeId, text: &str) -> NodeId {
        let r = el(doc, parent, "r");
        let t = el(doc, r, "t");
        doc.add_child(t, XmlNodeData::text(text));
        r
    }

    #[test]
    fn extract_reports_insertion_and_deletion_with_before_after_text() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let p = el(&mut doc, body, "p");
        run_text(&mut doc, p, "Keep ");
        let ins = el(&mut doc, p, "ins");
        doc.set_attr(ins, w("author"), "Ada");
        let ins_run = el(&mut doc, ins, "r");
        let ins_t = el(&mut doc, ins_run, "t");
        doc.add_child(ins_t, XmlNodeData::text("new "));
        let del = el(&mut doc, p, "del");
        doc.set_attr(del, w("author"), "Bob");
        let del_run = el(&mut doc, del, "r");
        let del_t = el(&mut doc, del_run, "delText");
        doc.add_child(del_t, XmlNodeData::text("old "));
        run_text(&mut doc, p, "tail");

        bookmark::insert_paragraph_bookmarks(&mut doc, body).unwrap();

        let mut accepted = doc.clone();
        super::super::accept_reject::accept(&mut accepted, body);
        let mut rejected = doc.clone();
        super::super::accept_reject::reject(&mut rejected, body);

        let result = extract(&doc, body, &accepted, body, &rejected, body, &[], 0, 10);
        assert_eq!(result.total_changes, 1);
        assert!(!result.has_more);
        let change = &result.changes[0];
        assert_eq!(change.after_text, "Keep new tail");
        assert_eq!(change.before_text, "Keep old tail");
        assert_eq!(change.revisions.len(), 2);
        assert!(change.revisions.iter().any(|r| r.kind == RevisionKind::Insertion && r.text == "new "));
        assert!(change.revisions.iter().any(|r| r.kind == RevisionKind::Deletion && r.text == "old "));
    }

    #[test]
    fn entirely_inserted_paragraph_has_empty_before_text_with_a_surviving_neighbor() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let p = el(&mut doc, body, "p");
        let ins = el(&mut doc, p, "ins");
        doc.set_attr(ins, w("author"), "Ada");
        let ins_run = el(&mut doc, ins, "r");
        let ins_t = el(&mut doc, ins_run, "t");
        doc.add_child(ins_t, XmlNodeData::text("brand new"));
        let keeper = el(&mut doc, body, "p");
        run_text(&mut doc, keeper, "keeper");

        bookmark::insert_paragraph_bookmarks(&mut doc, body).unwrap();

        let mut accepted = doc.clone();
        super::super::accept_reject::accept(&mut accepted, body);
        let mut rejected = doc.clone();
        super::super::accept_reject::reject(&mut rejected, body);

        // Reject removes the entirely-inserted paragraph and relocates its
        // `_bk_*` id onto "keeper" — a bare lookup would otherwise report
        // "keeper"'s text as this change's `before_text`.
        let result = extract(&doc, body, &accepted, body, &rejected, body, &[], 0, 10);
        assert_eq!(result.total_changes, 1);
        let change = &result.changes[0];
        assert_eq!(change.before_text, "");
        assert_eq!(change.after_text, "brand new");
    }

    #[test]
    fn pagination_reports_has_more() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        for i in 0..3 {
            let p = el(&mut doc, body, "p");
            let ins = el(&mut doc, p, "ins");
            doc.set_attr(ins, w("author"), "Ada");
            let ins_run = el(&mut doc, ins, "r");
            let ins_t = el(&mut doc, ins_run, "t");
            doc.add_child(ins_t, XmlNodeData::text(format!("paragraph {i}")));
        }
        bookmark::insert_paragraph_bookmarks(&mut doc, body).unwrap();

        let mut accepted = doc.clone();
        super::super::accept_reject::accept(&mut accepted, body);
        let mut rejected = doc.clone();
        super::super::accept_reject::reject(&mut rejected, body);

        let result = extract(&doc, body, &accepted, body, &rejected, body, &[], 0, 2);
        assert_eq!(result.total_changes, 3);
        assert_eq!(result.changes.len(), 2);
        assert!(result.has_more);
    }
}
