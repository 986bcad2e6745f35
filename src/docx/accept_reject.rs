//! Tracked-change accept/reject engines (§4.5).
//!
//! Two complementary in-place DOM transforms over the revision markup a
//! paragraph may carry. No teacher or pack precedent runs this exact
//! multi-phase collect-then-mutate pass (the `redline-rs` port *builds*
//! tracked-change wrappers from a diff; it never tears them back down), so
//! the phase ordering here is taken directly from the spec, with the
//! "collect targets into an owned array before mutating" discipline from the
//! "DOM mutation during iteration" design note applied at every phase.

use std::collections::HashSet;

use indextree::NodeId;

use crate::xml::namespaces::{w, NS_W, PR_CHANGE_ELEMENTS};
use crate::xml::node::XmlNodeData;
use crate::xml::XmlDocument;

use super::bookmark;

const MOVE_RANGE_MARKERS: [&str; 4] = ["moveFromRangeStart", "moveFromRangeEnd", "moveToRangeStart", "moveToRangeEnd"];
const RANGE_MARKER_ELEMENTS: [&str; 9] = [
    "bookmarkStart",
    "bookmarkEnd",
    "commentRangeStart",
    "commentRangeEnd",
    "proofErr",
    "moveFromRangeStart",
    "moveFromRangeEnd",
    "moveToRangeStart",
    "moveToRangeEnd",
];

/// Counters returned by [`accept`] and [`reject`], per spec §4.5/§6.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformCounts {
    pub insertions: usize,
    pub deletions: usize,
    pub moves: usize,
    pub property_changes: usize,
    pub paragraphs_removed: usize,
}

/// Accept every tracked change in `document_root`'s subtree: deletions and
/// moved-from text are discarded, insertions and moved-to text are kept.
pub fn accept(doc: &mut XmlDocument, document_root: NodeId) -> TransformCounts {
    let mut counts = TransformCounts::default();
    let paragraphs = bookmark::all_paragraphs(doc, document_root);
    let to_remove = collect_removal_candidates(doc, &paragraphs, &["del", "moveFrom"], "del");

    // Phase B: discard deleted and moved-away content globally.
    counts.deletions += remove_all(doc, document_root, "del");
    remove_all(doc, document_root, "moveFrom");
    for local in MOVE_RANGE_MARKERS {
        remove_all(doc, document_root, local);
    }

    // Phase C: promote inserted and moved-in content into its parent.
    counts.insertions += unwrap_all_except_paragraph_mark(doc, document_root, "ins");
    counts.moves += unwrap_all_except_paragraph_mark(doc, document_root, "moveTo");

    // Phase D: the "after" properties are already in place; drop the record.
    for local in PR_CHANGE_ELEMENTS {
        counts.property_changes += remove_all(doc, document_root, local);
    }

    // Phase E: cleanup.
    for &p in &paragraphs {
        strip_paragraph_mark_markers(doc, p);
    }
    counts.paragraphs_removed += remove_paragraphs(doc, &to_remove);
    strip_rsid_del(doc, document_root);

    counts
}

/// Reject every tracked change in `document_root`'s subtree: insertions and
/// moved-to text are discarded, deletions and moved-from text are restored.
pub fn reject(doc: &mut XmlDocument, document_root: NodeId) -> TransformCounts {
    let mut counts = TransformCounts::default();
    let paragraphs = bookmark::all_paragraphs(doc, document_root);
    let to_remove = collect_removal_candidates(doc, &paragraphs, &["ins", "moveTo"], "ins");

    // Phase B: relocate bookmark identity off paragraphs about to vanish.
    relocate_bookmarks(doc, &paragraphs, &to_remove);

    // Phase C: discard inserted and moved-in content globally.
    counts.insertions += remove_all(doc, document_root, "ins");
    counts.moves += remove_all(doc, document_root, "moveTo");
    for local in MOVE_RANGE_MARKERS {
        remove_all(doc, document_root, local);
    }

    // Phase D: restore deleted text.
    counts.deletions += unwrap_all_except_paragraph_mark(doc, document_root, "del");
    rename_del_text_to_t(doc, document_root);

    // Phase E: restore moved-away text to its original location.
    counts.moves += unwrap_all_except_paragraph_mark(doc, document_root, "moveFrom");

    // Phase F: restore the "before" properties.
    for local in PR_CHANGE_ELEMENTS {
        counts.property_changes += revert_property_changes(doc, document_root, local);
    }

    // Phase G: cleanup.
    for &p in &paragraphs {
        strip_paragraph_mark_markers(doc, p);
    }
    counts.paragraphs_removed += remove_paragraphs(doc, &to_remove);
    strip_rsid_del(doc, document_root);

    counts
}

fn collect_removal_candidates(
    doc: &XmlDocument,
    paragraphs: &[NodeId],
    content_only_locals: &[&str],
    paragraph_mark_local: &str,
) -> HashSet<NodeId> {
    paragraphs
        .iter()
        .copied()
        .filter(|&p| paragraph_mark_has(doc, p, paragraph_mark_local) || content_only_in(doc, p, content_only_locals))
        .collect()
}

fn paragraph_mark_has(doc: &XmlDocument, p: NodeId, local: &str) -> bool {
    paragraph_mark_rpr(doc, p).is_some_and(|rpr| doc.children(rpr).any(|c| doc.is_element(c, NS_W, local)))
}

fn paragraph_mark_rpr(doc: &XmlDocument, p: NodeId) -> Option<NodeId> {
    let ppr = doc.children(p).find(|&c| doc.is_element(c, NS_W, "pPr"))?;
    doc.children(ppr).find(|&c| doc.is_element(c, NS_W, "rPr"))
}

/// True if every content-bearing child of `p` (ignoring `w:pPr` and range
/// markers) is one of `allowed_locals`, and there is at least one such child.
///
/// Also used by [`super::revisions::extract`] to detect an entirely-inserted
/// (`["ins", "moveTo"]`) or entirely-deleted (`["del", "moveFrom"]`)
/// paragraph, per spec §4.6 step 2's empty-string guards.
pub(crate) fn content_only_in(doc: &XmlDocument, p: NodeId, allowed_locals: &[&str]) -> bool {
    let mut has_any = false;
    for child in doc.children(p) {
        if doc.is_element(child, NS_W, "pPr") || is_range_marker(doc, child) {
            continue;
        }
        if doc.get(child).and_then(|d| d.as_text()).is_some_and(|t| t.trim().is_empty()) {
            continue;
        }
        has_any = true;
        match doc.local_name(child) {
            Some(local) if allowed_locals.contains(&local) => {}
            _ => return false,
        }
    }
    has_any
}

fn is_range_marker(doc: &XmlDocument, node: NodeId) -> bool {
    doc.local_name(node).is_some_and(|l| RANGE_MARKER_ELEMENTS.contains(&l))
}

/// A `w:ins`/`w:del` sitting directly inside `w:pPr/w:rPr` marks the
/// paragraph mark itself as revised; it has no content to restore or
/// discard, so it is excluded from the content-wrapper passes and stripped
/// separately by [`strip_paragraph_mark_markers`].
fn is_paragraph_mark_marker(doc: &XmlDocument, node: NodeId) -> bool {
    doc.parent(node).is_some_and(|rpr| {
        doc.is_element(rpr, NS_W, "rPr") && doc.parent(rpr).is_some_and(|ppr| doc.is_element(ppr, NS_W, "pPr"))
    })
}

fn remove_all(doc: &mut XmlDocument, root: NodeId, local: &str) -> usize {
    let targets: Vec<NodeId> = doc
        .descendants(root)
        .filter(|&n| doc.is_element(n, NS_W, local))
        .filter(|&n| !is_paragraph_mark_marker(doc, n))
        .collect();
    let count = targets.len();
    for n in targets {
        doc.remove_subtree(n);
    }
    count
}

/// Unwrap every `(NS_W, local)` wrapper (excluding paragraph-mark markers),
/// deepest-first so a wrapper nested inside another unwraps cleanly.
fn unwrap_all_except_paragraph_mark(doc: &mut XmlDocument, root: NodeId, local: &str) -> usize {
    let mut targets: Vec<NodeId> = doc
        .descendants(root)
        .filter(|&n| doc.is_element(n, NS_W, local))
        .filter(|&n| !is_paragraph_mark_marker(doc, n))
        .collect();
    targets.sort_by_key(|&n| std::cmp::Reverse(doc.ancestors(n).count()));
    let count = targets.len();
    for n in targets {
        doc.unwrap_into_parent(n);
    }
    count
}

fn strip_paragraph_mark_markers(doc: &mut XmlDocument, p: NodeId) {
    let Some(rpr) = paragraph_mark_rpr(doc, p) else { return };
    let targets: Vec<NodeId> = doc
        .children(rpr)
        .filter(|&c| doc.is_element(c, NS_W, "ins") || doc.is_element(c, NS_W, "del"))
        .collect();
    for t in targets {
        doc.remove_subtree(t);
    }
}

fn remove_paragraphs(doc: &mut XmlDocument, targets: &HashSet<NodeId>) -> usize {
    let count = targets.len();
    for &p in targets {
        doc.remove_subtree(p);
    }
    count
}

fn strip_rsid_del(doc: &mut XmlDocument, root: NodeId) {
    let rsid_del = w("rsidDel");
    let all: Vec<NodeId> = doc.descendants(root).collect();
    for n in all {
        doc.remove_attribute(n, &rsid_del);
    }
}

fn rename_del_text_to_t(doc: &mut XmlDocument, root: NodeId) {
    let targets: Vec<NodeId> = doc.descendants(root).filter(|&n| doc.is_element(n, NS_W, "delText")).collect();
    for n in targets {
        if let Some(XmlNodeData::Element { name, .. }) = doc.get_mut(n) {
            *name = w("t");
        }
    }
}

/// Replace each `*PrChange`'s enclosing property container with the original
/// properties it carries, or remove the container entirely if the original
/// was empty (spec §4.5 Reject Phase F).
fn revert_property_changes(doc: &mut XmlDocument, root: NodeId, prchange_local: &str) -> usize {
    let targets: Vec<NodeId> = doc.descendants(root).filter(|&n| doc.is_element(n, NS_W, prchange_local)).collect();
    let count = targets.len();
    for prchange in targets {
        revert_one_property_change(doc, prchange, prchange_local);
    }
    count
}

fn revert_one_property_change(doc: &mut XmlDocument, prchange: NodeId, prchange_local: &str) {
    let Some(container) = doc.parent(prchange) else { return };
    let container_local = prchange_local.strip_suffix("Change").unwrap_or(prchange_local).to_string();
    let original = doc.children(prchange).find(|&c| doc.is_element(c, NS_W, &container_local));

    match original {
        Some(orig) if doc.children(orig).next().is_some() => {
            let existing: Vec<NodeId> = doc.children(container).filter(|&c| c != prchange).collect();
            for e in existing {
                doc.remove_subtree(e);
            }
            let orig_children: Vec<NodeId> = doc.children(orig).collect();
            for k in orig_children {
                let cloned = doc.clone_subtree(k);
                doc.append(container, cloned);
            }
            doc.remove_subtree(prchange);
        }
        _ => doc.remove_subtree(container),
    }
}

/// Move bookmark boundaries off a paragraph about to be removed onto the
/// nearest surviving paragraph — preferring the next one, falling back to
/// the previous (spec §4.5 Reject Phase B).
fn relocate_bookmarks(doc: &mut XmlDocument, paragraphs: &[NodeId], to_remove: &HashSet<NodeId>) {
    for (idx, &p) in paragraphs.iter().enumerate() {
        if !to_remove.contains(&p) {
            continue;
        }
        let next = paragraphs[idx + 1..].iter().find(|n| !to_remove.contains(n));
        let (target, insert_before_target) = match next {
            Some(&n) => (Some(n), true),
            None => (paragraphs[..idx].iter().rev().find(|n| !to_remove.contains(n)).copied(), false),
        };
        let Some(target) = target else { continue };
        relocate_paragraph_bookmarks(doc, p, target, insert_before_target);
    }
}

fn relocate_paragraph_bookmarks(doc: &mut XmlDocument, from: NodeId, to: NodeId, insert_before_target: bool) {
    let mut preceding: Vec<NodeId> = Vec::new();
    for sib in doc.preceding_siblings(from).skip(1) {
        if doc.is_element(sib, NS_W, "p") {
            break;
        }
        if is_bookmark_boundary(doc, sib) {
            preceding.push(sib);
        } else {
            break;
        }
    }
    preceding.reverse();

    let mut following: Vec<NodeId> = Vec::new();
    for sib in doc.following_siblings(from).skip(1) {
        if doc.is_element(sib, NS_W, "p") {
            break;
        }
        if is_bookmark_boundary(doc, sib) {
            following.push(sib);
        } else {
            break;
        }
    }

    let mut sibling_bookmarks = preceding;
    sibling_bookmarks.extend(following);

    if insert_before_target {
        for node in sibling_bookmarks {
            doc.detach(node);
            doc.insert_before(node, to);
        }
    } else {
        let mut anchor = to;
        for node in sibling_bookmarks {
            doc.detach(node);
            doc.insert_after(node, anchor);
            anchor = node;
        }
    }

    let nested: Vec<NodeId> = doc.descendants(from).skip(1).filter(|&d| is_bookmark_boundary(doc, d)).collect();
    for node in nested {
        doc.detach(node);
        doc.append(to, node);
    }
}

fn is_bookmark_boundary(doc: &XmlDocument, node: NodeId) -> bool {
    doc.is_element(node, NS_W, "bookmarkStart") || doc.is_element(node, NS_W, "bookmarkEnd")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::text::paragraph_text;
    use crate::xml::xname::XAttribute;

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
    fn accept_keeps_insertions_and_drops_deletions() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let p = el(&mut doc, body, "p");
        let ins = doc.add_child(p, XmlNodeData::element_with_attrs(w("ins"), vec![XAttribute::new(w("author"), "A")]));
        run_text(&mut doc, ins, "New ");
        let del = doc.add_child(p, XmlNodeData::element_with_attrs(w("del"), vec![XAttribute::new(w("author"), "A")]));
        let del_run = el(&mut doc, del, "r");
        let del_text = el(&mut doc, del_run, "delText");
        doc.add_child(del_text, XmlNodeData::text("Old "));
        run_text(&mut doc, p, "tail");

        let counts = accept(&mut doc, body);
        assert_eq!(counts.insertions, 1);
        assert_eq!(counts.deletions, 1);
        assert_eq!(paragraph_text(&doc, p), "New tail");
        assert!(!doc.descendants(body).any(|n| doc.is_element(n, NS_W, "ins") || doc.is_element(n, NS_W, "del")));
    }

    #[test]
    fn reject_keeps_deletions_and_drops_insertions() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let p = el(&mut doc, body, "p");
        let ins = doc.add_child(p, XmlNodeData::element_with_attrs(w("ins"), vec![XAttribute::new(w("author"), "A")]));
        run_text(&mut doc, ins, "New ");
        let del = doc.add_child(p, XmlNodeData::element_with_attrs(w("del"), vec![XAttribute::new(w("author"), "A")]));
        let del_run = el(&mut doc, del, "r");
        let del_text = el(&mut doc, del_run, "delText");
        doc.add_child(del_text, XmlNodeData::text("Old "));
        run_text(&mut doc, p, "tail");

        let counts = reject(&mut doc, body);
        assert_eq!(counts.insertions, 1);
        assert_eq!(counts.deletions, 1);
        assert_eq!(paragraph_text(&doc, p), "Old tail");
        assert!(!doc.descendants(body).any(|n| doc.is_element(n, NS_W, "ins") || doc.is_element(n, NS_W, "del")));
    }

    #[test]
    fn accept_is_idempotent() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let p = el(&mut doc, body, "p");
        let ins = doc.add_child(p, XmlNodeData::element_with_attrs(w("ins"), vec![XAttribute::new(w("author"), "A")]));
        run_text(&mut doc, ins, "hi");

        accept(&mut doc, body);
        let second = accept(&mut doc, body);
        assert_eq!(second, TransformCounts::default());
    }

    #[test]
    fn reject_removes_fully_inserted_paragraph_and_relocates_bookmark() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));

        let start = doc.add_child(
            body,
            XmlNodeData::element_with_attrs(w("bookmarkStart"), vec![XAttribute::new(w("id"), "1"), XAttribute::new(w("name"), "_bk_abc")]),
        );
        let p1 = el(&mut doc, body, "p");
        let ins = doc.add_child(p1, XmlNodeData::element_with_attrs(w("ins"), vec![XAttribute::new(w("author"), "A")]));
        run_text(&mut doc, ins, "X");
        let end = doc.add_child(body, XmlNodeData::element_with_attrs(w("bookmarkEnd"), vec![XAttribute::new(w("id"), "1")]));
        doc.detach(end);
        doc.insert_after(end, p1);
        doc.detach(start);
        doc.insert_before(start, p1);

        let p2 = el(&mut doc, body, "p");
        run_text(&mut doc, p2, "keeper");

        reject(&mut doc, body);

        let paragraphs = bookmark::all_paragraphs(&doc, body);
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraph_text(&doc, paragraphs[0]), "keeper");
        assert_eq!(bookmark::get_paragraph_bookmark_id(&doc, paragraphs[0]).as_deref(), Some("_bk_abc"));
    }
}
