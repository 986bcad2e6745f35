//! Run merging and redline simplification (§4.3).
//!
//! No teacher or pack precedent builds this exact barrier-aware coalescing
//! pass; it is grounded structurally on the `redline-rs` `coalesce` module's
//! general shape (owned-array collection of merge targets before mutation,
//! per the "DOM mutation during iteration" design note) even though that
//! module's actual algorithm (CoalesceRecurse) solves a different problem
//! (building tracked-change wrappers from a diff, not collapsing existing
//! fragmented runs).

use indextree::NodeId;

use crate::xml::namespaces::{w, NS_W, MERGE_BARRIER_ELEMENTS, REVISION_WRAPPER_ELEMENTS};
use crate::xml::node::XmlNodeData;
use crate::xml::xname::XName;
use crate::xml::XmlDocument;

/// Run the full pre-edit normalization pass: merge runs, then simplify
/// redlines. Both must run before bookmark allocation.
pub fn normalize_paragraph(doc: &mut XmlDocument, paragraph: NodeId) {
    merge_runs(doc, paragraph);
    simplify_redlines(doc, paragraph);
}

/// Remove `w:proofErr`, strip `rsid*` attributes, then coalesce
/// format-identical adjacent runs within every container in the paragraph
/// subtree (the paragraph itself plus any tracked-change wrapper).
pub fn merge_runs(doc: &mut XmlDocument, paragraph: NodeId) {
    let proof_errs: Vec<NodeId> = doc
        .descendants(paragraph)
        .filter(|&n| doc.is_element(n, NS_W, "proofErr"))
        .collect();
    for n in proof_errs {
        doc.remove_subtree(n);
    }

    let all: Vec<NodeId> = doc.descendants(paragraph).collect();
    for n in &all {
        doc.remove_attrs_with_local_prefix(*n, "rsid");
    }

    let containers: Vec<NodeId> = doc.descendants(paragraph).collect();
    for container in containers {
        coalesce_runs_in_container(doc, container);
    }
}

fn coalesce_runs_in_container(doc: &mut XmlDocument, container: NodeId) {
    loop {
        let children: Vec<NodeId> = doc.children(container).collect();
        let mut merged_any = false;

        let mut candidate: Option<(NodeId, Option<String>)> = None;
        for &child in &children {
            if doc.is_element(child, NS_W, "r") && !run_contains_barrier(doc, child) {
                let fp = run_props_fingerprint(doc, child);
                if let Some((prev, prev_fp)) = &candidate {
                    if *prev_fp == fp {
                        move_run_content(doc, child, *prev);
                        doc.remove_subtree(child);
                        merged_any = true;
                        break;
                    }
                }
                candidate = Some((child, fp));
            } else {
                candidate = None;
            }
        }

        if !merged_any {
            break;
        }
    }
}

fn run_contains_barrier(doc: &XmlDocument, run: NodeId) -> bool {
    doc.children(run).any(|c| {
        doc.get(c)
            .and_then(|d| d.as_element())
            .is_some_and(|(name, _)| name.namespace == NS_W && MERGE_BARRIER_ELEMENTS.contains(&name.local()))
    })
}

/// Canonical string form of a run's `w:rPr` (or `None` if it has none),
/// used to test whether two runs are format-identical.
fn run_props_fingerprint(doc: &XmlDocument, run: NodeId) -> Option<String> {
    let rpr = doc
        .children(run)
        .find(|&c| doc.is_element(c, NS_W, "rPr"))?;
    Some(canonical_subtree(doc, rpr))
}

fn canonical_subtree(doc: &XmlDocument, node: NodeId) -> String {
    match doc.get(node) {
        Some(XmlNodeData::Text(t)) => t.clone(),
        Some(XmlNodeData::Element { name, attrs }) => {
            let mut attr_strs: Vec<String> = attrs.iter().map(|a| format!("{}={}", a.name, a.value)).collect();
            attr_strs.sort();
            let mut out = format!("<{}", name.local());
            for a in attr_strs {
                out.push(' ');
                out.push_str(&a);
            }
            out.push('>');
            for child in doc.children(node) {
                out.push_str(&canonical_subtree(doc, child));
            }
            out.push_str("</");
            out.push_str(name.local());
            out.push('>');
            out
        }
        None => String::new(),
    }
}

/// Move all content children (everything but `w:rPr`) from `src` run into
/// `dst` run, preserving order, appended after `dst`'s own content.
fn move_run_content(doc: &mut XmlDocument, src: NodeId, dst: NodeId) {
    let kids: Vec<NodeId> = doc.children(src).collect();
    for kid in kids {
        if doc.is_element(kid, NS_W, "rPr") {
            continue;
        }
        doc.detach(kid);
        doc.append(dst, kid);
    }
}

/// Coalesce adjacent tracked-change wrappers with the same local name and
/// `w:author`, tolerating pure-whitespace text nodes between them.
pub fn simplify_redlines(doc: &mut XmlDocument, paragraph: NodeId) {
    loop {
        let children: Vec<NodeId> = doc.children(paragraph).collect();
        let mut merged = false;

        for i in 0..children.len() {
            let a = children[i];
            if !is_revision_wrapper(doc, a) {
                continue;
            }
            let mut j = i + 1;
            while j < children.len() && is_whitespace_text(doc, children[j]) {
                j += 1;
            }
            if j >= children.len() {
                continue;
            }
            let b = children[j];
            if is_revision_wrapper(doc, b) && same_wrapper_kind_and_author(doc, a, b) {
                for &ws in &children[i + 1..j] {
                    doc.remove_subtree(ws);
                }
                doc.reparent_children(b, a);
                doc.remove_subtree(b);
                merged = true;
                break;
            }
        }

        if !merged {
            break;
        }
    }
}

fn is_whitespace_text(doc: &XmlDocument, node: NodeId) -> bool {
    doc.get(node).and_then(|d| d.as_text()).is_some_and(|t| t.trim().is_empty())
}

fn is_revision_wrapper(doc: &XmlDocument, node: NodeId) -> bool {
    doc.get(node)
        .and_then(|d| d.as_element())
        .is_some_and(|(name, _)| name.namespace == NS_W && REVISION_WRAPPER_ELEMENTS.contains(&name.local()))
}

fn same_wrapper_kind_and_author(doc: &XmlDocument, a: NodeId, b: NodeId) -> bool {
    let author = w("author");
    let a_name = doc.local_name(a);
    let b_name = doc.local_name(b);
    a_name == b_name && doc.attr(a, &author) == doc.attr(b, &author)
}

#[allow(dead_code)]
fn unqualified_placeholder() -> XName {
    XName::unqualified("unused")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::xname::XAttribute;

    fn run_with_text(doc: &mut XmlDocument, parent: NodeId, text: &str, bold: bool) -> NodeId {
        let r = doc.add_child(parent, XmlNodeData::element(w("r")));
        if bold {
            let rpr = doc.add_child(r, XmlNodeData::element(w("rPr")));
            doc.add_child(rpr, XmlNodeData::element(w("b")));
        }
        let t = doc.add_child(r, XmlNodeData::element(w("t")));
        doc.add_child(t, XmlNodeData::text(text));
        r
    }

    #[test]
    fn merges_adjacent_runs_with_identical_formatting() {
        let mut doc = XmlDocument::new();
        let p = doc.add_root(XmlNodeData::element(w("p")));
        run_with_text(&mut doc, p, "Hello ", true);
        run_with_text(&mut doc, p, "World", true);

        merge_runs(&mut doc, p);

        let runs: Vec<NodeId> = doc.children(p).filter(|&n| doc.is_element(n, NS_W, "r")).collect();
        assert_eq!(runs.len(), 1);
        assert_eq!(crate::docx::text::paragraph_text(&doc, p), "Hello World");
    }

    #[test]
    fn does_not_merge_across_fldchar_barrier() {
        let mut doc = XmlDocument::new();
        let p = doc.add_root(XmlNodeData::element(w("p")));
        let r1 = run_with_text(&mut doc, p, "a", false);
        let fld = doc.add_child(r1, XmlNodeData::element(w("fldChar")));
        doc.set_attr(fld, w("fldCharType"), "begin");
        run_with_text(&mut doc, p, "b", false);

        merge_runs(&mut doc, p);
        let runs: Vec<NodeId> = doc.children(p).filter(|&n| doc.is_element(n, NS_W, "r")).collect();
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn simplify_merges_adjacent_same_author_wrappers() {
        let mut doc = XmlDocument::new();
        let p = doc.add_root(XmlNodeData::element(w("p")));
        let ins1 = doc.add_child(
            p,
            XmlNodeData::element_with_attrs(w("ins"), vec![XAttribute::new(w("author"), "A")]),
        );
        run_with_text(&mut doc, ins1, "one", false);
        let ins2 = doc.add_child(
            p,
            XmlNodeData::element_with_attrs(w("ins"), vec![XAttribute::new(w("author"), "A")]),
        );
        run_with_text(&mut doc, ins2, "two", false);

        simplify_redlines(&mut doc, p);

        let wrappers: Vec<NodeId> = doc.children(p).filter(|&n| doc.is_element(n, NS_W, "ins")).collect();
        assert_eq!(wrappers.len(), 1);
    }
}
