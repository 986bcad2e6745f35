//! Deterministic, content-addressed paragraph identity (§4.2).
//!
//! The teacher's own `ooxml::docx::bookmark::Bookmark` reads bookmarks out
//! of a document but explicitly *skips* any name starting with `_` ("system"
//! bookmarks) — it is built to surface user-visible bookmarks, the exact
//! inverse of what this module needs (it only ever touches `_bk_*` names).
//! The seed/hash/collision-retry scheme itself has no teacher precedent and
//! is implemented directly from the spec.

use indextree::NodeId;
use sha1::{Digest, Sha1};

use super::text::{normalize_for_seed, paragraph_text};
use crate::error::{Error, Result};
use crate::xml::namespaces::{w, w14, NS_W};
use crate::xml::node::XmlNodeData;
use crate::xml::xname::XAttribute;
use crate::xml::XmlDocument;

pub const BOOKMARK_PREFIX: &str = "_bk_";
const INTERNAL_BOOKMARK_PREFIXES: [&str; 2] = ["_bk_", "edit-"];
const MAX_SALT_RETRIES: u32 = 10_000;

/// Every `w:p` element in the document, in document order.
pub fn all_paragraphs(doc: &XmlDocument, document_root: NodeId) -> Vec<NodeId> {
    doc.descendants(document_root)
        .filter(|&id| doc.is_element(id, NS_W, "p"))
        .collect()
}

/// The deterministic seed for paragraph `paragraphs[idx]`.
fn compute_seed(doc: &XmlDocument, paragraphs: &[NodeId], idx: usize) -> String {
    let p = paragraphs[idx];
    if let Some(para_id) = doc.attr(p, &w14("paraId")) {
        return format!("intrinsic:w14:{}", para_id.to_lowercase());
    }

    let self_text = normalize_for_seed(&paragraph_text(doc, p));
    let prev_text = idx
        .checked_sub(1)
        .map(|i| normalize_for_seed(&paragraph_text(doc, paragraphs[i])))
        .unwrap_or_default();
    let next_text = paragraphs
        .get(idx + 1)
        .map(|&n| normalize_for_seed(&paragraph_text(doc, n)))
        .unwrap_or_default();
    let ancestor_path = ancestor_path_signature(doc, p);

    format!("fallback:text={self_text}|prev={prev_text}|next={next_text}|ancestors={ancestor_path}")
}

fn ancestor_path_signature(doc: &XmlDocument, p: NodeId) -> String {
    let mut names: Vec<&str> = doc
        .ancestors(p)
        .skip(1)
        .filter_map(|a| doc.get(a).and_then(|d| d.as_element()).map(|(n, _)| n.local()))
        .collect();
    names.reverse();
    names.join("/")
}

fn sha1_hex12(seed: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(seed.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Candidate `_bk_*` name for `seed`, trying salts `0..MAX_SALT_RETRIES` until
/// `taken` no longer contains the candidate.
fn allocate_name(seed: &str, taken: &std::collections::HashSet<String>) -> Result<String> {
    let base = format!("{BOOKMARK_PREFIX}{}", sha1_hex12(seed));
    if !taken.contains(&base) {
        return Ok(base);
    }
    for salt in 0..MAX_SALT_RETRIES {
        let salted_seed = format!("{seed}|salt:{salt}");
        let candidate = format!("{BOOKMARK_PREFIX}{}", sha1_hex12(&salted_seed));
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
    }
    Err(Error::IdAllocationExhausted(seed.to_string()))
}

/// The running maximum of any numeric `w:id` attribute in the document, so
/// newly inserted bookmarks never collide with existing ids.
fn max_numeric_id(doc: &XmlDocument, document_root: NodeId) -> u32 {
    let id_name = w("id");
    doc.descendants(document_root)
        .filter_map(|n| doc.attr(n, &id_name))
        .filter_map(|v| v.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// `getParagraphBookmarkId`: search preceding siblings back across adjacent
/// `bookmarkStart` nodes (stopping at the previous paragraph), then fall
/// back to any `_bk_*` bookmark nested inside the paragraph itself.
pub fn get_paragraph_bookmark_id(doc: &XmlDocument, p: NodeId) -> Option<String> {
    for sib in doc.preceding_siblings(p).skip(1) {
        if doc.is_element(sib, NS_W, "p") {
            break;
        }
        if doc.is_element(sib, NS_W, "bookmarkStart") {
            if let Some(name) = doc.attr(sib, &w("name")) {
                if name.starts_with(BOOKMARK_PREFIX) {
                    return Some(name.to_string());
                }
            }
        }
    }
    for d in doc.descendants(p).skip(1) {
        if doc.is_element(d, NS_W, "bookmarkStart") {
            if let Some(name) = doc.attr(d, &w("name")) {
                if name.starts_with(BOOKMARK_PREFIX) {
                    return Some(name.to_string());
                }
            }
        }
    }
    None
}

/// `findParagraphByBookmarkId`: first paragraph in document order whose
/// resolved `_bk_*` id matches `id`.
pub fn find_paragraph_by_bookmark_id(doc: &XmlDocument, document_root: NodeId, id: &str) -> Option<NodeId> {
    all_paragraphs(doc, document_root)
        .into_iter()
        .find(|&p| get_paragraph_bookmark_id(doc, p).as_deref() == Some(id))
}

/// `insertParagraphBookmarks`: give every paragraph lacking a `_bk_*` id one,
/// allocating sibling `bookmarkStart`/`bookmarkEnd` pairs around it.
pub fn insert_paragraph_bookmarks(doc: &mut XmlDocument, document_root: NodeId) -> Result<usize> {
    let paragraphs = all_paragraphs(doc, document_root);
    let mut next_id = max_numeric_id(doc, document_root) + 1;
    let mut taken: std::collections::HashSet<String> = paragraphs
        .iter()
        .filter_map(|&p| get_paragraph_bookmark_id(doc, p))
        .collect();

    let mut inserted = 0usize;
    for (idx, &p) in paragraphs.iter().enumerate() {
        if get_paragraph_bookmark_id(doc, p).is_some() {
            continue;
        }
        let seed = compute_seed(doc, &paragraphs, idx);
        let name = allocate_name(&seed, &taken)?;
        taken.insert(name.clone());

        let start = doc.new_node(XmlNodeData::element_with_attrs(
            w("bookmarkStart"),
            vec![
                XAttribute::new(w("id"), next_id.to_string()),
                XAttribute::new(w("name"), name.clone()),
            ],
        ));
        let end = doc.new_node(XmlNodeData::element_with_attrs(
            w("bookmarkEnd"),
            vec![XAttribute::new(w("id"), next_id.to_string())],
        ));
        doc.insert_before(start, p);
        doc.insert_after(end, p);
        next_id += 1;
        inserted += 1;
    }
    Ok(inserted)
}

/// `cleanupInternalBookmarks`: remove every `_bk_*`/`edit-*` bookmark pair by
/// matching `w:id`. Runs immediately before final write-back unless the
/// caller opts into preserving them.
pub fn cleanup_internal_bookmarks(doc: &mut XmlDocument, document_root: NodeId) {
    let id_attr = w("id");
    let mut starts_by_id: std::collections::HashMap<String, NodeId> = std::collections::HashMap::new();
    let mut ends_by_id: std::collections::HashMap<String, NodeId> = std::collections::HashMap::new();

    for n in doc.descendants(document_root).collect::<Vec<_>>() {
        if doc.is_element(n, NS_W, "bookmarkStart") {
            let is_internal = doc
                .attr(n, &w("name"))
                .is_some_and(|name| INTERNAL_BOOKMARK_PREFIXES.iter().any(|p| name.starts_with(p)));
            if is_internal {
                if let Some(id) = doc.attr(n, &id_attr) {
                    starts_by_id.insert(id.to_string(), n);
                }
            }
        } else if doc.is_element(n, NS_W, "bookmarkEnd") {
            if let Some(id) = doc.attr(n, &id_attr) {
                ends_by_id.insert(id.to_string(), n);
            }
        }
    }

    for (id, start) in starts_by_id {
        doc.remove_subtree(start);
        if let Some(end) = ends_by_id.get(&id) {
            doc.remove_subtree(*end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::namespaces::NS_W;

    fn paragraph_with_text(doc: &mut XmlDocument, parent: NodeId, text: &str) -> NodeId {
        let p = doc.add_child(parent, XmlNodeData::element(w("p")));
        let r = doc.add_child(p, XmlNodeData::element(w("r")));
        let t = doc.add_child(r, XmlNodeData::element(w("t")));
        doc.add_child(t, XmlNodeData::text(text));
        p
    }

    #[test]
    fn deterministic_id_is_stable_across_calls() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        paragraph_with_text(&mut doc, body, "Hello");
        paragraph_with_text(&mut doc, body, "World");

        let n1 = insert_paragraph_bookmarks(&mut doc, body).unwrap();
        assert_eq!(n1, 2);

        let paragraphs = all_paragraphs(&doc, body);
        let id_first = get_paragraph_bookmark_id(&doc, paragraphs[0]).unwrap();
        assert!(id_first.starts_with(BOOKMARK_PREFIX));

        // Re-running after bookmarks are in place inserts nothing new and
        // resolves to the same names.
        let n2 = insert_paragraph_bookmarks(&mut doc, body).unwrap();
        assert_eq!(n2, 0);
        assert_eq!(get_paragraph_bookmark_id(&doc, paragraphs[0]).unwrap(), id_first);
    }

    #[test]
    fn every_paragraph_gets_a_distinct_id() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        for text in ["a", "b", "c"] {
            paragraph_with_text(&mut doc, body, text);
        }
        insert_paragraph_bookmarks(&mut doc, body).unwrap();

        let ids: Vec<String> = all_paragraphs(&doc, body)
            .into_iter()
            .map(|p| get_paragraph_bookmark_id(&doc, p).unwrap())
            .collect();
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn cleanup_removes_bookmark_pairs() {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        paragraph_with_text(&mut doc, body, "keeper");
        insert_paragraph_bookmarks(&mut doc, body).unwrap();
        assert!(doc.descendants(body).any(|n| doc.is_element(n, NS_W, "bookmarkStart")));

        cleanup_internal_bookmarks(&mut doc, body);
        assert!(!doc.descendants(body).any(|n| doc.is_element(n, NS_W, "bookmarkStart")));
        assert!(!doc.descendants(body).any(|n| doc.is_element(n, NS_W, "bookmarkEnd")));
    }
}
