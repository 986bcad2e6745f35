//! Threaded comments (§4.7).
//!
//! No teacher precedent builds comment *authoring*: the teacher's own
//! `ooxml::docx::comment::Comment` (see `DESIGN.md`) is read-only, wrapping
//! raw XML bytes rather than a mutable DOM node. The anchor-resolution and
//! cascading-delete algorithms below are built directly from the spec, using
//! the same "collect into an owned array before mutating" discipline as
//! every other mutating pass in this crate.

use std::collections::{HashMap, HashSet, VecDeque};

use indextree::NodeId;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::xml::namespaces::{w, w14, w15, NS_W, NS_W15};
use crate::xml::node::XmlNodeData;
use crate::xml::xname::XAttribute;
use crate::xml::XmlDocument;

use super::bookmark;
use super::replace::map_visible_range;
use super::text::visible_runs;

const COMMENT_REFERENCE_STYLE: &str = "CommentReference";

/// A comment read from `comments.xml`/`commentsExtended.xml`, threaded by
/// parent/child `w14:paraId` edges (spec §3 Comment).
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: u32,
    pub author: String,
    pub date: Option<String>,
    pub initials: Option<String>,
    pub text: String,
    pub para_id: String,
    pub anchored_paragraph_id: Option<String>,
    pub replies: Vec<Comment>,
}

fn next_comment_id(comments_doc: &XmlDocument) -> u32 {
    let Some(root) = comments_doc.root() else { return 0 };
    let id_attr = w("id");
    comments_doc
        .children(root)
        .filter(|&c| comments_doc.is_element(c, NS_W, "comment"))
        .filter_map(|c| comments_doc.attr(c, &id_attr))
        .filter_map(|v| v.parse::<u32>().ok())
        .max()
        .map_or(0, |m| m + 1)
}

/// An 8-hex-digit `w14:paraId`, deterministic from the comment's id, author
/// and text (the spec only requires the shape, not a specific generator).
fn gen_para_id(seed: &str) -> String {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(seed.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        hex.push_str(&format!("{byte:02X}"));
    }
    hex
}

/// `addRootComment`: anchor a new top-level comment to `[start, end)` of
/// `paragraph`'s visible text.
#[allow(clippy::too_many_arguments)]
pub fn add_root_comment(
    document: &mut XmlDocument,
    comments_doc: &mut XmlDocument,
    people_doc: &mut XmlDocument,
    paragraph: NodeId,
    start: usize,
    end: usize,
    author: &str,
    text: &str,
    initials: Option<&str>,
    clock: &dyn Clock,
) -> Result<u32> {
    let (start_run, _, end_run, _) = map_visible_range(document, paragraph, start, end)?;
    let runs = visible_runs(document, paragraph);
    let id = next_comment_id(comments_doc);
    let para_id = gen_para_id(&format!("comment:{id}:{author}:{text}"));

    insert_range_markers(document, paragraph, &runs, start_run, end_run, id);
    append_comment_body(comments_doc, id, author, &para_id, text, initials, clock);
    ensure_author(people_doc, author);

    Ok(id)
}

/// `addReply`: append `text` as a reply to the comment with id `parent_id`,
/// with no range markers of its own in the document body.
#[allow(clippy::too_many_arguments)]
pub fn add_reply(
    comments_doc: &mut XmlDocument,
    comments_extended_doc: &mut XmlDocument,
    people_doc: &mut XmlDocument,
    parent_id: u32,
    author: &str,
    text: &str,
    initials: Option<&str>,
    clock: &dyn Clock,
) -> Result<u32> {
    let parent_para_id =
        find_para_id(comments_doc, parent_id).ok_or_else(|| Error::InvalidArgument(format!("no comment with id {parent_id}")))?;
    let id = next_comment_id(comments_doc);
    let child_para_id = gen_para_id(&format!("reply:{id}:{author}:{text}"));

    append_comment_body(comments_doc, id, author, &child_para_id, text, initials, clock);
    ensure_author(people_doc, author);
    link_reply(comments_extended_doc, &child_para_id, &parent_para_id);

    Ok(id)
}

fn insert_range_markers(
    doc: &mut XmlDocument,
    paragraph: NodeId,
    runs: &[super::text::TextRun],
    start_run: usize,
    end_run: usize,
    id: u32,
) {
    let id_str = id.to_string();
    let range_start = doc.new_node(XmlNodeData::element_with_attrs(w("commentRangeStart"), vec![XAttribute::new(w("id"), id_str.clone())]));
    match runs.get(start_run) {
        Some(r) => doc.insert_before(range_start, r.run_id),
        None => doc.append(paragraph, range_start),
    }

    let range_end = doc.new_node(XmlNodeData::element_with_attrs(w("commentRangeEnd"), vec![XAttribute::new(w("id"), id_str.clone())]));
    let reference_run = build_comment_reference_run(doc, &id_str);
    match runs.get(end_run) {
        Some(r) => {
            doc.insert_after(range_end, r.run_id);
            doc.insert_after(reference_run, range_end);
        }
        None => {
            doc.append(paragraph, range_end);
            doc.append(paragraph, reference_run);
        }
    }
}

fn build_comment_reference_run(doc: &mut XmlDocument, id_str: &str) -> NodeId {
    let run = doc.new_node(XmlNodeData::element(w("r")));
    let rpr = doc.new_node(XmlNodeData::element(w("rPr")));
    let rstyle = doc.new_node(XmlNodeData::element_with_attrs(w("rStyle"), vec![XAttribute::new(w("val"), COMMENT_REFERENCE_STYLE)]));
    doc.append(rpr, rstyle);
    doc.append(run, rpr);
    let comment_ref = doc.new_node(XmlNodeData::element_with_attrs(w("commentReference"), vec![XAttribute::new(w("id"), id_str.to_string())]));
    doc.append(run, comment_ref);
    run
}

#[allow(clippy::too_many_arguments)]
fn append_comment_body(
    comments_doc: &mut XmlDocument,
    id: u32,
    author: &str,
    para_id: &str,
    text: &str,
    initials: Option<&str>,
    clock: &dyn Clock,
) {
    let root = comments_doc.root().expect("comments doc has a root");
    let mut attrs = vec![
        XAttribute::new(w("id"), id.to_string()),
        XAttribute::new(w("author"), author.to_string()),
        XAttribute::new(w("date"), clock.now_iso8601()),
    ];
    if let Some(initials) = initials {
        attrs.push(XAttribute::new(w("initials"), initials.to_string()));
    }
    let comment = comments_doc.new_node(XmlNodeData::element_with_attrs(w("comment"), attrs));
    let p = comments_doc.new_node(XmlNodeData::element_with_attrs(w("p"), vec![XAttribute::new(w14("paraId"), para_id.to_string())]));

    let annotation_run = comments_doc.new_node(XmlNodeData::element(w("r")));
    let rpr = comments_doc.new_node(XmlNodeData::element(w("rPr")));
    let rstyle = comments_doc.new_node(XmlNodeData::element_with_attrs(w("rStyle"), vec![XAttribute::new(w("val"), COMMENT_REFERENCE_STYLE)]));
    comments_doc.append(rpr, rstyle);
    comments_doc.append(annotation_run, rpr);
    let annot = comments_doc.new_node(XmlNodeData::element(w("annotationRef")));
    comments_doc.append(annotation_run, annot);

    let text_run = comments_doc.new_node(XmlNodeData::element(w("r")));
    let t = comments_doc.new_node(XmlNodeData::element(w("t")));
    let text_node = comments_doc.new_node(XmlNodeData::text(text));
    comments_doc.append(t, text_node);
    comments_doc.append(text_run, t);

    comments_doc.append(p, annotation_run);
    comments_doc.append(p, text_run);
    comments_doc.append(comment, p);
    comments_doc.append(root, comment);
}

fn find_para_id(comments_doc: &XmlDocument, id: u32) -> Option<String> {
    let root = comments_doc.root()?;
    let id_str = id.to_string();
    let comment = comments_doc
        .children(root)
        .find(|&c| comments_doc.is_element(c, NS_W, "comment") && comments_doc.attr(c, &w("id")) == Some(id_str.as_str()))?;
    let p = comments_doc.children(comment).find(|&p| comments_doc.is_element(p, NS_W, "p"))?;
    comments_doc.attr(p, &w14("paraId")).map(str::to_string)
}

fn ensure_author(people_doc: &mut XmlDocument, author: &str) {
    let root = people_doc.root().expect("people doc has a root");
    let exists = people_doc
        .children(root)
        .any(|c| people_doc.is_element(c, NS_W15, "person") && people_doc.attr(c, &w15("author")) == Some(author));
    if exists {
        return;
    }
    let person = people_doc.new_node(XmlNodeData::element_with_attrs(w15("person"), vec![XAttribute::new(w15("author"), author.to_string())]));
    let presence = people_doc.new_node(XmlNodeData::element_with_attrs(
        w15("presenceInfo"),
        vec![XAttribute::new(w15("providerId"), "None"), XAttribute::new(w15("userId"), author.to_string())],
    ));
    people_doc.append(person, presence);
    people_doc.append(root, person);
}

fn link_reply(ext_doc: &mut XmlDocument, child_para_id: &str, parent_para_id: &str) {
    let root = ext_doc.root().expect("commentsExtended doc has a root");
    ensure_comment_ex_entry(ext_doc, root, parent_para_id, None);
    add_comment_ex_entry(ext_doc, root, child_para_id, Some(parent_para_id));
}

fn ensure_comment_ex_entry(ext_doc: &mut XmlDocument, root: NodeId, para_id: &str, parent: Option<&str>) {
    let exists = ext_doc
        .children(root)
        .any(|c| ext_doc.is_element(c, NS_W15, "commentEx") && ext_doc.attr(c, &w15("paraId")) == Some(para_id));
    if !exists {
        add_comment_ex_entry(ext_doc, root, para_id, parent);
    }
}

fn add_comment_ex_entry(ext_doc: &mut XmlDocument, root: NodeId, para_id: &str, parent: Option<&str>) {
    let mut attrs = vec![XAttribute::new(w15("paraId"), para_id.to_string())];
    if let Some(parent) = parent {
        attrs.push(XAttribute::new(w15("paraIdParent"), parent.to_string()));
    }
    attrs.push(XAttribute::new(w15("done"), "0"));
    let node = ext_doc.new_node(XmlNodeData::element_with_attrs(w15("commentEx"), attrs));
    ext_doc.append(root, node);
}

/// `readComments`: build the comment thread tree for the whole document.
pub fn read_comments(
    document: &XmlDocument,
    document_root: NodeId,
    comments_doc: &XmlDocument,
    comments_extended_doc: Option<&XmlDocument>,
) -> Vec<Comment> {
    let Some(comments_root) = comments_doc.root() else { return Vec::new() };
    let mut flat: Vec<Comment> = Vec::new();
    for c in comments_doc.children(comments_root).filter(|&c| comments_doc.is_element(c, NS_W, "comment")) {
        let id = comments_doc.attr(c, &w("id")).and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);
        let author = comments_doc.attr(c, &w("author")).unwrap_or_default().to_string();
        let date = comments_doc.attr(c, &w("date")).map(str::to_string);
        let initials = comments_doc.attr(c, &w("initials")).map(str::to_string);
        let p = comments_doc.children(c).find(|&p| comments_doc.is_element(p, NS_W, "p"));
        let para_id = p.and_then(|p| comments_doc.attr(p, &w14("paraId"))).unwrap_or_default().to_string();
        let text = p.map(|p| comment_body_text(comments_doc, p)).unwrap_or_default();
        let anchored_paragraph_id = find_anchor(document, document_root, id);
        flat.push(Comment { id, author, date, initials, text, para_id, anchored_paragraph_id, replies: Vec::new() });
    }

    let parent_of = comments_extended_doc.map(parse_parent_edges).unwrap_or_default();
    build_tree(flat, &parent_of)
}

fn comment_body_text(doc: &XmlDocument, p: NodeId) -> String {
    doc.descendants(p).filter(|&n| doc.is_element(n, NS_W, "t")).map(|n| doc.direct_text(n)).collect()
}

fn find_anchor(document: &XmlDocument, document_root: NodeId, id: u32) -> Option<String> {
    let id_str = id.to_string();
    let start = document
        .descendants(document_root)
        .find(|&n| document.is_element(n, NS_W, "commentRangeStart") && document.attr(n, &w("id")) == Some(id_str.as_str()))?;
    let p = document.ancestors(start).find(|&a| document.is_element(a, NS_W, "p"))?;
    bookmark::get_paragraph_bookmark_id(document, p)
}

fn parse_parent_edges(ext_doc: &XmlDocument) -> HashMap<String, String> {
    let Some(root) = ext_doc.root() else { return HashMap::new() };
    ext_doc
        .children(root)
        .filter(|&c| ext_doc.is_element(c, NS_W15, "commentEx"))
        .filter_map(|c| {
            let para_id = ext_doc.attr(c, &w15("paraId"))?.to_string();
            let parent = ext_doc.attr(c, &w15("paraIdParent"))?.to_string();
            Some((para_id, parent))
        })
        .collect()
}

fn build_tree(flat: Vec<Comment>, parent_of: &HashMap<String, String>) -> Vec<Comment> {
    let mut by_para: HashMap<String, usize> = HashMap::new();
    for (i, c) in flat.iter().enumerate() {
        by_para.insert(c.para_id.clone(), i);
    }
    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut is_child = vec![false; flat.len()];
    for (i, c) in flat.iter().enumerate() {
        if let Some(parent_para) = parent_of.get(&c.para_id) {
            if let Some(&parent_idx) = by_para.get(parent_para) {
                children.entry(parent_idx).or_default().push(i);
                is_child[i] = true;
            }
        }
    }

    fn build(idx: usize, flat: &[Comment], children: &HashMap<usize, Vec<usize>>) -> Comment {
        let mut c = flat[idx].clone();
        if let Some(kids) = children.get(&idx) {
            c.replies = kids.iter().map(|&k| build(k, flat, children)).collect();
        }
        c
    }

    (0..flat.len()).filter(|i| !is_child[*i]).map(|i| build(i, &flat, &children)).collect()
}

/// `deleteComment`: remove `target_id` and every comment reachable from it
/// via the `commentEx` parent graph, cascading into `comments.xml`,
/// `commentsExtended.xml`, and the document body's range/reference markup.
/// Returns the number of comments removed.
pub fn delete_comment(
    document: &mut XmlDocument,
    document_root: NodeId,
    comments_doc: &mut XmlDocument,
    comments_extended_doc: &mut XmlDocument,
    target_id: u32,
) -> usize {
    let Some(target_para_id) = find_para_id(comments_doc, target_id) else { return 0 };

    let parent_of = parse_parent_edges(comments_extended_doc);
    let mut children_of: HashMap<String, Vec<String>> = HashMap::new();
    for (child, parent) in &parent_of {
        children_of.entry(parent.clone()).or_default().push(child.clone());
    }

    let mut to_delete: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    to_delete.insert(target_para_id.clone());
    queue.push_back(target_para_id);
    while let Some(cur) = queue.pop_front() {
        if let Some(kids) = children_of.get(&cur) {
            for k in kids {
                if to_delete.insert(k.clone()) {
                    queue.push_back(k.clone());
                }
            }
        }
    }

    let comments_root = comments_doc.root().expect("comments doc has a root");
    let ids: Vec<u32> = comments_doc
        .children(comments_root)
        .filter(|&c| comments_doc.is_element(c, NS_W, "comment"))
        .filter_map(|c| {
            let p = comments_doc.children(c).find(|&p| comments_doc.is_element(p, NS_W, "p"))?;
            let para_id = comments_doc.attr(p, &w14("paraId"))?;
            to_delete
                .contains(para_id)
                .then(|| comments_doc.attr(c, &w("id")).and_then(|v| v.parse::<u32>().ok()))
                .flatten()
        })
        .collect();

    let comment_nodes: Vec<NodeId> = comments_doc
        .children(comments_root)
        .filter(|&c| comments_doc.is_element(c, NS_W, "comment"))
        .filter(|&c| comments_doc.attr(c, &w("id")).and_then(|v| v.parse::<u32>().ok()).is_some_and(|id| ids.contains(&id)))
        .collect();
    for c in comment_nodes {
        comments_doc.remove_subtree(c);
    }

    let ext_root = comments_extended_doc.root().expect("commentsExtended doc has a root");
    let ext_nodes: Vec<NodeId> = comments_extended_doc
        .children(ext_root)
        .filter(|&c| comments_extended_doc.is_element(c, NS_W15, "commentEx"))
        .filter(|&c| comments_extended_doc.attr(c, &w15("paraId")).is_some_and(|p| to_delete.contains(p)))
        .collect();
    for c in ext_nodes {
        comments_extended_doc.remove_subtree(c);
    }

    for &id in &ids {
        remove_comment_markup(document, document_root, id);
    }

    ids.len()
}

fn remove_comment_markup(doc: &mut XmlDocument, root: NodeId, id: u32) {
    let id_str = id.to_string();
    for local in ["commentRangeStart", "commentRangeEnd"] {
        let targets: Vec<NodeId> = doc
            .descendants(root)
            .filter(|&n| doc.is_element(n, NS_W, local) && doc.attr(n, &w("id")) == Some(id_str.as_str()))
            .collect();
        for t in targets {
            doc.remove_subtree(t);
        }
    }

    let refs: Vec<NodeId> = doc
        .descendants(root)
        .filter(|&n| doc.is_element(n, NS_W, "commentReference") && doc.attr(n, &w("id")) == Some(id_str.as_str()))
        .collect();
    for r in refs {
        let parent_run = doc.parent(r);
        doc.remove_subtree(r);
        if let Some(run) = parent_run {
            if is_run_empty_of_visible_content(doc, run) {
                doc.remove_subtree(run);
            }
        }
    }
}

fn is_run_empty_of_visible_content(doc: &XmlDocument, run: NodeId) -> bool {
    doc.children(run).all(|c| doc.is_element(c, NS_W, "rPr"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::xml::namespaces::w;
    use chrono::{TimeZone, Utc};

    fn fresh_comments_doc() -> XmlDocument {
        crate::xml::parse_document(crate::docx::templates::default_comments_xml().as_bytes()).unwrap()
    }
    fn fresh_ext_doc() -> XmlDocument {
        crate::xml::parse_document(crate::docx::templates::default_comments_extended_xml().as_bytes()).unwrap()
    }
    fn fresh_people_doc() -> XmlDocument {
        crate::xml::parse_document(crate::docx::templates::default_people_xml().as_bytes()).unwrap()
    }

    fn doc_with_paragraph(text: &str) -> (XmlDocument, NodeId) {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let p = doc.add_child(body, XmlNodeData::element(w("p")));
        let r = doc.add_child(p, XmlNodeData::element(w("r")));
        let t = doc.add_child(r, XmlNodeData::element(w("t")));
        doc.add_child(t, XmlNodeData::text(text));
        (doc, p)
    }

    #[test]
    fn add_root_comment_inserts_range_markers_and_body() {
        let (mut document, p) = doc_with_paragraph("Hello world");
        let mut comments = fresh_comments_doc();
        let mut people = fresh_people_doc();
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let id = add_root_comment(&mut document, &mut comments, &mut people, p, 0, 5, "Ada", "note", None, &clock).unwrap();
        assert_eq!(id, 0);
        assert!(document.descendants(p).any(|n| document.is_element(n, NS_W, "commentRangeStart")));
        assert!(document.descendants(p).any(|n| document.is_element(n, NS_W, "commentReference")));

        let comments_root = comments.root().unwrap();
        assert_eq!(comments.children(comments_root).filter(|&c| comments.is_element(c, NS_W, "comment")).count(), 1);
    }

    #[test]
    fn cascading_delete_removes_whole_subtree_but_not_siblings() {
        let (mut document, p) = doc_with_paragraph("anchor text");
        let mut comments = fresh_comments_doc();
        let mut ext = fresh_ext_doc();
        let mut people = fresh_people_doc();
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let root_id = add_root_comment(&mut document, &mut comments, &mut people, p, 0, 6, "A", "root", None, &clock).unwrap();
        let reply1 = add_reply(&mut comments, &mut ext, &mut people, root_id, "B", "reply1", None, &clock).unwrap();
        let _reply2 = add_reply(&mut comments, &mut ext, &mut people, reply1, "C", "reply2", None, &clock).unwrap();
        let other_root = add_root_comment(&mut document, &mut comments, &mut people, p, 7, 11, "D", "other", None, &clock).unwrap();

        let removed = delete_comment(&mut document, p, &mut comments, &mut ext, root_id);
        assert_eq!(removed, 3);

        let comments_root = comments.root().unwrap();
        let remaining: Vec<u32> = comments
            .children(comments_root)
            .filter(|&c| comments.is_element(c, NS_W, "comment"))
            .filter_map(|c| comments.attr(c, &w("id")).and_then(|v| v.parse().ok()))
            .collect();
        assert_eq!(remaining, vec![other_root]);
    }
}
