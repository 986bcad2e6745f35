//! Style fingerprinting (§4.10): group paragraphs sharing formatting
//! characteristics into named buckets (`heading`, `quote`, `body`, `body_1`,
//! ...).
//!
//! No teacher precedent; grounded on the group-by-derived-key-then-operate
//! pattern in `merge.rs`'s canonical subtree comparison, applied here to
//! paragraph formatting instead of run markup.

use std::collections::HashMap;

use indextree::NodeId;

use super::styles::{ParagraphFormatting, StyleSheet};

const TWIPS_PER_POINT: f64 = 20.0;
const INDENTED_BLOCK_THRESHOLD_PT: i32 = 36;

/// `(list_level, left_indent_pt, first_line_indent_pt, style_name,
/// alignment)` — two paragraphs fingerprint equal iff all five agree.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleFingerprint {
    pub list_level: Option<u32>,
    pub left_indent_pt: Option<i32>,
    pub first_line_indent_pt: Option<i32>,
    pub style_name: Option<String>,
    pub alignment: Option<String>,
}

impl StyleFingerprint {
    pub fn compute(styles: &StyleSheet, fmt: &ParagraphFormatting, style_id: Option<&str>) -> Self {
        StyleFingerprint {
            list_level: fmt.ilvl,
            left_indent_pt: fmt.left_indent_twips.map(twips_to_pt),
            first_line_indent_pt: fmt.first_line_indent_twips.map(twips_to_pt),
            style_name: style_id.and_then(|id| styles.style_name(id)).map(|s| s.to_string()),
            alignment: fmt.alignment.clone(),
        }
    }
}

fn twips_to_pt(twips: i32) -> i32 {
    (twips as f64 / TWIPS_PER_POINT).round() as i32
}

#[derive(Debug, Clone)]
pub struct FingerprintGroup {
    pub semantic_id: String,
    pub fingerprint: StyleFingerprint,
    pub members: Vec<NodeId>,
}

impl FingerprintGroup {
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// The middle member in document order, used as this group's example.
    pub fn median_example(&self) -> Option<NodeId> {
        self.members.get(self.members.len() / 2).copied()
    }

    pub fn dominant_alignment(&self) -> Option<&str> {
        self.fingerprint.alignment.as_deref()
    }
}

/// Groups `entries` (paragraph, fingerprint pairs, in document order) by
/// fingerprint equality, then names each group — disambiguating repeats of
/// the same inferred name as `name`, `name_1`, `name_2`, ...
pub fn group_paragraphs(entries: &[(NodeId, StyleFingerprint)]) -> Vec<FingerprintGroup> {
    let mut order: Vec<StyleFingerprint> = Vec::new();
    let mut members: Vec<Vec<NodeId>> = Vec::new();

    'entries: for (p, fp) in entries {
        for (idx, existing) in order.iter().enumerate() {
            if existing == fp {
                members[idx].push(*p);
                continue 'entries;
            }
        }
        order.push(fp.clone());
        members.push(vec![*p]);
    }

    let base_names: Vec<String> = order.iter().map(infer_semantic_id).collect();
    let mut name_counts: HashMap<&str, usize> = HashMap::new();
    for name in &base_names {
        *name_counts.entry(name.as_str()).or_insert(0) += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    order
        .into_iter()
        .zip(base_names.iter())
        .zip(members.into_iter())
        .map(|((fingerprint, base), group_members)| {
            let total = *name_counts.get(base.as_str()).unwrap_or(&1);
            let semantic_id = if total <= 1 {
                base.clone()
            } else {
                let n = seen.entry(base.as_str()).or_insert(0);
                let name = if *n == 0 { base.clone() } else { format!("{base}_{n}") };
                *n += 1;
                name
            };
            FingerprintGroup { semantic_id, fingerprint, members: group_members }
        })
        .collect()
}

fn infer_semantic_id(fp: &StyleFingerprint) -> String {
    let style_lower = fp.style_name.as_deref().unwrap_or("").to_lowercase();
    if style_lower.contains("title") {
        return "title".to_string();
    }
    if style_lower.contains("heading") {
        return "heading".to_string();
    }
    if style_lower.contains("quote") {
        return "quote".to_string();
    }
    if fp.list_level.is_some() {
        return "list_item".to_string();
    }
    if fp.left_indent_pt.unwrap_or(0) >= INDENTED_BLOCK_THRESHOLD_PT {
        return "indented_block".to_string();
    }
    "body".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::namespaces::w;
    use crate::xml::node::XmlNodeData;
    use crate::xml::XmlDocument;

    fn fp(style_name: Option<&str>, left_indent_pt: Option<i32>) -> StyleFingerprint {
        StyleFingerprint {
            list_level: None,
            left_indent_pt,
            first_line_indent_pt: None,
            style_name: style_name.map(|s| s.to_string()),
            alignment: None,
        }
    }

    fn paragraphs(n: usize) -> (XmlDocument, Vec<NodeId>) {
        let mut doc = XmlDocument::new();
        let body = doc.add_root(XmlNodeData::element(w("body")));
        let ids = (0..n).map(|_| doc.add_child(body, XmlNodeData::element(w("p")))).collect();
        (doc, ids)
    }

    #[test]
    fn repeated_body_fingerprints_get_disambiguated_suffixes() {
        let (_doc, p) = paragraphs(3);
        let entries =
            vec![(p[0], fp(None, None)), (p[1], fp(Some("Heading1"), None)), (p[2], fp(None, None))];
        let groups = group_paragraphs(&entries);
        let names: Vec<&str> = groups.iter().map(|g| g.semantic_id.as_str()).collect();
        assert_eq!(names, vec!["body", "heading"]);
        assert_eq!(groups[0].count(), 2);
    }

    #[test]
    fn deeply_indented_paragraph_without_heading_style_becomes_indented_block() {
        let (_doc, p) = paragraphs(1);
        let entries = vec![(p[0], fp(None, Some(48)))];
        let groups = group_paragraphs(&entries);
        assert_eq!(groups[0].semantic_id, "indented_block");
    }

    #[test]
    fn median_example_picks_a_member_from_the_group() {
        let (_doc, p) = paragraphs(4);
        let entries: Vec<_> = p.iter().map(|&n| (n, fp(None, None))).collect();
        let groups = group_paragraphs(&entries);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].median_example().is_some());
    }
}
