//! Declarative layout mutations (§4.11).
//!
//! Targets are resolved by the caller (the `Document` facade maps whatever
//! identifier it uses — a bookmark id, a table/row/cell index — to an
//! `Option<NodeId>`) and handed in paired with their original label, so a
//! miss is reported back under the same label the caller used rather than
//! an opaque node id.

use indextree::NodeId;

use crate::xml::namespaces::{w, NS_W};
use crate::xml::node::XmlNodeData;
use crate::xml::XmlDocument;

/// Result of any `set*` mutation: how many targets were found and mutated,
/// and the labels of any that were not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResult {
    pub affected: usize,
    pub missing: Vec<String>,
}

fn apply<F: FnMut(&mut XmlDocument, NodeId)>(doc: &mut XmlDocument, targets: &[(String, Option<NodeId>)], mut f: F) -> LayoutResult {
    let mut affected = 0;
    let mut missing = Vec::new();
    for (label, node) in targets {
        match node {
            Some(n) => {
                f(doc, *n);
                affected += 1;
            }
            None => missing.push(label.clone()),
        }
    }
    LayoutResult { affected, missing }
}

/// Find `parent`'s child named `(w:, local)`, creating and attaching one if
/// absent. `prepend` matters for `w:pPr`/`w:trPr`/`w:tcPr`, which schema
/// order requires as the first child of their owner.
fn ensure_child(doc: &mut XmlDocument, parent: NodeId, local: &str, prepend: bool) -> NodeId {
    if let Some(existing) = doc.children(parent).find(|&c| doc.is_element(c, NS_W, local)) {
        return existing;
    }
    let node = doc.new_node(XmlNodeData::element(w(local)));
    if prepend {
        match doc.children(parent).next() {
            Some(first) => doc.insert_before(node, first),
            None => doc.append(parent, node),
        }
    } else {
        doc.append(parent, node);
    }
    node
}

/// Values for `w:spacing`; a field left `None` leaves that attribute
/// untouched on an existing element.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpacingSpec {
    pub before_twips: Option<u32>,
    pub after_twips: Option<u32>,
    pub line_twips: Option<u32>,
}

/// `setParagraphSpacing`: apply `spec` to every paragraph in `targets`.
pub fn set_paragraph_spacing(doc: &mut XmlDocument, targets: &[(String, Option<NodeId>)], spec: &SpacingSpec) -> LayoutResult {
    apply(doc, targets, |doc, p| {
        let ppr = ensure_child(doc, p, "pPr", true);
        let spacing = ensure_child(doc, ppr, "spacing", false);
        if let Some(v) = spec.before_twips {
            doc.set_attr(spacing, w("before"), v.to_string());
        }
        if let Some(v) = spec.after_twips {
            doc.set_attr(spacing, w("after"), v.to_string());
        }
        if let Some(v) = spec.line_twips {
            doc.set_attr(spacing, w("line"), v.to_string());
            doc.set_attr(spacing, w("lineRule"), "exact");
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowHeightRule {
    Auto,
    AtLeast,
    Exact,
}

impl RowHeightRule {
    fn as_str(self) -> &'static str {
        match self {
            RowHeightRule::Auto => "auto",
            RowHeightRule::AtLeast => "atLeast",
            RowHeightRule::Exact => "exact",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RowHeightSpec {
    pub height_twips: u32,
    pub rule: RowHeightRule,
}

/// `setTableRowHeight`: apply `spec` to every `w:tr` in `targets`.
pub fn set_table_row_height(doc: &mut XmlDocument, targets: &[(String, Option<NodeId>)], spec: &RowHeightSpec) -> LayoutResult {
    apply(doc, targets, |doc, tr| {
        let trpr = ensure_child(doc, tr, "trPr", true);
        let trheight = ensure_child(doc, trpr, "trHeight", false);
        doc.set_attr(trheight, w("val"), spec.height_twips.to_string());
        doc.set_attr(trheight, w("hRule"), spec.rule.as_str());
    })
}

/// Margin values for `w:tcMar`, in dxa (twentieths of a point); `None`
/// leaves that side untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellPaddingSpec {
    pub top_dxa: Option<u32>,
    pub bottom_dxa: Option<u32>,
    pub left_dxa: Option<u32>,
    pub right_dxa: Option<u32>,
}

/// `setTableCellPadding`: apply `spec` to every `w:tc` in `targets`.
pub fn set_table_cell_padding(doc: &mut XmlDocument, targets: &[(String, Option<NodeId>)], spec: &CellPaddingSpec) -> LayoutResult {
    apply(doc, targets, |doc, tc| {
        let tcpr = ensure_child(doc, tc, "tcPr", true);
        let tcmar = ensure_child(doc, tcpr, "tcMar", false);
        if let Some(v) = spec.top_dxa {
            set_margin_side(doc, tcmar, "top", v);
        }
        if let Some(v) = spec.bottom_dxa {
            set_margin_side(doc, tcmar, "bottom", v);
        }
        if let Some(v) = spec.left_dxa {
            set_margin_side(doc, tcmar, "left", v);
        }
        if let Some(v) = spec.right_dxa {
            set_margin_side(doc, tcmar, "right", v);
        }
    })
}

fn set_margin_side(doc: &mut XmlDocument, tcmar: NodeId, side: &str, dxa: u32) {
    let side_node = ensure_child(doc, tcmar, side, false);
    doc.set_attr(side_node, w("w"), dxa.to_string());
    doc.set_attr(side_node, w("type"), "dxa");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::namespaces::w;

    fn paragraph() -> (XmlDocument, NodeId) {
        let mut doc = XmlDocument::new();
        let p = doc.add_root(XmlNodeData::element(w("p")));
        (doc, p)
    }

    #[test]
    fn set_paragraph_spacing_creates_ppr_and_spacing_once() {
        let (mut doc, p) = paragraph();
        let targets = vec![("para-1".to_string(), Some(p))];
        let spec = SpacingSpec { before_twips: Some(120), after_twips: Some(240), line_twips: None };
        let result = set_paragraph_spacing(&mut doc, &targets, &spec);
        assert_eq!(result.affected, 1);
        assert!(result.missing.is_empty());

        let ppr = doc.children(p).find(|&c| doc.is_element(c, NS_W, "pPr")).unwrap();
        let spacing = doc.children(ppr).find(|&c| doc.is_element(c, NS_W, "spacing")).unwrap();
        assert_eq!(doc.attr(spacing, &w("before")), Some("120"));
        assert_eq!(doc.attr(spacing, &w("after")), Some("240"));

        let result2 = set_paragraph_spacing(&mut doc, &targets, &SpacingSpec { line_twips: Some(480), ..Default::default() });
        assert_eq!(result2.affected, 1);
        assert_eq!(doc.children(ppr).filter(|&c| doc.is_element(c, NS_W, "spacing")).count(), 1);
    }

    #[test]
    fn missing_targets_are_reported_by_label() {
        let (mut doc, _p) = paragraph();
        let targets = vec![("para-missing".to_string(), None)];
        let result = set_paragraph_spacing(&mut doc, &targets, &SpacingSpec::default());
        assert_eq!(result.affected, 0);
        assert_eq!(result.missing, vec!["para-missing".to_string()]);
    }

    #[test]
    fn set_table_cell_padding_writes_all_four_sides() {
        let mut doc = XmlDocument::new();
        let tc = doc.add_root(XmlNodeData::element(w("tc")));
        let targets = vec![("cell-1".to_string(), Some(tc))];
        let spec = CellPaddingSpec { top_dxa: Some(100), bottom_dxa: Some(100), left_dxa: Some(50), right_dxa: Some(50) };
        let result = set_table_cell_padding(&mut doc, &targets, &spec);
        assert_eq!(result.affected, 1);

        let tcpr = doc.children(tc).find(|&c| doc.is_element(c, NS_W, "tcPr")).unwrap();
        let tcmar = doc.children(tcpr).find(|&c| doc.is_element(c, NS_W, "tcMar")).unwrap();
        assert_eq!(doc.children(tcmar).filter(|&c| doc.local_name(c).is_some()).count(), 4);
    }
}
