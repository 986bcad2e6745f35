//! Style model: `styles.xml` parsing plus the paragraph/run formatting
//! resolution chains (§4.10).
//!
//! The teacher's `ooxml::docx::styles::Styles` parses the same `w:style`
//! catalog (id, name, type, `basedOn`, priority, hidden/locked/quick-style
//! flags) but stops at cataloging — it never resolves a `basedOn` chain into
//! effective formatting, since litchi has no paragraph-view consumer that
//! needs one. The chain-resolution and boolean-toggle semantics below are
//! built directly from the spec, reusing the teacher's attribute names
//! (`styleId`, `basedOn`, `val`).

use std::collections::HashMap;

use indextree::NodeId;

use crate::xml::namespaces::{w, NS_W};
use crate::xml::XmlDocument;

/// Resolved paragraph-level formatting: only the facets this engine's view
/// cares about (alignment, indents, numbering reference).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParagraphFormatting {
    pub alignment: Option<String>,
    pub left_indent_twips: Option<i32>,
    pub first_line_indent_twips: Option<i32>,
    pub num_id: Option<u32>,
    pub ilvl: Option<u32>,
}

impl ParagraphFormatting {
    /// `self`'s direct fields win; anything unset falls back to `base`.
    fn layered_over(self, base: &ParagraphFormatting) -> ParagraphFormatting {
        ParagraphFormatting {
            alignment: self.alignment.or_else(|| base.alignment.clone()),
            left_indent_twips: self.left_indent_twips.or(base.left_indent_twips),
            first_line_indent_twips: self.first_line_indent_twips.or(base.first_line_indent_twips),
            num_id: self.num_id.or(base.num_id),
            ilvl: self.ilvl.or(base.ilvl),
        }
    }
}

/// Resolved run-level formatting. Booleans are `Some(false)` for an explicit
/// `val="0"/"false"`, `None` when the element is simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunFormatting {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub highlight: Option<String>,
}

impl RunFormatting {
    fn layered_over(self, base: &RunFormatting) -> RunFormatting {
        RunFormatting {
            bold: self.bold.or(base.bold),
            italic: self.italic.or(base.italic),
            underline: self.underline.or(base.underline),
            highlight: self.highlight.or_else(|| base.highlight.clone()),
        }
    }

    pub fn is_emphasized(&self) -> bool {
        self.bold == Some(true) || self.underline == Some(true)
    }
}

#[derive(Debug, Clone, Default)]
struct StyleDef {
    name: Option<String>,
    based_on: Option<String>,
    ppr: ParagraphFormatting,
    rpr: RunFormatting,
}

/// Parsed `styles.xml`: every `w:style` keyed by `styleId`, plus the default
/// paragraph/character style ids (the ones with `w:default="1"`).
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    styles: HashMap<String, StyleDef>,
    pub default_paragraph_style: Option<String>,
}

impl StyleSheet {
    pub fn parse(doc: &XmlDocument) -> Self {
        let mut out = StyleSheet::default();
        let Some(root) = doc.root() else { return out };

        for node in doc.children(root).filter(|&c| doc.is_element(c, NS_W, "style")) {
            let Some(style_id) = doc.attr(node, &w("styleId")).map(str::to_string) else { continue };
            let style_type = doc.attr(node, &w("type")).unwrap_or("paragraph");
            let is_default = matches!(doc.attr(node, &w("default")), Some("1") | Some("true"));

            let name = doc
                .children(node)
                .find(|&c| doc.is_element(c, NS_W, "name"))
                .and_then(|c| doc.attr(c, &w("val")))
                .map(str::to_string);
            let based_on = doc
                .children(node)
                .find(|&c| doc.is_element(c, NS_W, "basedOn"))
                .and_then(|c| doc.attr(c, &w("val")))
                .map(str::to_string);

            let ppr = doc
                .children(node)
                .find(|&c| doc.is_element(c, NS_W, "pPr"))
                .map(|p| parse_ppr(doc, p))
                .unwrap_or_default();
            let rpr = doc
                .children(node)
                .find(|&c| doc.is_element(c, NS_W, "rPr"))
                .map(|r| parse_rpr(doc, r))
                .unwrap_or_default();

            if is_default && style_type == "paragraph" {
                out.default_paragraph_style = Some(style_id.clone());
            }
            out.styles.insert(style_id, StyleDef { name, based_on, ppr, rpr });
        }
        out
    }

    pub fn style_name(&self, style_id: &str) -> Option<&str> {
        self.styles.get(style_id).and_then(|s| s.name.as_deref())
    }

    /// Resolve `style_id`'s full paragraph formatting by walking `basedOn`,
    /// nearest style winning, halting on a cycle.
    pub fn resolve_paragraph_style(&self, style_id: &str) -> ParagraphFormatting {
        let mut seen = std::collections::HashSet::new();
        self.resolve_ppr_chain(style_id, &mut seen)
    }

    fn resolve_ppr_chain(&self, style_id: &str, seen: &mut std::collections::HashSet<String>) -> ParagraphFormatting {
        if !seen.insert(style_id.to_string()) {
            return ParagraphFormatting::default();
        }
        let Some(def) = self.styles.get(style_id) else { return ParagraphFormatting::default() };
        let base = def.based_on.as_deref().map(|b| self.resolve_ppr_chain(b, seen)).unwrap_or_default();
        def.ppr.clone().layered_over(&base)
    }

    /// Resolve `style_id`'s full run formatting, independent of the
    /// paragraph-style chain (a character style's `basedOn` targets other
    /// character styles, never a paragraph style).
    pub fn resolve_run_style(&self, style_id: &str) -> RunFormatting {
        let mut seen = std::collections::HashSet::new();
        self.resolve_rpr_chain(style_id, &mut seen)
    }

    fn resolve_rpr_chain(&self, style_id: &str, seen: &mut std::collections::HashSet<String>) -> RunFormatting {
        if !seen.insert(style_id.to_string()) {
            return RunFormatting::default();
        }
        let Some(def) = self.styles.get(style_id) else { return RunFormatting::default() };
        let base = def.based_on.as_deref().map(|b| self.resolve_rpr_chain(b, seen)).unwrap_or_default();
        def.rpr.clone().layered_over(&base)
    }

    /// Full paragraph formatting for the paragraph element `p`: direct
    /// `w:pPr` wins, falling back to its `pStyle` chain (or the document
    /// default paragraph style if it names none).
    pub fn paragraph_formatting(&self, doc: &XmlDocument, p: NodeId) -> ParagraphFormatting {
        let direct_ppr = doc.children(p).find(|&c| doc.is_element(c, NS_W, "pPr"));
        let direct = direct_ppr.map(|pp| parse_ppr(doc, pp)).unwrap_or_default();
        let style_id = direct_ppr
            .and_then(|pp| doc.children(pp).find(|&c| doc.is_element(c, NS_W, "pStyle")))
            .and_then(|ps| doc.attr(ps, &w("val")))
            .map(str::to_string)
            .or_else(|| self.default_paragraph_style.clone());
        let chain = style_id.as_deref().map(|s| self.resolve_paragraph_style(s)).unwrap_or_default();
        direct.layered_over(&chain)
    }

    pub fn paragraph_style_id(&self, doc: &XmlDocument, p: NodeId) -> Option<String> {
        doc.children(p)
            .find(|&c| doc.is_element(c, NS_W, "pPr"))
            .and_then(|pp| doc.children(pp).find(|&c| doc.is_element(c, NS_W, "pStyle")))
            .and_then(|ps| doc.attr(ps, &w("val")))
            .map(str::to_string)
            .or_else(|| self.default_paragraph_style.clone())
    }

    /// Full run formatting for `run` inside paragraph `p`: direct `w:rPr` >
    /// `rStyle` chain > paragraph mark's default `w:pPr/w:rPr` > paragraph
    /// style chain's own `w:rPr`.
    pub fn run_formatting(&self, doc: &XmlDocument, p: NodeId, run: NodeId) -> RunFormatting {
        let direct_rpr = doc.children(run).find(|&c| doc.is_element(c, NS_W, "rPr"));
        let direct = direct_rpr.map(|rp| parse_rpr(doc, rp)).unwrap_or_default();

        let rstyle = direct_rpr
            .and_then(|rp| doc.children(rp).find(|&c| doc.is_element(c, NS_W, "rStyle")))
            .and_then(|rs| doc.attr(rs, &w("val")))
            .map(|id| self.resolve_run_style(id))
            .unwrap_or_default();

        let para_default_rpr = doc
            .children(p)
            .find(|&c| doc.is_element(c, NS_W, "pPr"))
            .and_then(|pp| doc.children(pp).find(|&c| doc.is_element(c, NS_W, "rPr")))
            .map(|rp| parse_rpr(doc, rp))
            .unwrap_or_default();

        let style_chain = self
            .paragraph_style_id(doc, p)
            .map(|s| self.resolve_run_style(&s))
            .unwrap_or_default();

        direct.layered_over(&rstyle).layered_over(&para_default_rpr).layered_over(&style_chain)
    }
}

fn parse_ppr(doc: &XmlDocument, ppr: NodeId) -> ParagraphFormatting {
    let alignment = doc
        .children(ppr)
        .find(|&c| doc.is_element(c, NS_W, "jc"))
        .and_then(|c| doc.attr(c, &w("val")))
        .map(str::to_string);

    let (mut left, mut first_line) = (None, None);
    if let Some(ind) = doc.children(ppr).find(|&c| doc.is_element(c, NS_W, "ind")) {
        left = doc
            .attr(ind, &w("left"))
            .or_else(|| doc.attr(ind, &w("start")))
            .and_then(|v| v.parse::<i32>().ok());
        first_line = doc.attr(ind, &w("firstLine")).and_then(|v| v.parse::<i32>().ok()).or_else(|| {
            doc.attr(ind, &w("hanging")).and_then(|v| v.parse::<i32>().ok()).map(|h| -h)
        });
    }

    let (mut num_id, mut ilvl) = (None, None);
    if let Some(num_pr) = doc.children(ppr).find(|&c| doc.is_element(c, NS_W, "numPr")) {
        num_id = doc
            .children(num_pr)
            .find(|&c| doc.is_element(c, NS_W, "numId"))
            .and_then(|c| doc.attr(c, &w("val")))
            .and_then(|v| v.parse::<u32>().ok());
        ilvl = doc
            .children(num_pr)
            .find(|&c| doc.is_element(c, NS_W, "ilvl"))
            .and_then(|c| doc.attr(c, &w("val")))
            .and_then(|v| v.parse::<u32>().ok());
    }

    ParagraphFormatting { alignment, left_indent_twips: left, first_line_indent_twips: first_line, num_id, ilvl }
}

fn parse_rpr(doc: &XmlDocument, rpr: NodeId) -> RunFormatting {
    RunFormatting {
        bold: parse_toggle(doc, rpr, "b"),
        italic: parse_toggle(doc, rpr, "i"),
        underline: parse_underline(doc, rpr),
        highlight: doc
            .children(rpr)
            .find(|&c| doc.is_element(c, NS_W, "highlight"))
            .and_then(|c| doc.attr(c, &w("val")))
            .map(str::to_string),
    }
}

fn parse_toggle(doc: &XmlDocument, rpr: NodeId, local: &str) -> Option<bool> {
    let el = doc.children(rpr).find(|&c| doc.is_element(c, NS_W, local))?;
    Some(!matches!(doc.attr(el, &w("val")), Some("0") | Some("false")))
}

fn parse_underline(doc: &XmlDocument, rpr: NodeId) -> Option<bool> {
    let el = doc.children(rpr).find(|&c| doc.is_element(c, NS_W, "u"))?;
    match doc.attr(el, &w("val")) {
        Some("none") => Some(false),
        _ => Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::node::XmlNodeData;
    use crate::xml::xname::XAttribute;

    fn build_styles(pairs: &[(&str, Option<&str>, bool)]) -> XmlDocument {
        // (styleId, basedOn, bold-direct)
        let mut doc = XmlDocument::new();
        let root = doc.add_root(XmlNodeData::element(w("styles")));
        for &(id, based_on, bold) in pairs {
            let style =
                doc.add_child(root, XmlNodeData::element_with_attrs(w("style"), vec![XAttribute::new(w("styleId"), id)]));
            if let Some(b) = based_on {
                let bo = doc.add_child(style, XmlNodeData::element(w("basedOn")));
                doc.set_attr(bo, w("val"), b);
            }
            if bold {
                let rpr = doc.add_child(style, XmlNodeData::element(w("rPr")));
                doc.add_child(rpr, XmlNodeData::element(w("b")));
            }
        }
        doc
    }

    #[test]
    fn run_style_chain_inherits_through_based_on() {
        let xml = build_styles(&[("Base", None, true), ("Child", Some("Base"), false)]);
        let sheet = StyleSheet::parse(&xml);
        let resolved = sheet.resolve_run_style("Child");
        assert_eq!(resolved.bold, Some(true));
    }

    #[test]
    fn cyclic_based_on_halts_instead_of_looping() {
        let xml = build_styles(&[("A", Some("B"), false), ("B", Some("A"), true)]);
        let sheet = StyleSheet::parse(&xml);
        // Must terminate; exact value is secondary to not hanging.
        let _ = sheet.resolve_run_style("A");
    }

    #[test]
    fn explicit_false_toggle_overrides_inherited_true() {
        let mut doc = XmlDocument::new();
        let rpr = doc.add_root(XmlNodeData::element(w("rPr")));
        let b = doc.add_child(rpr, XmlNodeData::element(w("b")));
        doc.set_attr(b, w("val"), "0");
        assert_eq!(parse_rpr(&doc, rpr).bold, Some(false));
    }
}
