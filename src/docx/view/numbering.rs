//! Numbering resolver: `w:abstractNum`/`w:num` parsing and per-document list
//! counter state (§4.10).
//!
//! The teacher's own `ooxml::docx::numbering::Numbering` only tabulates ids
//! (`abstractNumId`, `numId` -> `abstractNumId`) for enumeration — it never
//! resolves a level's `lvlText`/`numFmt` or renders a counter, since litchi
//! is read-only and has no paragraph-projection use for list labels. The
//! per-level parsing and the `%n` counter substitution below have no teacher
//! precedent and are built directly from the spec's algorithm.

use std::collections::HashMap;

use indextree::NodeId;

use crate::xml::namespaces::{w, NS_W};
use crate::xml::XmlDocument;

/// One level (`w:lvl`) of an abstract numbering definition.
#[derive(Debug, Clone)]
pub struct NumberingLevel {
    pub start: i64,
    pub num_fmt: String,
    pub lvl_text: String,
    pub suff: Suffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suffix {
    Tab,
    Space,
    Nothing,
}

impl Suffix {
    fn from_val(val: &str) -> Self {
        match val {
            "space" => Suffix::Space,
            "nothing" => Suffix::Nothing,
            _ => Suffix::Tab,
        }
    }

    fn as_char(self) -> &'static str {
        match self {
            Suffix::Tab => "\t",
            Suffix::Space => " ",
            Suffix::Nothing => "",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct AbstractNum {
    levels: HashMap<u32, NumberingLevel>,
}

#[derive(Debug, Clone, Default)]
struct NumInstance {
    abstract_num_id: u32,
    /// `ilvl -> startOverride` from `w:num/w:lvlOverride`.
    start_overrides: HashMap<u32, i64>,
}

/// Parsed `numbering.xml`: abstract templates plus concrete instances.
#[derive(Debug, Clone, Default)]
pub struct Numbering {
    abstract_nums: HashMap<u32, AbstractNum>,
    nums: HashMap<u32, NumInstance>,
}

impl Numbering {
    pub fn parse(doc: &XmlDocument) -> Self {
        let mut out = Numbering::default();
        let Some(root) = doc.root() else { return out };

        for node in doc.descendants(root) {
            if doc.is_element(node, NS_W, "abstractNum") {
                let Some(id) = parse_u32(doc.attr(node, &w("abstractNumId"))) else { continue };
                let mut abs = AbstractNum::default();
                for lvl in doc.children(node).filter(|&c| doc.is_element(c, NS_W, "lvl")) {
                    let Some(ilvl) = parse_u32(doc.attr(lvl, &w("ilvl"))) else { continue };
                    abs.levels.insert(ilvl, parse_level(doc, lvl));
                }
                out.abstract_nums.insert(id, abs);
            } else if doc.is_element(node, NS_W, "num") {
                let Some(id) = parse_u32(doc.attr(node, &w("numId"))) else { continue };
                let abstract_num_id = doc
                    .children(node)
                    .find(|&c| doc.is_element(c, NS_W, "abstractNumId"))
                    .and_then(|c| parse_u32(doc.attr(c, &w("val"))))
                    .unwrap_or(0);
                let mut start_overrides = HashMap::new();
                for ov in doc.children(node).filter(|&c| doc.is_element(c, NS_W, "lvlOverride")) {
                    let Some(ilvl) = parse_u32(doc.attr(ov, &w("ilvl"))) else { continue };
                    if let Some(so) = doc.children(ov).find(|&c| doc.is_element(c, NS_W, "startOverride")) {
                        if let Some(val) = parse_u32(doc.attr(so, &w("val"))) {
                            start_overrides.insert(ilvl, val as i64);
                        }
                    }
                }
                out.nums.insert(id, NumInstance { abstract_num_id, start_overrides });
            }
        }
        out
    }

    fn level(&self, num_id: u32, ilvl: u32) -> Option<&NumberingLevel> {
        let inst = self.nums.get(&num_id)?;
        self.abstract_nums.get(&inst.abstract_num_id)?.levels.get(&ilvl)
    }

    fn effective_start(&self, num_id: u32, ilvl: u32) -> i64 {
        let from_override = self.nums.get(&num_id).and_then(|n| n.start_overrides.get(&ilvl).copied());
        from_override.unwrap_or_else(|| self.level(num_id, ilvl).map(|l| l.start).unwrap_or(1))
    }
}

fn parse_u32(v: Option<&str>) -> Option<u32> {
    v.and_then(|s| s.parse::<u32>().ok())
}

fn parse_level(doc: &XmlDocument, lvl: NodeId) -> NumberingLevel {
    let start = doc
        .children(lvl)
        .find(|&c| doc.is_element(c, NS_W, "start"))
        .and_then(|c| doc.attr(c, &w("val")))
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(1);
    let num_fmt = doc
        .children(lvl)
        .find(|&c| doc.is_element(c, NS_W, "numFmt"))
        .and_then(|c| doc.attr(c, &w("val")))
        .unwrap_or("decimal")
        .to_string();
    let lvl_text = doc
        .children(lvl)
        .find(|&c| doc.is_element(c, NS_W, "lvlText"))
        .and_then(|c| doc.attr(c, &w("val")))
        .unwrap_or("")
        .to_string();
    let suff = doc
        .children(lvl)
        .find(|&c| doc.is_element(c, NS_W, "suff"))
        .and_then(|c| doc.attr(c, &w("val")))
        .map(Suffix::from_val)
        .unwrap_or(Suffix::Tab);
    NumberingLevel { start, num_fmt, lvl_text, suff }
}

/// Resolved label for one paragraph: the rendered text plus suffix, and
/// whether any counter was consumed (vs. a literal bullet/none label).
#[derive(Debug, Clone, PartialEq)]
pub struct ListLabel {
    pub text: String,
    pub num_id: u32,
    pub ilvl: u32,
    pub is_auto_numbered: bool,
}

/// Per-document counter state carried across paragraphs as they are visited
/// in order; `(num_id, ilvl) -> last rendered counter value`.
#[derive(Debug, Clone, Default)]
pub struct NumberingState {
    counters: HashMap<(u32, u32), i64>,
}

impl NumberingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the label for `(num_id, ilvl)` against `numbering`, advancing
    /// this state's counters. Bullet/none levels are literal and never
    /// consume or reset a counter.
    pub fn resolve(&mut self, numbering: &Numbering, num_id: u32, ilvl: u32) -> Option<ListLabel> {
        let level = numbering.level(num_id, ilvl)?;
        let is_auto_numbered = level.num_fmt != "bullet" && level.num_fmt != "none";

        if !is_auto_numbered {
            return Some(ListLabel {
                text: format!("{}{}", level.lvl_text, level.suff.as_char()),
                num_id,
                ilvl,
                is_auto_numbered,
            });
        }

        let start = numbering.effective_start(num_id, ilvl);
        let value = match self.counters.get(&(num_id, ilvl)) {
            Some(&prev) => prev + 1,
            None => start,
        };
        self.counters.insert((num_id, ilvl), value);

        // Reset every deeper level so its next appearance restarts at its own start.
        for deeper in ilvl + 1..9 {
            let deeper_start = numbering.effective_start(num_id, deeper);
            self.counters.insert((num_id, deeper), deeper_start - 1);
        }

        let text = render_lvl_text(numbering, num_id, ilvl, &level.lvl_text, self);
        Some(ListLabel { text: format!("{text}{}", level.suff.as_char()), num_id, ilvl, is_auto_numbered })
    }
}

/// Substitute every `%n` placeholder (n = 1..=9) in `lvl_text` with the
/// formatted counter of level `n-1`, using level `n-1`'s own `numFmt`.
fn render_lvl_text(numbering: &Numbering, num_id: u32, ilvl: u32, lvl_text: &str, state: &NumberingState) -> String {
    let mut out = String::with_capacity(lvl_text.len());
    let mut chars = lvl_text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            if let Some(&d) = chars.peek() {
                if d.is_ascii_digit() && d != '0' {
                    chars.next();
                    let n = d.to_digit(10).unwrap();
                    let ref_ilvl = n - 1;
                    let value = if ref_ilvl == ilvl {
                        state.counters.get(&(num_id, ilvl)).copied().unwrap_or(1)
                    } else {
                        state.counters.get(&(num_id, ref_ilvl)).copied().unwrap_or(1)
                    };
                    let fmt = numbering.level(num_id, ref_ilvl).map(|l| l.num_fmt.as_str()).unwrap_or("decimal");
                    out.push_str(&format_counter(fmt, value));
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Render `value` in the numbering format named by OOXML's `w:numFmt`.
pub fn format_counter(fmt: &str, value: i64) -> String {
    match fmt {
        "lowerLetter" => base26(value, false),
        "upperLetter" => base26(value, true),
        "lowerRoman" => to_roman(value).to_lowercase(),
        "upperRoman" => to_roman(value),
        "bullet" | "none" => String::new(),
        _ => value.to_string(),
    }
}

/// Excel-style base-26 lettering: 1 -> a, 26 -> z, 27 -> aa, 28 -> ab, ...
fn base26(mut value: i64, upper: bool) -> String {
    if value < 1 {
        return String::new();
    }
    let mut letters = Vec::new();
    while value > 0 {
        value -= 1;
        let letter = (b'a' + (value % 26) as u8) as char;
        letters.push(letter);
        value /= 26;
    }
    letters.reverse();
    let s: String = letters.into_iter().collect();
    if upper { s.to_uppercase() } else { s }
}

fn to_roman(mut value: i64) -> String {
    if value <= 0 {
        return String::new();
    }
    const NUMERALS: [(i64, &str); 13] = [
        (1000, "M"), (900, "CM"), (500, "D"), (400, "CD"),
        (100, "C"), (90, "XC"), (50, "L"), (40, "XL"),
        (10, "X"), (9, "IX"), (5, "V"), (4, "IV"), (1, "I"),
    ];
    let mut out = String::new();
    for &(n, sym) in &NUMERALS {
        while value >= n {
            out.push_str(sym);
            value -= n;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::node::XmlNodeData;
    use crate::xml::xname::XAttribute;

    fn build_single_level_numbering(num_fmt: &str, lvl_text: &str, start: i64) -> XmlDocument {
        let mut doc = XmlDocument::new();
        let root = doc.add_root(XmlNodeData::element(w("numbering")));
        let abs = doc.add_child(
            root,
            XmlNodeData::element_with_attrs(w("abstractNum"), vec![XAttribute::new(w("abstractNumId"), "0")]),
        );
        let lvl = doc.add_child(abs, XmlNodeData::element_with_attrs(w("lvl"), vec![XAttribute::new(w("ilvl"), "0")]));
        let start_el = doc.add_child(lvl, XmlNodeData::element(w("start")));
        doc.set_attr(start_el, w("val"), start.to_string());
        let fmt_el = doc.add_child(lvl, XmlNodeData::element(w("numFmt")));
        doc.set_attr(fmt_el, w("val"), num_fmt);
        let text_el = doc.add_child(lvl, XmlNodeData::element(w("lvlText")));
        doc.set_attr(text_el, w("val"), lvl_text);

        let num = doc.add_child(root, XmlNodeData::element_with_attrs(w("num"), vec![XAttribute::new(w("numId"), "1")]));
        let abs_ref = doc.add_child(num, XmlNodeData::element(w("abstractNumId")));
        doc.set_attr(abs_ref, w("val"), "0");
        doc
    }

    #[test]
    fn decimal_counter_increments_across_calls() {
        let xml = build_single_level_numbering("decimal", "%1.", 1);
        let numbering = Numbering::parse(&xml);
        let mut state = NumberingState::new();

        let l1 = state.resolve(&numbering, 1, 0).unwrap();
        assert_eq!(l1.text, "1.\t");
        let l2 = state.resolve(&numbering, 1, 0).unwrap();
        assert_eq!(l2.text, "2.\t");
    }

    #[test]
    fn deeper_level_resets_when_shallower_advances() {
        let mut doc = build_single_level_numbering("decimal", "%1.", 1);
        // Add a second, deeper level to the same abstract num.
        let root = doc.root().unwrap();
        let abs = doc.descendants(root).find(|&n| doc.is_element(n, NS_W, "abstractNum")).unwrap();
        let lvl2 = doc.add_child(abs, XmlNodeData::element_with_attrs(w("lvl"), vec![XAttribute::new(w("ilvl"), "1")]));
        let start_el = doc.add_child(lvl2, XmlNodeData::element(w("start")));
        doc.set_attr(start_el, w("val"), "1");
        let fmt_el = doc.add_child(lvl2, XmlNodeData::element(w("numFmt")));
        doc.set_attr(fmt_el, w("val"), "lowerLetter");
        let text_el = doc.add_child(lvl2, XmlNodeData::element(w("lvlText")));
        doc.set_attr(text_el, w("val"), "%2)");

        let numbering = Numbering::parse(&doc);
        let mut state = NumberingState::new();
        assert_eq!(state.resolve(&numbering, 1, 1).unwrap().text, "a)\t");
        assert_eq!(state.resolve(&numbering, 1, 1).unwrap().text, "b)\t");
        // Advancing level 0 must reset level 1 back to its start.
        state.resolve(&numbering, 1, 0).unwrap();
        assert_eq!(state.resolve(&numbering, 1, 1).unwrap().text, "a)\t");
    }

    #[test]
    fn base26_handles_double_letters() {
        assert_eq!(base26(1, false), "a");
        assert_eq!(base26(26, false), "z");
        assert_eq!(base26(27, false), "aa");
        assert_eq!(base26(28, false), "ab");
    }

    #[test]
    fn roman_numerals_render_correctly() {
        assert_eq!(to_roman(4), "IV");
        assert_eq!(to_roman(1994), "MCMXCIV");
    }

    #[test]
    fn bullet_level_is_literal_and_does_not_consume_a_counter() {
        let xml = build_single_level_numbering("bullet", "\u{f0b7}", 1);
        let numbering = Numbering::parse(&xml);
        let mut state = NumberingState::new();
        let label = state.resolve(&numbering, 1, 0).unwrap();
        assert!(!label.is_auto_numbered);
        assert_eq!(label.text, "\u{f0b7}\t");
    }
}
