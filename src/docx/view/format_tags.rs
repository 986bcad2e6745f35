//! Formatting-tag emission (§4.10), optional and off by default.
//!
//! No teacher or pack precedent renders a tagged-text projection; this is
//! built directly from the spec. The modal-baseline computation and the
//! definition-span regex are the two genuinely novel pieces — everything
//! else (bold/italic/underline/highlight lookup, hyperlink `r:id`
//! resolution) reuses [`super::styles::StyleSheet`] and
//! [`crate::opc::Relationships`], already built for other modules.

use std::collections::HashMap;

use indextree::NodeId;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::opc::Relationships;
use crate::xml::namespaces::{rns, NS_W};
use crate::xml::XmlDocument;

use super::styles::{RunFormatting, StyleSheet};
use crate::docx::text::visible_runs;

/// The dominant `(bold, italic, underline)` combination across body
/// characters, plus whether it clears the 60% threshold required to
/// suppress redundant tags.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModalBaseline {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub dominant: bool,
}

/// `body_paragraphs`: every non-header body paragraph to weigh into the
/// baseline (paragraphs with a detected header are excluded by the caller,
/// per "modal baseline over all non-header body runs").
pub fn compute_modal_baseline(doc: &XmlDocument, styles: &StyleSheet, body_paragraphs: &[NodeId]) -> ModalBaseline {
    let mut counts: HashMap<(bool, bool, bool), usize> = HashMap::new();
    let mut total = 0usize;

    for &p in body_paragraphs {
        for run in visible_runs(doc, p) {
            let len = run.text.chars().count();
            if len == 0 {
                continue;
            }
            let fmt = styles.run_formatting(doc, p, run.run_id);
            let key = (fmt.bold == Some(true), fmt.italic == Some(true), fmt.underline == Some(true));
            *counts.entry(key).or_insert(0) += len;
            total += len;
        }
    }

    let Some((&(bold, italic, underline), &count)) = counts.iter().max_by_key(|(_, &c)| c) else {
        return ModalBaseline::default();
    };
    let dominant = total > 0 && (count as f64 / total as f64) >= 0.6;
    ModalBaseline { bold, italic, underline, dominant }
}

static DEFINITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(["“])([^"”]{1,80})(["”])\s+(?:means|shall mean|has the meaning(?: set forth| given)?(?: to it)?(?: in this [^,.;]+)?)"#,
    )
    .expect("valid regex")
});

/// One character of a paragraph's visible text, annotated with the
/// formatting/hyperlink context of the run it came from.
struct Atom {
    ch: char,
    fmt: RunFormatting,
    href: Option<String>,
}

/// `renderFormattingTags`: produce the tagged-text rendering of `p`'s body
/// text (chars `[skip_chars, end)`, letting callers suppress a detected
/// header prefix), against `baseline` and `rels` (the document part's
/// relationships, for hyperlink `r:id` resolution).
pub fn render_formatting_tags(
    doc: &XmlDocument,
    styles: &StyleSheet,
    p: NodeId,
    skip_chars: usize,
    baseline: ModalBaseline,
    rels: Option<&Relationships>,
) -> String {
    let mut atoms: Vec<Atom> = Vec::new();
    for run in visible_runs(doc, p) {
        let fmt = styles.run_formatting(doc, p, run.run_id);
        let href = hyperlink_href(doc, run.run_id, rels);
        for ch in run.text.chars() {
            atoms.push(Atom { ch, fmt: fmt.clone(), href: href.clone() });
        }
    }
    if skip_chars >= atoms.len() {
        return String::new();
    }
    let atoms = &atoms[skip_chars..];

    let plain: String = atoms.iter().map(|a| a.ch).collect();
    let def_spans = definition_spans(&plain);

    let mut out = String::new();
    let mut i = 0usize;
    let mut open_tags: Vec<&'static str> = Vec::new();

    while i < atoms.len() {
        if let Some(span) = def_spans.iter().find(|s| s.consumed.0 == i) {
            close_tags(&mut out, &mut open_tags);
            out.push_str("<definition>");
            let (term_start, term_end) = span.term;
            let inner: String = atoms[term_start..term_end].iter().map(|a| a.ch).collect();
            out.push_str(&escape(&inner));
            out.push_str("</definition>");
            i = span.consumed.1;
            continue;
        }

        let atom = &atoms[i];
        let wanted = wanted_tags(&atom.fmt, baseline);
        if wanted != open_tags {
            close_tags(&mut out, &mut open_tags);
            for &t in &wanted {
                out.push('<');
                out.push_str(t);
                out.push('>');
            }
            open_tags = wanted;
        }

        if let Some(href) = &atom.href {
            out.push_str(&format!("<a href=\"{}\">", escape(href)));
            while i < atoms.len() && atoms[i].href.as_deref() == Some(href.as_str()) && !def_spans.iter().any(|s| s.consumed.0 == i) {
                out.push_str(&escape(&atoms[i].ch.to_string()));
                i += 1;
            }
            out.push_str("</a>");
            continue;
        }

        out.push_str(&escape(&atom.ch.to_string()));
        i += 1;
    }
    close_tags(&mut out, &mut open_tags);
    collapse_adjacent(&out)
}

fn wanted_tags(fmt: &RunFormatting, baseline: ModalBaseline) -> Vec<&'static str> {
    let mut tags = Vec::new();
    let bold = fmt.bold == Some(true);
    let italic = fmt.italic == Some(true);
    let underline = fmt.underline == Some(true);

    let show_bold = if baseline.dominant { bold && !baseline.bold } else { bold };
    let show_italic = if baseline.dominant { italic && !baseline.italic } else { italic };
    let show_underline = if baseline.dominant { underline && !baseline.underline } else { underline };

    if show_bold {
        tags.push("b");
    }
    if show_italic {
        tags.push("i");
    }
    if show_underline {
        tags.push("u");
    }
    if let Some(_hl) = &fmt.highlight {
        tags.push("highlighting");
    }
    tags
}

fn close_tags(out: &mut String, open: &mut Vec<&'static str>) {
    for t in open.drain(..).rev() {
        out.push_str("</");
        out.push_str(t);
        out.push('>');
    }
}

/// Collapse `</x><x>` pairs left behind where adjacent atoms happened to
/// want the exact same tag set rendered as a fresh open/close.
fn collapse_adjacent(s: &str) -> String {
    static COLLAPSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</(\w+)><\1>").expect("valid regex"));
    let mut current = s.to_string();
    loop {
        let next = COLLAPSE_RE.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn escape(s: &str) -> String {
    crate::xml::escape::escape_xml(s)
}

/// A definition span: `consumed` is the full char range replaced by
/// `<definition>…</definition>` — the surrounding quote characters plus the
/// term, absorbed so neither quote renders — while `term` is the narrower
/// inner range (quotes excluded) actually placed between the tags. The
/// trailing "means"/"has the meaning" verb is left outside both ranges so it
/// renders with normal formatting after `</definition>`.
struct DefinitionSpan {
    consumed: (usize, usize),
    term: (usize, usize),
}

fn definition_spans(plain: &str) -> Vec<DefinitionSpan> {
    DEFINITION_RE
        .captures_iter(plain)
        .filter_map(|caps| Some((caps.get(1)?, caps.get(2)?, caps.get(3)?)))
        .map(|(open_quote, term, close_quote)| {
            let char_offset = |byte: usize| plain[..byte].chars().count();
            DefinitionSpan {
                consumed: (char_offset(open_quote.start()), char_offset(close_quote.end())),
                term: (char_offset(term.start()), char_offset(term.end())),
            }
        })
        .collect()
}

fn hyperlink_href(doc: &XmlDocument, run: NodeId, rels: Option<&Relationships>) -> Option<String> {
    let parent = doc.parent(run)?;
    if !doc.is_element(parent, NS_W, "hyperlink") {
        return None;
    }
    let r_id = doc.attr(parent, &rns("id"))?;
    let rels = rels?;
    rels.get(r_id).map(|r| r.target_ref().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::namespaces::w;
    use crate::xml::node::XmlNodeData;

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
    fn bold_run_emits_tag_when_baseline_is_not_bold() {
        let mut doc = XmlDocument::new();
        let p = doc.add_root(XmlNodeData::element(w("p")));
        run_with_text(&mut doc, p, "plain ", false);
        run_with_text(&mut doc, p, "strong", true);

        let styles = StyleSheet::default();
        let baseline = compute_modal_baseline(&doc, &styles, &[p]);
        let rendered = render_formatting_tags(&doc, &styles, p, 0, baseline, None);
        assert!(rendered.contains("<b>strong</b>"));
        assert!(!rendered.starts_with("<b>"));
    }

    #[test]
    fn dominant_bold_baseline_suppresses_redundant_tagging() {
        let mut doc = XmlDocument::new();
        let p = doc.add_root(XmlNodeData::element(w("p")));
        run_with_text(&mut doc, p, "mostly bold text here", true);
        run_with_text(&mut doc, p, "x", false);

        let styles = StyleSheet::default();
        let baseline = compute_modal_baseline(&doc, &styles, &[p]);
        assert!(baseline.bold);
        assert!(baseline.dominant);

        let rendered = render_formatting_tags(&doc, &styles, p, 0, baseline, None);
        assert!(!rendered.contains("<b>"));
    }

    #[test]
    fn definition_span_is_wrapped_and_closes_active_tags() {
        let mut doc = XmlDocument::new();
        let p = doc.add_root(XmlNodeData::element(w("p")));
        run_with_text(&mut doc, p, "The term \"Agreement\" means this contract.", false);

        let styles = StyleSheet::default();
        let baseline = ModalBaseline::default();
        let rendered = render_formatting_tags(&doc, &styles, p, 0, baseline, None);
        assert!(rendered.contains("<definition>Agreement</definition>"));
        assert!(!rendered.contains('"'));
    }
}
