//! Serialize an [`XmlDocument`] back to bytes.
//!
//! Built as direct string assembly with `escape_xml`, the same style the
//! teacher uses for its own `Relationships::to_xml` (manual `push_str` plus
//! an escape helper) rather than `quick_xml::Writer`'s builder API, since the
//! namespace-prefix bookkeeping below is bespoke either way.

use std::collections::HashMap;

use indextree::NodeId;

use super::arena::XmlDocument;
use super::escape::escape_xml;
use super::namespaces::{NS_W, NS_W14, NS_W15, NS_R, NS_XML};
use super::node::XmlNodeData;

/// Serialize `doc` starting at its root element, declaring every namespace
/// used anywhere in the tree on the root element.
pub fn write_document(doc: &XmlDocument) -> String {
    let Some(root) = doc.root() else {
        return String::new();
    };
    let mut prefixes = default_prefixes();
    collect_namespaces(doc, root, &mut prefixes);

    let mut out = String::with_capacity(4096);
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    write_node(doc, root, &prefixes, &mut out, true);
    out
}

fn default_prefixes() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert(NS_W.to_string(), "w".to_string());
    m.insert(NS_W14.to_string(), "w14".to_string());
    m.insert(NS_W15.to_string(), "w15".to_string());
    m.insert(NS_R.to_string(), "r".to_string());
    m.insert(NS_XML.to_string(), "xml".to_string());
    m
}

fn collect_namespaces(doc: &XmlDocument, node: NodeId, prefixes: &mut HashMap<String, String>) {
    if let Some(XmlNodeData::Element { name, attrs }) = doc.get(node) {
        intern(prefixes, &name.namespace);
        for a in attrs {
            intern(prefixes, &a.name.namespace);
        }
    }
    for child in doc.children(node) {
        collect_namespaces(doc, child, prefixes);
    }
}

fn intern(prefixes: &mut HashMap<String, String>, ns: &str) {
    if ns.is_empty() || prefixes.contains_key(ns) {
        return;
    }
    let next = prefixes.len();
    prefixes.insert(ns.to_string(), format!("ns{next}"));
}

fn write_node(
    doc: &XmlDocument,
    node: NodeId,
    prefixes: &HashMap<String, String>,
    out: &mut String,
    is_root: bool,
) {
    match doc.get(node) {
        Some(XmlNodeData::Text(t)) => out.push_str(&escape_xml(t)),
        Some(XmlNodeData::Element { name, attrs }) => {
            let tag = qualify(prefixes, &name.namespace, &name.local);
            out.push('<');
            out.push_str(&tag);

            if is_root {
                let mut decls: Vec<(&String, &String)> = prefixes
                    .iter()
                    .filter(|(ns, _)| ns.as_str() != NS_XML)
                    .collect();
                decls.sort_by_key(|(_, prefix)| prefix.as_str());
                for (ns, prefix) in decls {
                    out.push_str(&format!(r#" xmlns:{prefix}="{}""#, escape_xml(ns)));
                }
            }

            for attr in attrs {
                let attr_name = if attr.name.namespace.is_empty() {
                    attr.name.local.clone()
                } else {
                    qualify(prefixes, &attr.name.namespace, &attr.name.local)
                };
                out.push_str(&format!(r#" {attr_name}="{}""#, escape_xml(&attr.value)));
            }

            let mut children = doc.children(node).peekable();
            if children.peek().is_none() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in children {
                write_node(doc, child, prefixes, out, false);
            }
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
        None => {}
    }
}

fn qualify(prefixes: &HashMap<String, String>, ns: &str, local: &str) -> String {
    match prefixes.get(ns) {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::node::XmlNodeData;
    use crate::xml::xname::{XAttribute, XName};

    #[test]
    fn roundtrips_simple_element() {
        let mut doc = XmlDocument::new();
        let root = doc.add_root(XmlNodeData::element_with_attrs(
            XName::new(NS_W, "p"),
            vec![XAttribute::new(XName::new(NS_W, "id"), "1")],
        ));
        let run = doc.add_child(root, XmlNodeData::element(XName::new(NS_W, "r")));
        let t = doc.add_child(run, XmlNodeData::element(XName::new(NS_W, "t")));
        doc.add_child(t, XmlNodeData::text("hello & goodbye"));

        let xml = write_document(&doc);
        assert!(xml.contains(r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#));
        assert!(xml.contains(r#"w:id="1">"#));
        assert!(xml.contains("<w:r><w:t>hello &amp; goodbye</w:t></w:r>"));
    }
}
