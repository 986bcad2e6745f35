//! Parse a package part's XML bytes into an [`XmlDocument`].
//!
//! Namespace-aware parsing is delegated to `quick_xml::reader::NsReader`
//! (the teacher parses every other format with plain `quick_xml::Reader`
//! plus manual prefix bookkeeping; we need full namespace resolution because
//! the whole engine addresses elements by `(namespace, local)` pairs, never
//! by raw prefix, per the "namespace safety" design note).

use indextree::NodeId;
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use super::arena::XmlDocument;
use super::node::XmlNodeData;
use super::xname::{XAttribute, XName};

#[derive(Debug, thiserror::Error)]
pub enum XmlReadError {
    #[error("malformed XML: {0}")]
    Parse(String),
    #[error("document has no root element")]
    Empty,
}

/// Parse a complete XML document (an OPC part's bytes) into an [`XmlDocument`].
pub fn parse_document(bytes: &[u8]) -> Result<XmlDocument, XmlReadError> {
    let mut reader = NsReader::from_reader(bytes);
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = false;

    let mut doc = XmlDocument::new();
    let mut stack: Vec<NodeId> = Vec::new();
    let mut buf = Vec::new();

    loop {
        let (resolved_ns, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| XmlReadError::Parse(e.to_string()))?;

        match event {
            Event::Start(start) => {
                let name = resolve_name(resolved_ns, start.name().local_name().as_ref());
                let attrs = resolve_attrs(&reader, &start)?;
                let node = doc.new_node(XmlNodeData::element_with_attrs(name, attrs));
                attach(&mut doc, &mut stack, node);
                stack.push(node);
            }
            Event::Empty(start) => {
                let name = resolve_name(resolved_ns, start.name().local_name().as_ref());
                let attrs = resolve_attrs(&reader, &start)?;
                let node = doc.new_node(XmlNodeData::element_with_attrs(name, attrs));
                attach(&mut doc, &mut stack, node);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text) => {
                let unescaped = text
                    .decode()
                    .map_err(|e| XmlReadError::Parse(e.to_string()))?;
                if !unescaped.is_empty() {
                    let node = doc.new_node(XmlNodeData::text(unescaped.into_owned()));
                    attach(&mut doc, &mut stack, node);
                }
            }
            Event::CData(cdata) => {
                let text = String::from_utf8_lossy(cdata.as_ref()).into_owned();
                let node = doc.new_node(XmlNodeData::text(text));
                attach(&mut doc, &mut stack, node);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if doc.root().is_none() {
        return Err(XmlReadError::Empty);
    }
    Ok(doc)
}

fn attach(doc: &mut XmlDocument, stack: &mut Vec<NodeId>, node: NodeId) {
    match stack.last() {
        Some(&parent) => doc.append(parent, node),
        None => {
            // First element encountered becomes the root; re-home it since
            // `new_node` already allocated it outside of `add_root`.
            doc.set_root_for_reader(node);
        }
    }
}

fn resolve_name(resolved: ResolveResult, local: &[u8]) -> XName {
    let local = String::from_utf8_lossy(local).into_owned();
    match resolved {
        ResolveResult::Bound(ns) => XName::new(String::from_utf8_lossy(ns.as_ref()).into_owned(), local),
        ResolveResult::Unbound | ResolveResult::Unknown(_) => XName::unqualified(local),
    }
}

fn resolve_attrs(
    reader: &NsReader<&[u8]>,
    start: &quick_xml::events::BytesStart,
) -> Result<Vec<XAttribute>, XmlReadError> {
    let mut out = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlReadError::Parse(e.to_string()))?;
        // Skip namespace declarations themselves; they are implicit in the
        // resolved names of everything that uses them.
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let name = resolve_name(resolved, local.as_ref());
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| XmlReadError::Parse(e.to_string()))?
            .into_owned();
        out.push(XAttribute::new(name, value));
    }
    Ok(out)
}
