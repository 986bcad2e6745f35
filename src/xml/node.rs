//! Node payload stored in each `indextree` arena slot.

use super::xname::{XAttribute, XName};

/// The payload of a single tree node.
///
/// Elements carry their attributes inline (small, usually under a dozen);
/// text is kept as a separate leaf node rather than packed into the element,
/// matching how `w:t`/`w:delText` content is addressed independently of its
/// enclosing element by the bookmark and text-traversal algorithms.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNodeData {
    Element { name: XName, attrs: Vec<XAttribute> },
    Text(String),
}

impl XmlNodeData {
    pub fn element(name: XName) -> Self {
        XmlNodeData::Element {
            name,
            attrs: Vec::new(),
        }
    }

    pub fn element_with_attrs(name: XName, attrs: Vec<XAttribute>) -> Self {
        XmlNodeData::Element { name, attrs }
    }

    pub fn text(s: impl Into<String>) -> Self {
        XmlNodeData::Text(s.into())
    }

    #[inline]
    pub fn as_element(&self) -> Option<(&XName, &[XAttribute])> {
        match self {
            XmlNodeData::Element { name, attrs } => Some((name, attrs)),
            XmlNodeData::Text(_) => None,
        }
    }

    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlNodeData::Text(s) => Some(s.as_str()),
            XmlNodeData::Element { .. } => None,
        }
    }

    #[inline]
    pub fn is_element(&self, namespace: &str, local: &str) -> bool {
        matches!(self, XmlNodeData::Element { name, .. } if name.is(namespace, local))
    }
}
