//! Namespace-qualified element and attribute names.
//!
//! Every element/attribute in the DOM carries its namespace URI alongside the
//! local name; construction from a bare local name is intentionally not
//! provided (see the "namespace safety" design note: elements are never
//! created with a prefix-only tag name).

use std::fmt;

/// A namespace-qualified name (`{namespace-uri}local-name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XName {
    pub namespace: String,
    pub local: String,
}

impl XName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// A name with no namespace, used only for attributes that are
    /// conventionally unqualified (e.g. plain `val`, `type` on some elements).
    pub fn unqualified(local: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            local: local.into(),
        }
    }

    #[inline]
    pub fn local(&self) -> &str {
        &self.local
    }

    #[inline]
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace == namespace && self.local == local
    }
}

impl fmt::Display for XName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// A single `name="value"` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XAttribute {
    pub name: XName,
    pub value: String,
}

impl XAttribute {
    pub fn new(name: XName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}
