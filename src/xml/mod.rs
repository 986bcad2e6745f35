//! The mutable XML DOM used by every editing operation in this crate.
//!
//! Litchi parses OOXML parts as one-shot `quick_xml` event streams with no
//! persistent tree (see `ooxml::docx::parts::document_part`); that is fine
//! for read-only text/table extraction but cannot support in-place edits.
//! This module keeps `quick_xml` for tokenizing/escaping (the teacher's
//! choice) but backs the tree itself with `indextree`, following the pattern
//! in the Open-Xml-PowerTools `redline-rs` port (see `arena` module docs).

pub mod arena;
pub mod escape;
pub mod namespaces;
pub mod node;
pub mod reader;
pub mod writer;
pub mod xname;

pub use arena::XmlDocument;
pub use node::XmlNodeData;
pub use reader::{parse_document, XmlReadError};
pub use writer::write_document;
pub use xname::{XAttribute, XName};
