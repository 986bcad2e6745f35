//! Content-type and relationship-type constants for the parts this engine reads/writes.
//!
//! A trimmed slice of the teacher's `ooxml::opc::constants` (which tabulates
//! every OOXML/ODF/iWork content type this engine never touches) down to the
//! handful of WordprocessingML part types named in the spec's package layout.

pub mod content_type {
    pub const RELATIONSHIPS: &str =
        "application/vnd.openxmlformats-package.relationships+xml";
    pub const CONTENT_TYPES: &str =
        "application/vnd.openxmlformats-package.content-types+xml";
    pub const MAIN_DOCUMENT: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
    pub const STYLES: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";
    pub const NUMBERING: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml";
    pub const COMMENTS: &str = crate::xml::namespaces::CT_COMMENTS;
    pub const COMMENTS_EXTENDED: &str = crate::xml::namespaces::CT_COMMENTS_EXTENDED;
    pub const PEOPLE: &str = crate::xml::namespaces::CT_PEOPLE;
    pub const FOOTNOTES: &str = crate::xml::namespaces::CT_FOOTNOTES;
}

pub mod relationship_type {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const STYLES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
    pub const NUMBERING: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
    pub const COMMENTS: &str = crate::xml::namespaces::RELTYPE_COMMENTS;
    pub const COMMENTS_EXTENDED: &str = crate::xml::namespaces::RELTYPE_COMMENTS_EXTENDED;
    pub const PEOPLE: &str = crate::xml::namespaces::RELTYPE_PEOPLE;
    pub const FOOTNOTES: &str = crate::xml::namespaces::RELTYPE_FOOTNOTES;
    pub const HYPERLINK: &str = crate::xml::namespaces::RELTYPE_HYPERLINK;
}

/// Default extension → content-type mappings `[Content_Types].xml` relies on
/// when a part has no explicit `Override`.
pub const DEFAULT_EXTENSIONS: &[(&str, &str)] =
    &[("rels", content_type::RELATIONSHIPS), ("xml", "application/xml")];
