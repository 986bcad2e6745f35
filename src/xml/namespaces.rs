//! OOXML namespace URIs and a small set of qualified-name constructors.
//!
//! Grounded on the teacher's `ooxml::opc::constants` module (flat `pub const`
//! namespace tables), adapted here into constructor functions because the
//! editing engine needs to build `XName`s dynamically rather than reference a
//! fixed catalog of part/content-type strings.

use super::xname::XName;

pub const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const NS_W14: &str = "http://schemas.microsoft.com/office/word/2010/wordml";
pub const NS_W15: &str = "http://schemas.microsoft.com/office/word/2012/wordml";
pub const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const NS_PKG_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
pub const NS_XML: &str = "http://www.w3.org/XML/1998/namespace";
pub const NS_XMLNS: &str = "http://www.w3.org/2000/xmlns/";

pub const RELTYPE_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
pub const RELTYPE_COMMENTS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
pub const RELTYPE_COMMENTS_EXTENDED: &str =
    "http://schemas.microsoft.com/office/2011/relationships/commentsExtended";
pub const RELTYPE_PEOPLE: &str = "http://schemas.microsoft.com/office/2011/relationships/people";
pub const RELTYPE_FOOTNOTES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footnotes";

pub const CT_COMMENTS: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml";
pub const CT_COMMENTS_EXTENDED: &str =
    "application/vnd.ms-word.commentsExtended+xml";
pub const CT_PEOPLE: &str = "application/vnd.ms-word.people+xml";
pub const CT_FOOTNOTES: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.footnotes+xml";

/// Build a `w:`-namespaced qualified name.
#[inline]
pub fn w(local: &str) -> XName {
    XName::new(NS_W, local)
}

/// Build a `w14:`-namespaced qualified name.
#[inline]
pub fn w14(local: &str) -> XName {
    XName::new(NS_W14, local)
}

/// Build a `w15:`-namespaced qualified name.
#[inline]
pub fn w15(local: &str) -> XName {
    XName::new(NS_W15, local)
}

/// Build an `r:`-namespaced (officeDocument relationships) qualified name.
#[inline]
pub fn rns(local: &str) -> XName {
    XName::new(NS_R, local)
}

/// Build an `xml:`-namespaced qualified name (e.g. `xml:space`).
#[inline]
pub fn xml_ns(local: &str) -> XName {
    XName::new(NS_XML, local)
}

/// The six `*PrChange` element local names (run/paragraph/section/table/row/cell).
pub const PR_CHANGE_ELEMENTS: [&str; 6] = [
    "rPrChange",
    "pPrChange",
    "sectPrChange",
    "tblPrChange",
    "trPrChange",
    "tcPrChange",
];

/// Tracked-change wrapper element local names.
pub const REVISION_WRAPPER_ELEMENTS: [&str; 4] = ["ins", "del", "moveFrom", "moveTo"];

/// Elements that act as barriers to run-merging within a paragraph.
pub const MERGE_BARRIER_ELEMENTS: [&str; 6] = [
    "fldChar",
    "instrText",
    "bookmarkStart",
    "bookmarkEnd",
    "commentRangeStart",
    "commentRangeEnd",
];
