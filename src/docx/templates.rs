//! Bootstrap XML for optional parts, embedded at compile time.
//!
//! Mirrors the teacher's `docx::template` module (`minified_xml!` reading
//! sibling `resources/*.xml` files rather than building strings by hand)
//! applied to the four parts this engine bootstraps on first write: comment
//! threading (`comments.xml`, `commentsExtended.xml`, `people.xml`) and
//! footnotes (`footnotes.xml`, pre-seeded with the two reserved separator
//! entries).

use xml_minifier::minified_xml;

pub fn default_comments_xml() -> &'static str {
    minified_xml!("resources/comments.xml")
}

pub fn default_comments_extended_xml() -> &'static str {
    minified_xml!("resources/comments_extended.xml")
}

pub fn default_people_xml() -> &'static str {
    minified_xml!("resources/people.xml")
}

pub fn default_footnotes_xml() -> &'static str {
    minified_xml!("resources/footnotes.xml")
}
