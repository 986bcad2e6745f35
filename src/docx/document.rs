//! The `Document` facade: owns every DOM this engine mutates and the
//! package seam they round-trip through.
//!
//! Grounded on the teacher's `ooxml::docx::document::Document`, which also
//! sits on top of an `OpcPackage` reference and a parsed main part — but the
//! teacher's `Document` borrows from the package and is read-only. Per the
//! "Ownership" section of the spec, this `Document` instead *owns* its DOMs
//! and the package's byte buffer outright, since every operation here
//! mutates in place and must survive past a single borrow's lifetime.

use indextree::NodeId;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::opc::constants::{content_type, relationship_type};
use crate::opc::OpcPackage;
use crate::xml::namespaces::{w, NS_W};
use crate::xml::{parse_document, write_document, XmlDocument};

use super::bookmark;
use super::templates;
use super::text::paragraph_text;
use super::view::{self, numbering::Numbering, styles::StyleSheet, DocumentViewNode, DocumentViewOptions};

const DOCUMENT_PART: &str = "/word/document.xml";
const STYLES_PART: &str = "/word/styles.xml";
const NUMBERING_PART: &str = "/word/numbering.xml";
const FOOTNOTES_PART: &str = "/word/footnotes.xml";
const COMMENTS_PART: &str = "/word/comments.xml";
const COMMENTS_EXTENDED_PART: &str = "/word/commentsExtended.xml";
const PEOPLE_PART: &str = "/word/people.xml";

/// Options governing final write-back. See spec §9 Open Questions:
/// bookmark preservation and the footnote/endnote "double elevation" fix
/// are both opt-in, off by default (see DESIGN.md for the rationale).
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Skip `cleanupInternalBookmarks` before serializing.
    pub preserve_internal_bookmarks: bool,
    /// Strip `w:position` from footnote/endnote reference run properties.
    pub neutralize_double_elevation: bool,
}

/// A loaded `.docx` package and every DOM this engine may mutate.
pub struct Document {
    pkg: OpcPackage,
    pub document: XmlDocument,
    pub body: NodeId,
    pub styles: Option<XmlDocument>,
    pub numbering: Option<XmlDocument>,
    pub footnotes: Option<XmlDocument>,
    pub comments: Option<XmlDocument>,
    pub comments_extended: Option<XmlDocument>,
    pub people: Option<XmlDocument>,
}

impl Document {
    /// Load a `.docx` package from raw bytes.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let pkg = OpcPackage::open_bytes(bytes)?;
        Self::from_package(pkg)
    }

    fn from_package(pkg: OpcPackage) -> Result<Self> {
        let doc_bytes = pkg
            .get_part(DOCUMENT_PART)
            .ok_or_else(|| Error::InvalidArgument("package has no word/document.xml".to_string()))?;
        let document = parse_document(doc_bytes)?;
        let body = document
            .find_descendant(document.root().expect("parsed document has a root"), NS_W, "body")
            .unwrap_or_else(|| document.root().expect("parsed document has a root"));

        let styles = pkg.get_part(STYLES_PART).map(parse_document).transpose()?;
        let numbering = pkg.get_part(NUMBERING_PART).map(parse_document).transpose()?;
        let footnotes = pkg.get_part(FOOTNOTES_PART).map(parse_document).transpose()?;
        let comments = pkg.get_part(COMMENTS_PART).map(parse_document).transpose()?;
        let comments_extended = pkg.get_part(COMMENTS_EXTENDED_PART).map(parse_document).transpose()?;
        let people = pkg.get_part(PEOPLE_PART).map(parse_document).transpose()?;

        Ok(Self {
            pkg,
            document,
            body,
            styles,
            numbering,
            footnotes,
            comments,
            comments_extended,
            people,
        })
    }

    /// All `w:p` elements in document order, including ones nested in tables.
    pub fn paragraphs(&self) -> Vec<NodeId> {
        bookmark::all_paragraphs(&self.document, self.body)
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs().len()
    }

    pub fn table_count(&self) -> usize {
        self.document
            .descendants(self.body)
            .filter(|&n| self.document.is_element(n, NS_W, "tbl"))
            .count()
    }

    /// Whole-document visible text: every body paragraph's text, joined by `\n`.
    pub fn text(&self) -> String {
        self.paragraphs()
            .iter()
            .map(|&p| paragraph_text(&self.document, p))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `insertParagraphBookmarks`: give every paragraph lacking a `_bk_*` id one.
    pub fn ensure_bookmarks(&mut self) -> Result<usize> {
        bookmark::insert_paragraph_bookmarks(&mut self.document, self.body)
    }

    pub fn find_paragraph(&self, id: &str) -> Option<NodeId> {
        bookmark::find_paragraph_by_bookmark_id(&self.document, self.body, id)
    }

    pub fn paragraph_id(&self, p: NodeId) -> Option<String> {
        bookmark::get_paragraph_bookmark_id(&self.document, p)
    }

    /// Normalize every paragraph (merge runs, then simplify redlines) ahead
    /// of bookmark allocation, per the ordering rule in spec §4.3/§5.
    pub fn normalize(&mut self) {
        for p in self.paragraphs() {
            super::merge::normalize_paragraph(&mut self.document, p);
        }
    }

    /// `acceptAllChanges`: keep insertions and moved-in text, discard
    /// deletions and moved-away text, across the whole body.
    pub fn accept_all(&mut self) -> super::accept_reject::TransformCounts {
        super::accept_reject::accept(&mut self.document, self.body)
    }

    /// `rejectAllChanges`: keep deletions and moved-away text, discard
    /// insertions and moved-in text, across the whole body.
    pub fn reject_all(&mut self) -> super::accept_reject::TransformCounts {
        super::accept_reject::reject(&mut self.document, self.body)
    }

    /// `replaceParagraphTextRange`: replace `[start, end)` of `paragraph`'s
    /// visible text with `parts`.
    pub fn replace_text_range(
        &mut self,
        paragraph: NodeId,
        start: usize,
        end: usize,
        parts: &[super::replace::ReplacementPart],
    ) -> Result<()> {
        super::replace::replace_paragraph_text_range(&mut self.document, paragraph, start, end, parts)
    }

    /// `addRootComment`: anchor a new top-level comment to `[start, end)` of
    /// `paragraph`'s visible text, bootstrapping the comment parts on first use.
    #[allow(clippy::too_many_arguments)]
    pub fn add_root_comment(
        &mut self,
        paragraph: NodeId,
        start: usize,
        end: usize,
        author: &str,
        text: &str,
        initials: Option<&str>,
        clock: &dyn Clock,
    ) -> Result<u32> {
        let (comments, _ext, people) = self.ensure_comment_parts();
        super::comments::add_root_comment(&mut self.document, comments, people, paragraph, start, end, author, text, initials, clock)
    }

    /// `addReply`: append a reply to the comment with id `parent_id`.
    pub fn add_comment_reply(&mut self, parent_id: u32, author: &str, text: &str, initials: Option<&str>, clock: &dyn Clock) -> Result<u32> {
        let (comments, ext, people) = self.ensure_comment_parts();
        super::comments::add_reply(comments, ext, people, parent_id, author, text, initials, clock)
    }

    /// `readComments`: the comment thread tree for the whole document.
    pub fn comments(&self) -> Vec<super::comments::Comment> {
        let Some(comments) = &self.comments else { return Vec::new() };
        super::comments::read_comments(&self.document, self.body, comments, self.comments_extended.as_ref())
    }

    /// `deleteComment`: remove `id` and every reply reachable from it.
    pub fn delete_comment(&mut self, id: u32) -> usize {
        let (comments, ext, _people) = self.ensure_comment_parts();
        super::comments::delete_comment(&mut self.document, self.body, comments, ext, id)
    }

    /// `addFootnote`: insert a reference into `paragraph` and append its
    /// body, bootstrapping `footnotes.xml` on first use.
    pub fn add_footnote(&mut self, paragraph: NodeId, text: &str, after_text: Option<&str>) -> Result<i64> {
        let footnotes = self.ensure_footnotes_part();
        super::footnotes::add(&mut self.document, footnotes, paragraph, text, after_text)
    }

    /// `updateFootnoteText`: replace the body text of footnote `id`.
    pub fn update_footnote_text(&mut self, id: i64, text: &str) -> Result<()> {
        let footnotes = self.ensure_footnotes_part();
        super::footnotes::update_text(footnotes, id, text)
    }

    /// `deleteFootnote`: remove footnote `id`'s body and every reference to it.
    pub fn delete_footnote(&mut self, id: i64) -> Result<()> {
        let footnotes = self.ensure_footnotes_part();
        super::footnotes::delete(&mut self.document, self.body, footnotes, id)
    }

    /// `readFootnotes`: every footnote, joined with display numbering.
    pub fn footnotes_list(&self) -> Vec<super::footnotes::Footnote> {
        let Some(footnotes) = &self.footnotes else { return Vec::new() };
        super::footnotes::read_footnotes(&self.document, self.body, footnotes)
    }

    /// `validate`: non-destructive structural warnings over the whole body.
    pub fn validate(&self) -> Vec<super::validator::ValidationWarning> {
        super::validator::validate(&self.document, self.body)
    }

    /// `buildDocumentView`: the read-only paragraph-by-paragraph projection
    /// (§4.10) — numbering resolved, styles resolved, headers split out,
    /// paragraphs grouped into named style buckets.
    pub fn document_view(&self, options: DocumentViewOptions) -> Vec<DocumentViewNode> {
        let styles = self.styles.as_ref().map(StyleSheet::parse).unwrap_or_default();
        let numbering = self.numbering.as_ref().map(Numbering::parse).unwrap_or_default();
        let rels = self.pkg.relationships_for(DOCUMENT_PART);
        view::build_document_view(&self.document, &self.paragraphs(), &styles, &numbering, rels, options)
    }

    /// `setParagraphSpacing`: resolve each bookmark id to its paragraph and
    /// apply `spec`, reporting any id that did not resolve. Row-height and
    /// cell-padding mutations are reached directly through
    /// [`super::layout`] instead, since tables carry no equivalent stable id.
    pub fn set_paragraph_spacing(&mut self, paragraph_ids: &[&str], spec: &super::layout::SpacingSpec) -> super::layout::LayoutResult {
        let targets: Vec<(String, Option<NodeId>)> = paragraph_ids.iter().map(|&id| (id.to_string(), self.find_paragraph(id))).collect();
        super::layout::set_paragraph_spacing(&mut self.document, &targets, spec)
    }

    /// `extractRevisions`: a paginated `{changes, total_changes, has_more}`
    /// view built from independent accept/reject clones of the current DOM.
    pub fn extract_revisions(&self, offset: usize, limit: usize) -> super::revisions::ExtractResult {
        let mut accepted = self.document.clone();
        super::accept_reject::accept(&mut accepted, self.body);

        let mut rejected = self.document.clone();
        super::accept_reject::reject(&mut rejected, self.body);

        let comments = self.comments();
        super::revisions::extract(&self.document, self.body, &accepted, self.body, &rejected, self.body, &comments, offset, limit)
    }

    /// Lazily create the comment parts (`comments.xml`, `commentsExtended.xml`,
    /// `people.xml`), returning mutable access to all three.
    pub(crate) fn ensure_comment_parts(&mut self) -> (&mut XmlDocument, &mut XmlDocument, &mut XmlDocument) {
        if self.comments.is_none() {
            self.comments = Some(parse_document(templates::default_comments_xml().as_bytes()).expect("valid template"));
        }
        if self.comments_extended.is_none() {
            self.comments_extended =
                Some(parse_document(templates::default_comments_extended_xml().as_bytes()).expect("valid template"));
        }
        if self.people.is_none() {
            self.people = Some(parse_document(templates::default_people_xml().as_bytes()).expect("valid template"));
        }
        (
            self.comments.as_mut().unwrap(),
            self.comments_extended.as_mut().unwrap(),
            self.people.as_mut().unwrap(),
        )
    }

    pub(crate) fn ensure_footnotes_part(&mut self) -> &mut XmlDocument {
        if self.footnotes.is_none() {
            self.footnotes = Some(parse_document(templates::default_footnotes_xml().as_bytes()).expect("valid template"));
        }
        self.footnotes.as_mut().unwrap()
    }

    /// Serialize every mutated DOM back into the package and produce final
    /// bytes. Runs bookmark cleanup (unless `preserve_internal_bookmarks`)
    /// and the double-elevation fix (if opted in) immediately before writing.
    pub fn save(&mut self, clock: &dyn Clock, opts: SaveOptions) -> Result<Vec<u8>> {
        let _ = clock.now_iso8601();
        if !opts.preserve_internal_bookmarks {
            bookmark::cleanup_internal_bookmarks(&mut self.document, self.body);
        }
        if opts.neutralize_double_elevation {
            neutralize_double_elevation(&mut self.document, self.body);
            if let Some(footnotes) = &mut self.footnotes {
                let root = footnotes.root().expect("footnotes has a root");
                neutralize_double_elevation(footnotes, root);
            }
        }

        self.pkg.set_part(DOCUMENT_PART, content_type::MAIN_DOCUMENT, write_document(&self.document).into_bytes());
        if let Some(styles) = &self.styles {
            self.pkg.set_part(STYLES_PART, content_type::STYLES, write_document(styles).into_bytes());
        }
        if let Some(numbering) = &self.numbering {
            self.pkg.set_part(NUMBERING_PART, content_type::NUMBERING, write_document(numbering).into_bytes());
        }
        self.flush_comment_parts();
        self.flush_footnotes_part();

        self.pkg.save_to_bytes().map_err(Error::from)
    }

    fn flush_comment_parts(&mut self) {
        let Some(comments) = &self.comments else { return };
        self.pkg.set_part(COMMENTS_PART, content_type::COMMENTS, write_document(comments).into_bytes());
        if let Some(ext) = &self.comments_extended {
            self.pkg
                .set_part(COMMENTS_EXTENDED_PART, content_type::COMMENTS_EXTENDED, write_document(ext).into_bytes());
        }
        if let Some(people) = &self.people {
            self.pkg.set_part(PEOPLE_PART, content_type::PEOPLE, write_document(people).into_bytes());
        }
        bootstrap_comment_relationships(&mut self.pkg);
    }

    fn flush_footnotes_part(&mut self) {
        let Some(footnotes) = &self.footnotes else { return };
        self.pkg.set_part(FOOTNOTES_PART, content_type::FOOTNOTES, write_document(footnotes).into_bytes());
        bootstrap_footnotes_relationship(&mut self.pkg);
    }
}

/// Default-clock convenience wrapper over [`Document::save`].
pub fn save_with_system_clock(doc: &mut Document, opts: SaveOptions) -> Result<Vec<u8>> {
    doc.save(&SystemClock, opts)
}

/// `bootstrapCommentParts`: register the three comment-thread parts'
/// content types and relationships. Idempotent — `get_or_add` no-ops if a
/// matching relationship already exists.
fn bootstrap_comment_relationships(pkg: &mut OpcPackage) {
    let rels = pkg.relationships_for_mut(DOCUMENT_PART);
    rels.get_or_add(relationship_type::COMMENTS, "comments.xml");
    rels.get_or_add(relationship_type::COMMENTS_EXTENDED, "commentsExtended.xml");
    rels.get_or_add(relationship_type::PEOPLE, "people.xml");
}

fn bootstrap_footnotes_relationship(pkg: &mut OpcPackage) {
    let rels = pkg.relationships_for_mut(DOCUMENT_PART);
    rels.get_or_add(relationship_type::FOOTNOTES, "footnotes.xml");
}

/// The "double elevation" fix: some producers emit both a style-level and a
/// direct `w:position` on footnote/endnote reference runs, elevating the
/// reference superscript twice. Strip any direct `w:position` wherever the
/// run also carries `w:footnoteReference`/`w:endnoteReference` or the
/// `FootnoteReference`/`EndnoteReference` character style.
fn neutralize_double_elevation(doc: &mut XmlDocument, root: NodeId) {
    let targets: Vec<NodeId> = doc
        .descendants(root)
        .filter(|&n| doc.is_element(n, NS_W, "r"))
        .filter(|&r| is_note_reference_run(doc, r))
        .collect();
    for r in targets {
        if let Some(rpr) = doc.children(r).find(|&c| doc.is_element(c, NS_W, "rPr")) {
            let positions: Vec<NodeId> = doc.children(rpr).filter(|&c| doc.is_element(c, NS_W, "position")).collect();
            for pos in positions {
                doc.remove_subtree(pos);
            }
        }
    }
}

fn is_note_reference_run(doc: &XmlDocument, run: NodeId) -> bool {
    let rpr = doc.children(run).find(|&c| doc.is_element(c, NS_W, "rPr"));
    let style_hit = rpr.is_some_and(|rpr| {
        doc.children(rpr).any(|c| {
            doc.is_element(c, NS_W, "rStyle")
                && doc
                    .attr(c, &w("val"))
                    .is_some_and(|v| v == "FootnoteReference" || v == "EndnoteReference")
        })
    });
    style_hit
        || doc
            .children(run)
            .any(|c| doc.is_element(c, NS_W, "footnoteReference") || doc.is_element(c, NS_W, "endnoteReference"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};

    fn minimal_docx_bytes() -> Vec<u8> {
        use soapberry_zip::office::StreamingArchiveWriter;
        let mut w = StreamingArchiveWriter::new();
        w.write_deflated(
            "[Content_Types].xml",
            br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
        )
        .unwrap();
        w.write_deflated(
            "word/document.xml",
            br#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:body></w:document>"#,
        )
        .unwrap();
        w.finish_to_bytes().unwrap()
    }

    #[test]
    fn loads_and_round_trips_a_minimal_package() {
        let bytes = minimal_docx_bytes();
        let mut doc = Document::load(&bytes).unwrap();
        assert_eq!(doc.paragraph_count(), 1);
        assert_eq!(doc.text(), "Hello");

        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let saved = doc.save(&clock, SaveOptions::default()).unwrap();
        let reloaded = Document::load(&saved).unwrap();
        assert_eq!(reloaded.text(), "Hello");
    }

    #[test]
    fn ensure_bookmarks_is_idempotent_and_cleanup_removes_them() {
        let bytes = minimal_docx_bytes();
        let mut doc = Document::load(&bytes).unwrap();
        let inserted = doc.ensure_bookmarks().unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(doc.ensure_bookmarks().unwrap(), 0);

        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let saved = doc.save(&clock, SaveOptions::default()).unwrap();
        let reloaded = Document::load(&saved).unwrap();
        assert!(reloaded.find_paragraph("nonexistent").is_none());
    }

    #[test]
    fn document_view_projects_one_node_per_paragraph() {
        let bytes = minimal_docx_bytes();
        let doc = Document::load(&bytes).unwrap();
        let nodes = doc.document_view(DocumentViewOptions::default());
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].clean_text, "Hello");
        assert!(nodes[0].tagged_text.is_none());
    }
}
