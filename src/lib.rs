//! A safe-editing engine for WordprocessingML (`.docx`) packages.
//!
//! Loads a package, projects its paragraphs as a stable content-addressed
//! view (`_bk_*` bookmarks), and applies controlled semantic edits — text
//! replacement, tracked-change accept/reject, comment/footnote CRUD, layout
//! tweaks — while keeping run formatting, field boundaries, and tracked
//! change history intact. The ZIP container, the HTTP/session layer around
//! this engine, and any adjacent state-machine are out of scope; this crate
//! owns the document DOM and nothing else.

pub mod clock;
pub mod docx;
pub mod error;
pub mod opc;
pub mod xml;

pub use clock::{Clock, FixedClock, SystemClock};
pub use docx::document::Document;
pub use error::{Error, Result};
