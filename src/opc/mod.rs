//! The Open Packaging Conventions seam: named-part read/write over the ZIP
//! container, and the relationship graphs between parts.
//!
//! Grounded throughout on the teacher's `ooxml::opc` module, trimmed to the
//! parts this engine's package layout actually uses (no `PartFactory`
//! dispatch across a dozen Office formats — WordprocessingML parts are all
//! handled uniformly as raw XML bytes owned by [`crate::docx::Document`]).

pub mod constants;
pub mod error;
pub mod package;
pub mod part;
pub mod packuri;
pub mod rel;

pub use error::{OpcError, Result};
pub use package::OpcPackage;
pub use part::ContentTypeMap;
pub use packuri::PackURI;
pub use rel::{Relationship, Relationships};
