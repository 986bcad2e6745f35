//! Crate-wide error taxonomy.
//!
//! Mirrors the teacher's `common::error::types` layering: a flat `thiserror`
//! enum at the top, with submodule error types (here, [`crate::opc::OpcError`]
//! and [`crate::xml::XmlReadError`]) converting in via `From`. The variant
//! set itself follows the taxonomy called out for this engine rather than
//! the teacher's file-format-agnostic one: structural DOM errors
//! (`InvalidArgument`, `UnsupportedEdit`, `UnsafeContainerBoundary`) abort an
//! operation with the document left unchanged, while `Session`/`File`/`Save`
//! variants are pass-through transport errors this crate never originates.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Range out of bounds, unknown id, malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Legal input that would violate an editing invariant.
    #[error("unsupported edit: {0}")]
    UnsupportedEdit(String),

    /// The edit's run endpoints cross a container (hyperlink, SDT); refused
    /// rather than silently restructured.
    #[error("unsafe container boundary: {0}")]
    UnsafeContainerBoundary(String),

    /// `_bk_*` allocation could not find a free name after 10,000 salted retries.
    #[error("id allocation exhausted for seed {0:?}")]
    IdAllocationExhausted(String),

    #[error(transparent)]
    Xml(#[from] crate::xml::XmlReadError),

    #[error(transparent)]
    Opc(#[from] crate::opc::OpcError),

    /// Surface-level transport error propagated from collaborators (session
    /// store, file system, package save) — never generated by this crate's
    /// own DOM transforms.
    #[error("session error: {0}")]
    Session(String),

    #[error("file error: {0}")]
    File(String),

    #[error("save error: {0}")]
    Save(String),
}
