//! OPC package-seam errors.
//!
//! Ported from the teacher's `ooxml::opc::error::OpcError`, trimmed to the
//! variants this package seam actually raises.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpcError>;

#[derive(Debug, Error)]
pub enum OpcError {
    #[error("package not found: {0}")]
    PackageNotFound(String),

    #[error("part not found: {0}")]
    PartNotFound(String),

    #[error("invalid pack uri: {0}")]
    InvalidPackUri(String),

    #[error("invalid relationship: {0}")]
    InvalidRelationship(String),

    #[error("relationship not found: {0}")]
    RelationshipNotFound(String),

    #[error("required part missing: {0}")]
    RequiredPartMissing(String),

    #[error(transparent)]
    Zip(#[from] soapberry_zip::Error),

    #[error(transparent)]
    Xml(#[from] crate::xml::XmlReadError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
