//! Error types for glbopt

use thiserror::Error;

/// Main error type for glbopt operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("bad magic: expected 0x46546C67, found {0:#010X}")]
    BadMagic(u32),

    #[error("unsupported glTF version: {0}")]
    UnsupportedVersion(u32),

    #[error("truncated chunk at byte offset {offset}")]
    TruncatedChunk { offset: usize },

    #[error("missing JSON chunk")]
    MissingJsonChunk,

    #[error("accessor {index} out of range: {reason}")]
    AccessorOutOfRange { index: usize, reason: String },

    #[error("primitive {primitive} of mesh {mesh} has no POSITION attribute")]
    MissingPositionAttribute { mesh: usize, primitive: usize },

    #[error("unsupported component type: {0}")]
    UnsupportedComponentType(u32),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for glbopt operations
pub type Result<T> = std::result::Result<T, Error>;
