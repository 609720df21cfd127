//! Core data structures for glbopt
//!
//! This crate provides the fundamental types shared by the container codec
//! and the optimization pipeline: the glTF JSON document model, tagged
//! attribute arrays, options, errors, and the report type.

pub mod attribute;
pub mod capability;
pub mod document;
pub mod error;
pub mod options;
pub mod primitive;
pub mod report;

pub use attribute::*;
pub use capability::*;
pub use document::*;
pub use error::*;
pub use options::*;
pub use primitive::*;
pub use report::*;

/// Common result type for glbopt operations
pub type Result<T> = std::result::Result<T, Error>;
