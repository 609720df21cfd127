//! Mesh optimization pipeline for glbopt
//!
//! Per-primitive transformation chain over indexed vertex buffers:
//! deduplication, vertex-cache reordering, importance-aware quadric
//! simplification, attribute quantization and index narrowing, plus the
//! LOD generator and the `optimize` entry points that tie the stages to
//! the container codec.

pub mod backend;
pub mod cache;
pub mod lod;
pub mod meshopt_codec;
pub mod optimize;
pub mod pipeline;
pub mod qem;
pub mod quantize;
pub mod weld;

pub use backend::MeshBackend;
pub use lod::{generate_chain, LockMap};
pub use meshopt_codec::MeshoptCodec;
pub use optimize::{optimize, optimize_to_glb, optimize_with, OptimizeContext, OptimizeOutput};
pub use pipeline::{finish_primitive, prepare_primitive};
