//! Container codec for glTF-Binary assets
//!
//! This crate parses GLB byte streams into an `Asset` (JSON document plus
//! binary blob), exposes bounds-checked typed accessor reads, and re-emits
//! optimized geometry as a fresh single-buffer GLB with quantization and
//! meshopt-compression extensions declared.

pub mod asset;
pub mod glb;
pub mod writer;

pub use asset::{Asset, AssetStats};
pub use glb::{assemble, split, GlbChunks};
pub use writer::GlbWriter;
