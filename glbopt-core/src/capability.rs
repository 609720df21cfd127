//! Capability contracts for injectable collaborators.
//!
//! The pipeline and writer consume these traits; default implementations
//! live in the `glbopt-pipeline` and `glbopt-analysis` crates. Absence of a
//! capability is never fatal: simplification degrades to the identity
//! transform, compression to an uncompressed view, and image decode failure
//! leaves the image bytes untouched.

use crate::error::Result;

/// Parameters for one edge-collapse simplification call.
#[derive(Debug, Clone, Copy)]
pub struct SimplifyParams<'a> {
    /// Triangle-list indices into the vertex arrays.
    pub indices: &'a [u32],
    /// Vertex positions, three components per vertex.
    pub positions: &'a [f32],
    /// Optional texture coordinates, two components per vertex. When
    /// present, UV distortion enters the error metric.
    pub uvs: Option<&'a [f32]>,
    /// Weight per UV channel in the combined metric.
    pub uv_weight: f32,
    /// Vertices the simplifier must never remove.
    pub vertex_lock: Option<&'a [bool]>,
    /// Desired index count; implementations clamp down to a multiple of
    /// three and at least three.
    pub target_index_count: usize,
    /// Collapses whose parameter-space error exceeds this are abandoned.
    pub error_threshold: f32,
    /// Treat open-boundary vertices as locked.
    pub lock_border: bool,
}

/// Mesh-processing capability: deduplication, reordering, simplification.
pub trait Simplifier {
    /// Vertex deduplication over the full per-vertex byte record.
    /// Returns `remap` with `remap[old] = new` and the unique vertex count.
    fn compact(
        &self,
        indices: &[u32],
        vertex_bytes: &[u8],
        vertex_stride: usize,
    ) -> (Vec<u32>, usize);

    /// Cache-aware triangle reordering followed by first-use vertex
    /// renumbering. Rewrites `indices` in place; returns the vertex remap
    /// and the (unchanged) vertex count.
    fn reorder(&self, indices: &mut [u32], vertex_count: usize) -> (Vec<u32>, usize);

    /// Error-bounded edge collapse. Returns the reduced index list and the
    /// achieved error.
    fn simplify(&self, params: &SimplifyParams<'_>) -> Result<(Vec<u32>, f32)>;
}

/// Buffer bitstream encoder for `EXT_meshopt_compression`.
///
/// Implementations must accept strides divisible by 4 and at most 256
/// bytes. A returned error makes the caller fall back to an uncompressed
/// view.
pub trait BufferCodec {
    /// Encode a triangle index stream. `count` is the index count.
    fn encode_index_buffer(&self, indices: &[u32], count: usize, stride: usize)
        -> Result<Vec<u8>>;

    /// Encode interleaved vertex records of `stride` bytes each.
    fn encode_vertex_buffer(&self, bytes: &[u8], count: usize, stride: usize)
        -> Result<Vec<u8>>;
}

/// A decoded RGBA8 raster.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA, four bytes per pixel.
    pub rgba: Vec<u8>,
}

/// A re-encoded, resized image.
#[derive(Debug, Clone)]
pub struct ResizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Raster decode/resample capability.
pub trait ImageCodec {
    fn decode(&self, bytes: &[u8], mime: &str) -> Result<DecodedImage>;

    /// Down-scale by `scale` in `(0, 1)` and re-encode to the same mime
    /// type (PNG or JPEG at quality >= 0.9).
    fn resize(&self, bytes: &[u8], mime: &str, scale: f32) -> Result<ResizedImage>;

    fn dimensions(&self, bytes: &[u8], mime: &str) -> Result<(u32, u32)>;
}
