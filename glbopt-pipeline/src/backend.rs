//! Default `Simplifier` capability.

use glbopt_core::{Result, Simplifier, SimplifyParams};

use crate::{cache, qem, weld};

/// Welding, cache reordering and quadric-error simplification bundled as
/// the default mesh-processing backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshBackend;

impl MeshBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Simplifier for MeshBackend {
    fn compact(
        &self,
        indices: &[u32],
        vertex_bytes: &[u8],
        vertex_stride: usize,
    ) -> (Vec<u32>, usize) {
        weld::compact(indices, vertex_bytes, vertex_stride)
    }

    fn reorder(&self, indices: &mut [u32], vertex_count: usize) -> (Vec<u32>, usize) {
        cache::reorder(indices, vertex_count)
    }

    fn simplify(&self, params: &SimplifyParams<'_>) -> Result<(Vec<u32>, f32)> {
        Ok(qem::simplify(params))
    }
}
