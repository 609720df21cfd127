//! LOD chain generation.
//!
//! Runs the simplify/quantize/narrow stages once per configured ratio,
//! always starting from the shared post-dedupe-reorder state. Importance
//! locks are computed once per primitive and reused by every ratio.

use std::collections::BTreeMap;

use glbopt_core::{
    CancelToken, LodChain, LodLevel, OptimizeOptions, OptimizeReport, PrimitiveData, Result,
    Simplifier,
};

use crate::pipeline::finish_primitive;

/// Per-primitive vertex lock masks, keyed by (mesh index, primitive
/// index).
pub type LockMap = BTreeMap<(usize, usize), Vec<bool>>;

/// Build the LOD chain for a set of prepared primitives.
pub fn generate_chain(
    prepared: &[PrimitiveData],
    locks: &LockMap,
    simplifier: &dyn Simplifier,
    options: &OptimizeOptions,
    cancel: &CancelToken,
    report: &mut OptimizeReport,
) -> Result<LodChain> {
    let mut chain = LodChain::default();
    for &ratio in &options.lod_levels {
        cancel.check()?;
        let mut primitives = Vec::with_capacity(prepared.len());
        let mut triangle_count = 0usize;
        for prim in prepared {
            cancel.check()?;
            let lock = locks
                .get(&(prim.mesh_index, prim.primitive_index))
                .map(|v| v.as_slice());
            let optimized = finish_primitive(prim, ratio, lock, simplifier, options, report);
            triangle_count += optimized.triangle_count();
            primitives.push(optimized);
        }
        log::debug!("lod ratio {ratio}: {triangle_count} triangles");
        chain.levels.push(LodLevel {
            ratio,
            primitives,
            triangle_count,
        });
    }
    Ok(chain)
}
