//! Per-primitive optimization pipeline.
//!
//! Stage order: dedupe, cache reorder, simplify (LOD levels only),
//! quantize, index width minimization. Every stage consumes the previous
//! stage's arrays and returns new values; a disabled stage is the
//! identity.

use glbopt_core::{
    AttributeData, ElementType, IndexData, OptimizeOptions, OptimizeReport, OptimizedPrimitive,
    PrimitiveData, ReportEntry, Simplifier, SimplifyParams, VertexAttribute,
    document::MODE_TRIANGLES,
    primitive::POSITION,
};

use crate::quantize;
use crate::weld;

/// Stages 2 and 3: vertex deduplication and cache reordering, applied once
/// per primitive and shared by every LOD ratio.
pub fn prepare_primitive(
    prim: &mut PrimitiveData,
    simplifier: &dyn Simplifier,
    options: &OptimizeOptions,
) {
    if options.deduplicate_vertices {
        dedupe(prim, simplifier);
    }
    if options.optimize_vertex_cache {
        reorder(prim, simplifier);
    }
}

fn dedupe(prim: &mut PrimitiveData, simplifier: &dyn Simplifier) {
    let vertex_count = prim.vertex_count();
    if vertex_count == 0 {
        return;
    }
    let parts: Vec<(Vec<u8>, usize)> = prim
        .attributes
        .iter()
        .map(|a| (a.data.to_le_bytes(), a.element_size()))
        .collect();
    let borrowed: Vec<(&[u8], usize)> =
        parts.iter().map(|(b, s)| (b.as_slice(), *s)).collect();
    let (bytes, stride) = weld::interleave(&borrowed, vertex_count);

    let (remap, unique) = simplifier.compact(&prim.indices, &bytes, stride);
    if unique == vertex_count {
        // Nothing to merge; keep the original indexing.
        return;
    }
    apply_vertex_remap(prim, &remap, unique);
    prim.indices = weld::apply_remap(&prim.indices, &remap);
    log::debug!(
        "mesh {} primitive {}: deduplicated {} -> {} vertices",
        prim.mesh_index,
        prim.primitive_index,
        vertex_count,
        unique
    );
}

fn reorder(prim: &mut PrimitiveData, simplifier: &dyn Simplifier) {
    let vertex_count = prim.vertex_count();
    if vertex_count == 0 || prim.indices.is_empty() {
        return;
    }
    let (remap, unique) = simplifier.reorder(&mut prim.indices, vertex_count);
    apply_vertex_remap(prim, &remap, unique);
}

fn apply_vertex_remap(prim: &mut PrimitiveData, remap: &[u32], new_count: usize) {
    for attr in &mut prim.attributes {
        *attr = attr.remap(remap, new_count);
    }
}

/// Stages 4 through 6 for one LOD ratio, starting from the prepared
/// (post-dedupe-reorder) state.
pub fn finish_primitive(
    prim: &PrimitiveData,
    ratio: f32,
    locks: Option<&[bool]>,
    simplifier: &dyn Simplifier,
    options: &OptimizeOptions,
    report: &mut OptimizeReport,
) -> OptimizedPrimitive {
    let mut working = prim.clone();

    if ratio < 1.0 && working.mode == MODE_TRIANGLES && working.triangle_count() > 0 {
        simplify_stage(&mut working, ratio, locks, simplifier, options, report);
    }

    quantize_stage(&mut working, options, report)
}

fn simplify_stage(
    prim: &mut PrimitiveData,
    ratio: f32,
    locks: Option<&[bool]>,
    simplifier: &dyn Simplifier,
    options: &OptimizeOptions,
    report: &mut OptimizeReport,
) {
    let target = ((prim.indices.len() as f32 * ratio).round() as usize).max(3);
    let positions = match prim.positions() {
        Some(p) => p,
        None => return,
    };

    let params = SimplifyParams {
        indices: &prim.indices,
        positions,
        uvs: prim.uvs(),
        uv_weight: 1.0,
        vertex_lock: locks,
        target_index_count: target,
        error_threshold: options.lod_error_threshold,
        lock_border: true,
    };

    let reduced = match simplifier.simplify(&params) {
        Ok((indices, error)) => {
            log::debug!(
                "mesh {} primitive {}: simplified {} -> {} indices (error {:.5})",
                prim.mesh_index,
                prim.primitive_index,
                prim.indices.len(),
                indices.len(),
                error
            );
            indices
        }
        Err(e) => {
            report.push(ReportEntry::SimplifierDegraded {
                mesh: prim.mesh_index,
                primitive: prim.primitive_index,
                reason: e.to_string(),
            });
            return;
        }
    };
    prim.indices = reduced;

    // Densify: the reduced list references the pre-simplify vertex space.
    dedupe_after_simplify(prim, simplifier);
}

fn dedupe_after_simplify(prim: &mut PrimitiveData, simplifier: &dyn Simplifier) {
    let vertex_count = prim.vertex_count();
    if vertex_count == 0 {
        return;
    }
    let parts: Vec<(Vec<u8>, usize)> = prim
        .attributes
        .iter()
        .map(|a| (a.data.to_le_bytes(), a.element_size()))
        .collect();
    let borrowed: Vec<(&[u8], usize)> =
        parts.iter().map(|(b, s)| (b.as_slice(), *s)).collect();
    let (bytes, stride) = weld::interleave(&borrowed, vertex_count);
    let (remap, unique) = simplifier.compact(&prim.indices, &bytes, stride);
    apply_vertex_remap(prim, &remap, unique);
    prim.indices = weld::apply_remap(&prim.indices, &remap);
}

/// Stage 5 and 6: quantize typed attributes and narrow the indices.
fn quantize_stage(
    prim: &mut PrimitiveData,
    options: &OptimizeOptions,
    _report: &mut OptimizeReport,
) -> OptimizedPrimitive {
    let mut position_dequant = None;
    let mut uv_remap = None;

    let attributes: Vec<VertexAttribute> = prim
        .attributes
        .iter()
        .map(|attr| {
            let float = match &attr.data {
                AttributeData::F32(v) => v,
                // Already-integer attributes pass through untouched.
                _ => return attr.clone(),
            };

            if attr.semantic == POSITION
                && attr.element_type == ElementType::Vec3
                && options.quantize_positions
            {
                let (data, dequant) = quantize::quantize_positions(float, options.position_bits);
                position_dequant = Some(dequant);
                let mut out = VertexAttribute::new(POSITION, ElementType::Vec3, data);
                out.normalized = false;
                return out;
            }

            if attr.semantic == "NORMAL"
                && attr.element_type == ElementType::Vec3
                && options.quantize_normals
            {
                let mut out = VertexAttribute::new(
                    "NORMAL",
                    ElementType::Vec3,
                    quantize::quantize_normals(float),
                );
                out.normalized = true;
                return out;
            }

            if attr.semantic.starts_with("TEXCOORD_")
                && attr.element_type == ElementType::Vec2
                && options.quantize_uvs
            {
                let (data, remap) = quantize::quantize_uvs(float);
                if attr.semantic == "TEXCOORD_0" {
                    uv_remap = remap;
                }
                let mut out =
                    VertexAttribute::new(attr.semantic.clone(), ElementType::Vec2, data);
                out.normalized = true;
                return out;
            }

            if attr.semantic == "TANGENT"
                && attr.element_type == ElementType::Vec4
                && options.quantize_tangents
            {
                let mut out = VertexAttribute::new(
                    "TANGENT",
                    ElementType::Vec4,
                    quantize::quantize_tangents(float),
                );
                out.normalized = true;
                return out;
            }

            attr.clone()
        })
        .collect();

    let vertex_count = attributes.first().map_or(0, |a| a.count());
    OptimizedPrimitive {
        mesh_index: prim.mesh_index,
        primitive_index: prim.primitive_index,
        attributes,
        indices: IndexData::from_u32(&prim.indices, vertex_count),
        material: prim.material,
        mode: prim.mode,
        position_dequant,
        uv_remap,
    }
}
