//! Top-level optimization entry points.
//!
//! `optimize` runs the full flow: decode primitives, analyze importance
//! (when enabled), dedupe/reorder once, then produce the LOD chain. The
//! capability and cache state for one call lives in an `OptimizeContext`;
//! nothing is global.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use glbopt_analysis::{
    build_image_map, detect_seams, merge_importance, texture_importance, vertex_locks,
    view_importance, ImageImportanceMap, RasterImageCodec, TextureRole, ViewPrimitive,
    VIEW_RESOLUTION,
};
use glbopt_codec::{Asset, GlbWriter};
use glbopt_core::{
    CancelToken, DecodedImage, Error, ImageCodec, LodChain, OptimizeOptions, OptimizeReport,
    PrimitiveData, ReportEntry, Result, Simplifier, document::MODE_TRIANGLES,
};

use crate::backend::MeshBackend;
use crate::lod::{generate_chain, LockMap};
use crate::meshopt_codec::MeshoptCodec;
use crate::pipeline::prepare_primitive;

/// Capabilities and cancellation for one `optimize` call.
pub struct OptimizeContext<'a> {
    pub simplifier: &'a dyn Simplifier,
    pub image_codec: Option<&'a dyn ImageCodec>,
    pub cancel: CancelToken,
}

impl<'a> OptimizeContext<'a> {
    pub fn new(simplifier: &'a dyn Simplifier) -> Self {
        Self {
            simplifier,
            image_codec: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_image_codec(mut self, codec: &'a dyn ImageCodec) -> Self {
        self.image_codec = Some(codec);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Result of an optimization pass: the LOD chain plus advisories.
#[derive(Debug, Clone)]
pub struct OptimizeOutput {
    pub chain: LodChain,
    pub report: OptimizeReport,
}

/// Optimize with the default backend and image codec.
pub fn optimize(asset: &Asset, options: &OptimizeOptions) -> Result<OptimizeOutput> {
    let backend = MeshBackend::new();
    let images = RasterImageCodec::new();
    let ctx = OptimizeContext::new(&backend).with_image_codec(&images);
    optimize_with(asset, options, &ctx)
}

/// Optimize with caller-provided capabilities.
pub fn optimize_with(
    asset: &Asset,
    options: &OptimizeOptions,
    ctx: &OptimizeContext<'_>,
) -> Result<OptimizeOutput> {
    options.validate()?;
    ctx.cancel.check()?;

    let mut report = OptimizeReport::default();
    let mut prims = asset.primitives()?;
    report.input_triangles = prims.iter().map(|p| p.triangle_count()).sum();
    report.input_vertices = prims.iter().map(|p| p.vertex_count()).sum();

    for prim in &prims {
        if prim.mode != MODE_TRIANGLES {
            report.push(ReportEntry::NonTrianglePrimitive {
                mesh: prim.mesh_index,
                primitive: prim.primitive_index,
                mode: prim.mode,
            });
        }
    }

    // Stages 2-3 once; every LOD ratio restarts from this state.
    for prim in &mut prims {
        ctx.cancel.check()?;
        prepare_primitive(prim, ctx.simplifier, options);
    }

    let locks = if options.texture_aware {
        compute_locks(asset, &prims, ctx, options, &mut report)?
    } else {
        LockMap::new()
    };

    let chain = generate_chain(
        &prims,
        &locks,
        ctx.simplifier,
        options,
        &ctx.cancel,
        &mut report,
    )?;

    if let Some(level) = chain.levels.first() {
        report.output_triangles = level.triangle_count;
        report.output_vertices = level.primitives.iter().map(|p| p.vertex_count()).sum();
        for prim in &level.primitives {
            if let Some(remap) = prim.uv_remap {
                report.push(ReportEntry::UvRemapped {
                    mesh: prim.mesh_index,
                    primitive: prim.primitive_index,
                    remap,
                });
            }
        }
    }

    log::info!("optimize: {}", report.summary().lines().next().unwrap_or(""));
    Ok(OptimizeOutput { chain, report })
}

/// Parse, optimize and re-emit in one call. The written level is the first
/// configured ratio.
pub fn optimize_to_glb(
    data: &[u8],
    options: &OptimizeOptions,
) -> Result<(Vec<u8>, OptimizeReport)> {
    let asset = Asset::from_glb(data)?;
    let output = optimize(&asset, options)?;
    let mut report = output.report;

    let level = output
        .chain
        .levels
        .first()
        .ok_or_else(|| Error::InvalidData("empty LOD chain".to_string()))?;

    let codec = MeshoptCodec::new();
    let images = RasterImageCodec::new();
    let mut writer = GlbWriter::new()
        .with_image_codec(&images)
        .with_texture_scale(options.texture_scale);
    if options.meshopt_compression {
        writer = writer.with_buffer_codec(&codec);
    }

    let glb = writer.write(&asset, level, &mut report)?;
    Ok((glb, report))
}

/// Texture roles bound to a material, resolved to image indices.
fn material_image_roles(asset: &Asset, material: usize) -> Vec<(TextureRole, usize)> {
    let mut out = Vec::new();
    let doc = &asset.document;
    let mat = match doc.materials.get(material) {
        Some(m) => m,
        None => return out,
    };

    let image_of = |texture: usize| -> Option<usize> {
        doc.textures.get(texture).and_then(|t| t.source)
    };

    if let Some(pbr) = &mat.pbr_metallic_roughness {
        if let Some(info) = &pbr.base_color_texture {
            if let Some(img) = image_of(info.index) {
                out.push((TextureRole::BaseColor, img));
            }
        }
        if let Some(info) = &pbr.metallic_roughness_texture {
            if let Some(img) = image_of(info.index) {
                out.push((TextureRole::MetallicRoughness, img));
            }
        }
    }
    if let Some(info) = &mat.normal_texture {
        if let Some(img) = image_of(info.index) {
            out.push((TextureRole::Normal, img));
        }
    }
    if let Some(info) = &mat.occlusion_texture {
        if let Some(img) = image_of(info.index) {
            out.push((TextureRole::Occlusion, img));
        }
    }
    if let Some(info) = &mat.emissive_texture {
        if let Some(img) = image_of(info.index) {
            out.push((TextureRole::Emissive, img));
        }
    }
    out
}

/// Run both analyzers and derive the per-primitive vertex lock masks.
fn compute_locks(
    asset: &Asset,
    prims: &[PrimitiveData],
    ctx: &OptimizeContext<'_>,
    options: &OptimizeOptions,
    report: &mut OptimizeReport,
) -> Result<LockMap> {
    ctx.cancel.check()?;

    // Decode every bound image once; the cache lives for this call only.
    let mut used_images: BTreeSet<usize> = BTreeSet::new();
    for prim in prims {
        if let Some(material) = prim.material {
            for (_, img) in material_image_roles(asset, material) {
                used_images.insert(img);
            }
        }
    }

    let mut decoded: HashMap<usize, DecodedImage> = HashMap::new();
    if let Some(codec) = ctx.image_codec {
        for &img in &used_images {
            ctx.cancel.check()?;
            let bytes = match asset.image_bytes(img)? {
                Some(bytes) => bytes,
                None => continue,
            };
            let mime = asset
                .image_mime(img)
                .unwrap_or_else(|| "application/octet-stream".to_string());
            match codec.decode(&bytes, &mime) {
                Ok(image) => {
                    decoded.insert(img, image);
                }
                Err(e) => {
                    report.push(ReportEntry::ImageDecodeFailed {
                        image: img,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    let maps: HashMap<usize, ImageImportanceMap> = decoded
        .iter()
        .map(|(&img, image)| (img, build_image_map(image)))
        .collect();

    // Texture-space scores.
    let mut texture_scores: BTreeMap<(usize, usize), Option<Vec<f32>>> = BTreeMap::new();
    for prim in prims {
        let key = (prim.mesh_index, prim.primitive_index);
        let score = match (prim.uvs(), prim.material) {
            (Some(uvs), Some(material)) => {
                let bound: Vec<(TextureRole, &ImageImportanceMap)> =
                    material_image_roles(asset, material)
                        .into_iter()
                        .filter_map(|(role, img)| maps.get(&img).map(|m| (role, m)))
                        .collect();
                texture_importance(uvs, prim.vertex_count(), &bound)
            }
            _ => None,
        };
        texture_scores.insert(key, score);
    }

    // View-space scores over the whole scene in one pass. Non-triangle
    // primitives contribute no triangles but keep their slot.
    static EMPTY: [u32; 0] = [];
    let view_prims: Vec<ViewPrimitive<'_>> = prims
        .iter()
        .map(|prim| {
            let base_color = prim
                .material
                .and_then(|m| {
                    material_image_roles(asset, m)
                        .into_iter()
                        .find(|(role, _)| *role == TextureRole::BaseColor)
                })
                .and_then(|(_, img)| decoded.get(&img));
            ViewPrimitive {
                positions: prim.positions().unwrap_or(&[]),
                uvs: prim.uvs(),
                indices: if prim.mode == MODE_TRIANGLES && prim.positions().is_some() {
                    &prim.indices
                } else {
                    &EMPTY
                },
                base_color,
            }
        })
        .collect();
    let view_scores = view_importance(&view_prims, VIEW_RESOLUTION, &ctx.cancel)?;

    // Merge, detect seams, build locks.
    let mut locks = LockMap::new();
    for (prim, view) in prims.iter().zip(view_scores.into_iter()) {
        let key = (prim.mesh_index, prim.primitive_index);
        let texture = texture_scores.remove(&key).flatten();
        let view = if view.iter().any(|&s| s > 0.0) {
            Some(view)
        } else {
            None
        };
        let merged = match merge_importance(texture, view) {
            Some(scores) => scores,
            None => continue,
        };

        let seams = match (prim.positions(), prim.uvs()) {
            (Some(positions), Some(uvs)) => detect_seams(positions, uvs, prim.vertex_count()),
            _ => vec![false; prim.vertex_count()],
        };
        locks.insert(
            key,
            vertex_locks(&merged, &seams, options.importance_threshold),
        );
    }
    Ok(locks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glbopt_core::document::{
        Accessor, AssetInfo, Buffer, BufferView, Document, Mesh, Node, Primitive, Scene,
    };
    use glbopt_core::primitive::POSITION;

    /// Build a small GLB asset: a 1000-triangle fan-free strip plane.
    fn make_plane_asset(size: usize) -> Asset {
        let mut positions = Vec::new();
        for y in 0..size {
            for x in 0..size {
                positions.extend_from_slice(&[x as f32, y as f32, 0.0f32]);
            }
        }
        let mut indices: Vec<u32> = Vec::new();
        for y in 0..size - 1 {
            for x in 0..size - 1 {
                let tl = (y * size + x) as u32;
                let tr = tl + 1;
                let bl = tl + size as u32;
                let br = bl + 1;
                indices.extend_from_slice(&[tl, bl, tr, tr, bl, br]);
            }
        }

        let mut bin: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
        let idx_offset = bin.len();
        bin.extend(indices.iter().flat_map(|i| i.to_le_bytes()));

        let mut prim = Primitive::default();
        prim.attributes.insert(POSITION.to_string(), 0);
        prim.indices = Some(1);

        Asset {
            document: Document {
                asset: AssetInfo::default(),
                scene: Some(0),
                scenes: vec![Scene {
                    name: None,
                    nodes: vec![0],
                }],
                nodes: vec![Node {
                    mesh: Some(0),
                    ..Default::default()
                }],
                meshes: vec![Mesh {
                    name: None,
                    primitives: vec![prim],
                    weights: None,
                }],
                accessors: vec![
                    Accessor {
                        buffer_view: Some(0),
                        byte_offset: 0,
                        component_type: 5126,
                        count: (size * size),
                        element_type: "VEC3".to_string(),
                        normalized: false,
                        min: None,
                        max: None,
                        name: None,
                    },
                    Accessor {
                        buffer_view: Some(1),
                        byte_offset: 0,
                        component_type: 5125,
                        count: indices.len(),
                        element_type: "SCALAR".to_string(),
                        normalized: false,
                        min: None,
                        max: None,
                        name: None,
                    },
                ],
                buffer_views: vec![
                    BufferView {
                        buffer: 0,
                        byte_offset: 0,
                        byte_length: idx_offset,
                        ..Default::default()
                    },
                    BufferView {
                        buffer: 0,
                        byte_offset: idx_offset,
                        byte_length: indices.len() * 4,
                        ..Default::default()
                    },
                ],
                buffers: vec![Buffer {
                    byte_length: bin.len(),
                    uri: None,
                    name: None,
                }],
                ..Default::default()
            },
            bin,
        }
    }

    #[test]
    fn test_optimize_produces_monotonic_chain() {
        let asset = make_plane_asset(10);
        let options = OptimizeOptions {
            lod_levels: vec![1.0, 0.5, 0.25],
            lod_error_threshold: 1.0,
            ..Default::default()
        };
        let output = optimize(&asset, &options).unwrap();
        let counts: Vec<usize> = output.chain.levels.iter().map(|l| l.triangle_count).collect();
        assert_eq!(counts.len(), 3);
        assert!(counts[0] >= counts[1] && counts[1] >= counts[2]);
        assert!(counts[1] <= counts[0] / 2 + 1);
        assert!(counts[2] <= counts[0] / 4 + 2);
        assert_eq!(output.report.input_triangles, counts[0]);
    }

    #[test]
    fn test_optimize_cancel() {
        let asset = make_plane_asset(4);
        let backend = MeshBackend::new();
        let token = CancelToken::new();
        token.cancel();
        let ctx = OptimizeContext::new(&backend).with_cancel(token);
        let result = optimize_with(&asset, &OptimizeOptions::default(), &ctx);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_optimize_rejects_bad_options() {
        let asset = make_plane_asset(3);
        let options = OptimizeOptions {
            lod_levels: vec![],
            ..Default::default()
        };
        assert!(optimize(&asset, &options).is_err());
    }

    #[test]
    fn test_optimize_to_glb_roundtrip() {
        let asset = make_plane_asset(6);
        let json = serde_json::to_vec(&asset.document).unwrap();
        let glb = glbopt_codec::assemble(&json, Some(&asset.bin));

        let options = OptimizeOptions {
            lod_levels: vec![1.0],
            meshopt_compression: false,
            ..Default::default()
        };
        let (out, report) = optimize_to_glb(&glb, &options).unwrap();
        assert!(report.output_triangles > 0);

        let reparsed = Asset::from_glb(&out).unwrap();
        assert_eq!(reparsed.document.meshes.len(), 1);
        let prims = reparsed.primitives().unwrap();
        assert_eq!(prims[0].triangle_count(), report.output_triangles);
    }

    #[test]
    fn test_determinism() {
        let asset = make_plane_asset(8);
        let json = serde_json::to_vec(&asset.document).unwrap();
        let glb = glbopt_codec::assemble(&json, Some(&asset.bin));

        let options = OptimizeOptions {
            lod_levels: vec![1.0, 0.5],
            lod_error_threshold: 0.5,
            ..Default::default()
        };
        let (a, _) = optimize_to_glb(&glb, &options).unwrap();
        let (b, _) = optimize_to_glb(&glb, &options).unwrap();
        assert_eq!(a, b, "output must be byte-for-byte deterministic");
    }
}
