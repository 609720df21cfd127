//! GLB writer/emitter.
//!
//! Rebuilds the output document from scratch — the input is never patched in
//! place. Accessors and buffer views are allocated sequentially in primitive
//! order, then images, then the accessors animations and skins reference.
//! Position de-quantization affines are folded into the node transforms of
//! every node referencing the mesh.

use std::collections::BTreeMap;

use glbopt_core::{
    AttributeData, BufferCodec, ComponentType, DequantTransform, ElementType, Error, ImageCodec,
    LodLevel, OptimizeReport, OptimizedPrimitive, ReportEntry, Result, VertexAttribute,
    document::{
        Accessor, Buffer, BufferView, BufferViewExtensions, Document, Image, Mesh,
        MeshoptCompression, Node, Primitive, EXT_MESHOPT_COMPRESSION, KHR_MESH_QUANTIZATION,
        MODE_TRIANGLES, TARGET_ARRAY_BUFFER, TARGET_ELEMENT_ARRAY_BUFFER,
    },
    primitive::POSITION,
};
use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3};

use crate::asset::Asset;

/// Emission phases, advanced strictly in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EmitStage {
    Initial,
    Geometry,
    Images,
    AnimationsAndSkins,
    Finalized,
}

/// Writer configuration. Capabilities are optional; absence degrades to
/// uncompressed views and verbatim images.
pub struct GlbWriter<'a> {
    buffer_codec: Option<&'a dyn BufferCodec>,
    image_codec: Option<&'a dyn ImageCodec>,
    texture_scale: f32,
    generator: String,
}

impl<'a> Default for GlbWriter<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GlbWriter<'a> {
    pub fn new() -> Self {
        Self {
            buffer_codec: None,
            image_codec: None,
            texture_scale: 1.0,
            generator: format!("glbopt {}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_buffer_codec(mut self, codec: &'a dyn BufferCodec) -> Self {
        self.buffer_codec = Some(codec);
        self
    }

    pub fn with_image_codec(mut self, codec: &'a dyn ImageCodec) -> Self {
        self.image_codec = Some(codec);
        self
    }

    pub fn with_texture_scale(mut self, scale: f32) -> Self {
        self.texture_scale = scale;
        self
    }

    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }

    /// Emit one LOD level of `asset` as a GLB byte stream.
    pub fn write(
        &self,
        asset: &Asset,
        level: &LodLevel,
        report: &mut OptimizeReport,
    ) -> Result<Vec<u8>> {
        let mut emitter = Emitter {
            writer: self,
            asset,
            stage: EmitStage::Initial,
            bin: Vec::new(),
            views: Vec::new(),
            accessors: Vec::new(),
            any_compressed: false,
            any_quantized: false,
        };
        emitter.write_level(level, report)
    }
}

struct Emitter<'w, 'a> {
    writer: &'w GlbWriter<'a>,
    asset: &'w Asset,
    stage: EmitStage,
    bin: Vec<u8>,
    views: Vec<BufferView>,
    accessors: Vec<Accessor>,
    any_compressed: bool,
    any_quantized: bool,
}

impl Emitter<'_, '_> {
    fn advance(&mut self, next: EmitStage) {
        debug_assert!(self.stage <= next, "emit stages must advance in order");
        self.stage = next;
    }

    fn write_level(&mut self, level: &LodLevel, report: &mut OptimizeReport) -> Result<Vec<u8>> {
        let asset = self.asset;
        let source = &asset.document;

        // Geometry first: one primitive at a time, in processing order.
        self.advance(EmitStage::Geometry);
        let mut primitives_by_mesh: BTreeMap<usize, Vec<(usize, Primitive)>> = BTreeMap::new();
        for prim in &level.primitives {
            let emitted = self.emit_primitive(prim, report)?;
            primitives_by_mesh
                .entry(prim.mesh_index)
                .or_default()
                .push((prim.primitive_index, emitted));
        }

        let mut meshes = Vec::with_capacity(source.meshes.len());
        for (mesh_index, mesh) in source.meshes.iter().enumerate() {
            let mut emitted = primitives_by_mesh.remove(&mesh_index).unwrap_or_default();
            emitted.sort_by_key(|(i, _)| *i);
            if emitted.len() != mesh.primitives.len() {
                return Err(Error::InvalidData(format!(
                    "mesh {mesh_index}: expected {} optimized primitives, got {}",
                    mesh.primitives.len(),
                    emitted.len()
                )));
            }
            meshes.push(Mesh {
                name: mesh.name.clone(),
                primitives: emitted.into_iter().map(|(_, p)| p).collect(),
                weights: mesh.weights.clone(),
            });
        }

        self.advance(EmitStage::Images);
        let images = self.emit_images(report)?;

        self.advance(EmitStage::AnimationsAndSkins);
        let (animations, skins) = self.emit_animations_and_skins()?;

        self.advance(EmitStage::Finalized);
        let nodes = self.fixed_up_nodes(level, report);

        let mut extensions_used = source.extensions_used.clone();
        let mut extensions_required = source.extensions_required.clone();
        if self.any_quantized {
            push_unique(&mut extensions_used, KHR_MESH_QUANTIZATION);
            push_unique(&mut extensions_required, KHR_MESH_QUANTIZATION);
        }
        if self.any_compressed {
            push_unique(&mut extensions_used, EXT_MESHOPT_COMPRESSION);
            push_unique(&mut extensions_required, EXT_MESHOPT_COMPRESSION);
        }

        let document = Document {
            asset: glbopt_core::document::AssetInfo {
                version: "2.0".to_string(),
                generator: Some(self.writer.generator.clone()),
                copyright: source.asset.copyright.clone(),
                min_version: None,
            },
            scene: source.scene,
            scenes: source.scenes.clone(),
            nodes,
            meshes,
            accessors: std::mem::take(&mut self.accessors),
            buffer_views: std::mem::take(&mut self.views),
            buffers: vec![Buffer {
                byte_length: self.bin.len(),
                uri: None,
                name: None,
            }],
            materials: source.materials.clone(),
            textures: source.textures.clone(),
            images,
            samplers: source.samplers.clone(),
            animations,
            skins,
            cameras: source.cameras.clone(),
            extensions_used,
            extensions_required,
            extensions: source.extensions.clone(),
        };

        let json = serde_json::to_vec(&document)?;
        Ok(crate::glb::assemble(&json, Some(&self.bin)))
    }

    /// Append a buffer view, 4-byte aligned, and return its index.
    fn push_view(
        &mut self,
        data: &[u8],
        byte_stride: Option<usize>,
        target: Option<u32>,
        compression: Option<MeshoptCompression>,
    ) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let byte_offset = self.bin.len();
        self.bin.extend_from_slice(data);

        let extensions = compression.map(|mut ext| {
            ext.byte_offset = byte_offset;
            ext.byte_length = data.len();
            BufferViewExtensions {
                meshopt_compression: Some(ext),
            }
        });

        self.views.push(BufferView {
            buffer: 0,
            byte_offset,
            byte_length: data.len(),
            byte_stride,
            target,
            name: None,
            extensions,
        });
        self.views.len() - 1
    }

    fn push_accessor(&mut self, accessor: Accessor) -> usize {
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    fn emit_primitive(
        &mut self,
        prim: &OptimizedPrimitive,
        report: &mut OptimizeReport,
    ) -> Result<Primitive> {
        let indices = self.emit_indices(prim, report)?;

        let mut attributes = BTreeMap::new();
        for attr in &prim.attributes {
            let accessor = self.emit_attribute(prim, attr, report)?;
            attributes.insert(attr.semantic.clone(), accessor);
            if is_quantized(attr) {
                self.any_quantized = true;
            }
        }

        Ok(Primitive {
            attributes,
            indices: Some(indices),
            material: prim.material,
            mode: prim.mode,
        })
    }

    fn emit_indices(
        &mut self,
        prim: &OptimizedPrimitive,
        report: &mut OptimizeReport,
    ) -> Result<usize> {
        let count = prim.indices.len();
        let compressible = prim.mode == MODE_TRIANGLES && count > 0 && count % 3 == 0;

        if let (true, Some(codec)) = (compressible, self.writer.buffer_codec) {
            let wide = prim.indices.to_u32_vec();
            match codec.encode_index_buffer(&wide, count, 4) {
                Ok(encoded) => {
                    let view = self.push_view(
                        &encoded,
                        None,
                        None,
                        Some(MeshoptCompression {
                            buffer: 0,
                            byte_offset: 0,
                            byte_length: 0,
                            byte_stride: 4,
                            count,
                            mode: "TRIANGLES".to_string(),
                        }),
                    );
                    self.any_compressed = true;
                    return Ok(self.push_accessor(Accessor {
                        buffer_view: Some(view),
                        byte_offset: 0,
                        component_type: ComponentType::U32.gltf_code(),
                        count,
                        element_type: ElementType::Scalar.gltf_name().to_string(),
                        normalized: false,
                        min: None,
                        max: None,
                        name: None,
                    }));
                }
                Err(e) => {
                    report.push(ReportEntry::CompressionSkipped {
                        mesh: prim.mesh_index,
                        primitive: prim.primitive_index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let bytes = prim.indices.to_le_bytes();
        let view = self.push_view(&bytes, None, Some(TARGET_ELEMENT_ARRAY_BUFFER), None);
        Ok(self.push_accessor(Accessor {
            buffer_view: Some(view),
            byte_offset: 0,
            component_type: prim.indices.component_type().gltf_code(),
            count,
            element_type: ElementType::Scalar.gltf_name().to_string(),
            normalized: false,
            min: None,
            max: None,
            name: None,
        }))
    }

    fn emit_attribute(
        &mut self,
        prim: &OptimizedPrimitive,
        attr: &VertexAttribute,
        report: &mut OptimizeReport,
    ) -> Result<usize> {
        let count = attr.count();
        let tight = attr.element_size();
        let stride = (tight + 3) & !3;
        let bytes = pad_elements(&attr.data.to_le_bytes(), tight, stride);

        let (min, max) = if attr.semantic == POSITION {
            let (min, max) = element_min_max(attr);
            (Some(min), Some(max))
        } else {
            (None, None)
        };

        let mut view = None;
        if let Some(codec) = self.writer.buffer_codec {
            if count > 0 && stride <= 256 {
                match codec.encode_vertex_buffer(&bytes, count, stride) {
                    Ok(encoded) => {
                        view = Some(self.push_view(
                            &encoded,
                            None,
                            None,
                            Some(MeshoptCompression {
                                buffer: 0,
                                byte_offset: 0,
                                byte_length: 0,
                                byte_stride: stride,
                                count,
                                mode: "ATTRIBUTES".to_string(),
                            }),
                        ));
                        self.any_compressed = true;
                    }
                    Err(e) => {
                        report.push(ReportEntry::CompressionSkipped {
                            mesh: prim.mesh_index,
                            primitive: prim.primitive_index,
                            reason: format!("{}: {e}", attr.semantic),
                        });
                    }
                }
            }
        }
        let view = view.unwrap_or_else(|| {
            self.push_view(&bytes, Some(stride), Some(TARGET_ARRAY_BUFFER), None)
        });

        Ok(self.push_accessor(Accessor {
            buffer_view: Some(view),
            byte_offset: 0,
            component_type: attr.data.component_type().gltf_code(),
            count,
            element_type: attr.element_type.gltf_name().to_string(),
            normalized: attr.normalized,
            min,
            max,
            name: None,
        }))
    }

    fn emit_images(&mut self, report: &mut OptimizeReport) -> Result<Vec<Image>> {
        let asset = self.asset;
        let source = &asset.document;
        let mut out = Vec::with_capacity(source.images.len());
        for (index, image) in source.images.iter().enumerate() {
            if image.buffer_view.is_none() {
                // Data-URI and external images are preserved unchanged.
                out.push(image.clone());
                continue;
            }
            let bytes = asset.image_bytes(index)?.ok_or_else(|| {
                Error::InvalidData(format!("image {index} has a buffer view but no bytes"))
            })?;
            let mime = asset
                .image_mime(index)
                .unwrap_or_else(|| "application/octet-stream".to_string());

            let final_bytes = if self.writer.texture_scale < 1.0 {
                match self.writer.image_codec {
                    Some(codec) => match codec.resize(&bytes, &mime, self.writer.texture_scale) {
                        Ok(resized) => resized.bytes,
                        Err(e) => {
                            report.push(ReportEntry::ImageDecodeFailed {
                                image: index,
                                reason: e.to_string(),
                            });
                            bytes
                        }
                    },
                    None => bytes,
                }
            } else {
                bytes
            };

            let view = self.push_view(&final_bytes, None, None, None);
            out.push(Image {
                uri: None,
                mime_type: Some(mime),
                buffer_view: Some(view),
                name: image.name.clone(),
            });
        }
        Ok(out)
    }

    /// Copy accessors referenced by animations and skins into the new
    /// buffer and patch the references through an old-to-new remap.
    fn emit_animations_and_skins(
        &mut self,
    ) -> Result<(
        Vec<glbopt_core::document::Animation>,
        Vec<glbopt_core::document::Skin>,
    )> {
        let asset = self.asset;
        let source = &asset.document;
        let mut remap: BTreeMap<usize, usize> = BTreeMap::new();

        let mut referenced = Vec::new();
        for animation in &source.animations {
            for sampler in &animation.samplers {
                referenced.push(sampler.input);
                referenced.push(sampler.output);
            }
        }
        for skin in &source.skins {
            if let Some(ibm) = skin.inverse_bind_matrices {
                referenced.push(ibm);
            }
        }

        for old in referenced {
            if remap.contains_key(&old) {
                continue;
            }
            let bytes = asset.accessor_bytes(old)?.into_owned();
            let view = self.push_view(&bytes, None, None, None);
            let old_accessor = &source.accessors[old];
            let new = self.push_accessor(Accessor {
                buffer_view: Some(view),
                byte_offset: 0,
                component_type: old_accessor.component_type,
                count: old_accessor.count,
                element_type: old_accessor.element_type.clone(),
                normalized: old_accessor.normalized,
                min: old_accessor.min.clone(),
                max: old_accessor.max.clone(),
                name: old_accessor.name.clone(),
            });
            remap.insert(old, new);
        }

        let mut animations = source.animations.clone();
        for animation in &mut animations {
            for sampler in &mut animation.samplers {
                sampler.input = remap[&sampler.input];
                sampler.output = remap[&sampler.output];
            }
        }
        let mut skins = source.skins.clone();
        for skin in &mut skins {
            if let Some(ibm) = skin.inverse_bind_matrices {
                skin.inverse_bind_matrices = Some(remap[&ibm]);
            }
        }
        Ok((animations, skins))
    }

    /// Fold each mesh's position affine into the transform of every node
    /// that references the mesh.
    fn fixed_up_nodes(&self, level: &LodLevel, report: &mut OptimizeReport) -> Vec<Node> {
        let mut mesh_affines: BTreeMap<usize, DequantTransform> = BTreeMap::new();
        for prim in &level.primitives {
            if let Some(affine) = prim.position_dequant {
                let entry = mesh_affines.entry(prim.mesh_index).or_insert(affine);
                if *entry != affine {
                    // Shared mesh with per-primitive affines: the first one
                    // wins (known limitation).
                    log::debug!(
                        "mesh {} primitive {}: differing de-quantization affine ignored",
                        prim.mesh_index,
                        prim.primitive_index
                    );
                }
            }
        }

        let mut first_rotation: BTreeMap<usize, [f32; 4]> = BTreeMap::new();
        let mut nodes = self.asset.document.nodes.clone();
        for (node_index, node) in nodes.iter_mut().enumerate() {
            let mesh = match node.mesh {
                Some(m) => m,
                None => continue,
            };
            let affine = match mesh_affines.get(&mesh) {
                Some(a) => *a,
                None => continue,
            };

            let rotation = node.rotation_or_default();
            match first_rotation.get(&mesh) {
                None => {
                    first_rotation.insert(mesh, rotation);
                }
                Some(first) if !quat_eq(*first, rotation) => {
                    report.push(ReportEntry::SharedMeshRotation {
                        mesh,
                        node: node_index,
                    });
                }
                _ => {}
            }

            apply_affine_to_node(node, &affine);
        }
        nodes
    }
}

/// `node` gains the de-quantization affine so that
/// `world(node) * (S * q + T) == world'(node) * q`.
fn apply_affine_to_node(node: &mut Node, affine: &DequantTransform) {
    let s = Vector3::from(affine.scale);
    let t = Vector3::from(affine.translation);

    if let Some(matrix) = node.matrix {
        // Column-major glTF matrix times the affine.
        let m = Matrix4::from_column_slice(&matrix);
        let a = Matrix4::new_translation(&t) * Matrix4::new_nonuniform_scaling(&s);
        let folded = m * a;
        let mut out = [0.0f32; 16];
        out.copy_from_slice(folded.as_slice());
        node.matrix = Some(out);
        return;
    }

    let orig_scale = Vector3::from(node.scale_or_default());
    let [x, y, z, w] = node.rotation_or_default();
    let rotation = UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z));
    let orig_translation = Vector3::from(node.translation_or_default());

    let new_scale = orig_scale.component_mul(&s);
    let rotated = rotation * orig_scale.component_mul(&t);
    let new_translation = orig_translation + rotated;

    node.scale = Some([new_scale.x, new_scale.y, new_scale.z]);
    node.translation = Some([new_translation.x, new_translation.y, new_translation.z]);
}

fn quat_eq(a: [f32; 4], b: [f32; 4]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-6)
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|e| e == name) {
        list.push(name.to_string());
    }
}

fn is_quantized(attr: &VertexAttribute) -> bool {
    let integer = !matches!(attr.data, AttributeData::F32(_));
    integer
        && (attr.semantic == POSITION
            || attr.semantic == "NORMAL"
            || attr.semantic == "TANGENT"
            || attr.semantic.starts_with("TEXCOORD_"))
}

/// Re-pack tight elements into padded slots of `stride` bytes.
fn pad_elements(bytes: &[u8], tight: usize, stride: usize) -> Vec<u8> {
    if tight == stride || tight == 0 {
        return bytes.to_vec();
    }
    let count = bytes.len() / tight;
    let mut out = vec![0u8; count * stride];
    for i in 0..count {
        out[i * stride..i * stride + tight].copy_from_slice(&bytes[i * tight..(i + 1) * tight]);
    }
    out
}

/// Componentwise min/max of an attribute as JSON numbers.
fn element_min_max(attr: &VertexAttribute) -> (Vec<f64>, Vec<f64>) {
    let comps = attr.element_type.components();
    let mut min = vec![f64::INFINITY; comps];
    let mut max = vec![f64::NEG_INFINITY; comps];

    fn fold<T: Copy + Into<f64>>(data: &[T], comps: usize, min: &mut [f64], max: &mut [f64]) {
        for chunk in data.chunks_exact(comps) {
            for (i, &v) in chunk.iter().enumerate() {
                let v: f64 = v.into();
                if v < min[i] {
                    min[i] = v;
                }
                if v > max[i] {
                    max[i] = v;
                }
            }
        }
    }

    match &attr.data {
        AttributeData::I8(v) => fold(v, comps, &mut min, &mut max),
        AttributeData::U8(v) => fold(v, comps, &mut min, &mut max),
        AttributeData::I16(v) => fold(v, comps, &mut min, &mut max),
        AttributeData::U16(v) => fold(v, comps, &mut min, &mut max),
        AttributeData::U32(v) => fold(v, comps, &mut min, &mut max),
        AttributeData::F32(v) => fold(v, comps, &mut min, &mut max),
    }

    if min.iter().any(|v| !v.is_finite()) {
        return (vec![0.0; comps], vec![0.0; comps]);
    }
    (min, max)
}
