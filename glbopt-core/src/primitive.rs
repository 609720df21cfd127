//! Pipeline value types.
//!
//! Each optimization stage consumes one of these values and returns a new
//! one; nothing is mutated across stage boundaries.

use crate::attribute::{AttributeData, ComponentType, VertexAttribute};

/// glTF semantic of the required position attribute.
pub const POSITION: &str = "POSITION";

/// De-quantization affine: `p = scale * q + translation`, componentwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DequantTransform {
    pub scale: [f32; 3],
    pub translation: [f32; 3],
}

/// Recorded offset/scale applied to UVs that fell outside `[0, 1]` before
/// quantization: `uv = remap.offset + remap.scale * q_normalized`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRemap {
    pub offset: [f32; 2],
    pub scale: [f32; 2],
}

/// A primitive decoded into owned working arrays.
#[derive(Debug, Clone)]
pub struct PrimitiveData {
    pub mesh_index: usize,
    pub primitive_index: usize,
    /// Attribute order is preserved from the source document.
    pub attributes: Vec<VertexAttribute>,
    /// Indices decoded to u32; synthesized `[0..N)` when the source had none.
    pub indices: Vec<u32>,
    pub material: Option<usize>,
    pub mode: u32,
}

impl PrimitiveData {
    pub fn vertex_count(&self) -> usize {
        self.attributes.first().map_or(0, |a| a.count())
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn attribute(&self, semantic: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }

    /// Flat `f32` position components, when present and float-typed.
    pub fn positions(&self) -> Option<&[f32]> {
        match self.attribute(POSITION)? {
            VertexAttribute {
                data: AttributeData::F32(v),
                ..
            } => Some(v),
            _ => None,
        }
    }

    /// Flat `f32` first-channel UV components, when present and float-typed.
    pub fn uvs(&self) -> Option<&[f32]> {
        match self.attribute("TEXCOORD_0")? {
            VertexAttribute {
                data: AttributeData::F32(v),
                ..
            } => Some(v),
            _ => None,
        }
    }
}

/// Final index storage at minimized width.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    /// Narrow u32 indices to the smallest width that holds `vertex_count`.
    pub fn from_u32(indices: &[u32], vertex_count: usize) -> IndexData {
        if vertex_count <= (u8::MAX as usize) {
            IndexData::U8(indices.iter().map(|&i| i as u8).collect())
        } else if vertex_count <= (u16::MAX as usize) {
            IndexData::U16(indices.iter().map(|&i| i as u16).collect())
        } else {
            IndexData::U32(indices.to_vec())
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexData::U8(v) => v.len(),
            IndexData::U16(v) => v.len(),
            IndexData::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            IndexData::U8(_) => ComponentType::U8,
            IndexData::U16(_) => ComponentType::U16,
            IndexData::U32(_) => ComponentType::U32,
        }
    }

    pub fn to_u32_vec(&self) -> Vec<u32> {
        match self {
            IndexData::U8(v) => v.iter().map(|&i| i as u32).collect(),
            IndexData::U16(v) => v.iter().map(|&i| i as u32).collect(),
            IndexData::U32(v) => v.clone(),
        }
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            IndexData::U8(v) => v.clone(),
            IndexData::U16(v) => v.iter().flat_map(|i| i.to_le_bytes()).collect(),
            IndexData::U32(v) => v.iter().flat_map(|i| i.to_le_bytes()).collect(),
        }
    }
}

/// A primitive after the full stage chain: quantized attributes, minimized
/// indices and the position de-quantization affine for the writer to fold
/// into node transforms.
#[derive(Debug, Clone)]
pub struct OptimizedPrimitive {
    pub mesh_index: usize,
    pub primitive_index: usize,
    pub attributes: Vec<VertexAttribute>,
    pub indices: IndexData,
    pub material: Option<usize>,
    pub mode: u32,
    pub position_dequant: Option<DequantTransform>,
    pub uv_remap: Option<UvRemap>,
}

impl OptimizedPrimitive {
    pub fn vertex_count(&self) -> usize {
        self.attributes.first().map_or(0, |a| a.count())
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn attribute(&self, semantic: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }
}

/// One LOD level: every primitive of the asset at a single reduction ratio.
#[derive(Debug, Clone)]
pub struct LodLevel {
    pub ratio: f32,
    pub primitives: Vec<OptimizedPrimitive>,
    pub triangle_count: usize,
}

/// Ordered list of LOD levels, highest-detail first.
#[derive(Debug, Clone, Default)]
pub struct LodChain {
    pub levels: Vec<LodLevel>,
}

impl LodChain {
    /// The level whose ratio is closest to `ratio`.
    pub fn select(&self, ratio: f32) -> Option<&LodLevel> {
        self.levels.iter().min_by(|a, b| {
            (a.ratio - ratio)
                .abs()
                .total_cmp(&(b.ratio - ratio).abs())
        })
    }
}

/// Helper used by quantization and tests: per-element min/max of a float
/// attribute with the given arity.
pub fn component_min_max(data: &[f32], components: usize) -> (Vec<f32>, Vec<f32>) {
    let mut min = vec![f32::INFINITY; components];
    let mut max = vec![f32::NEG_INFINITY; components];
    for chunk in data.chunks_exact(components) {
        for (i, &v) in chunk.iter().enumerate() {
            min[i] = min[i].min(v);
            max[i] = max[i].max(v);
        }
    }
    (min, max)
}
