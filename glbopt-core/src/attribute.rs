//! Tagged vertex-attribute arrays.
//!
//! Every pipeline stage dispatches on a `(ComponentType, ElementType)` tag
//! instead of duck-typing raw buffers. Data is stored as flat component
//! vectors; an element is `components()` consecutive values.

use crate::error::{Error, Result};

/// Scalar component type of an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    /// Parse a glTF `componentType` code.
    pub fn from_gltf(code: u32) -> Result<Self> {
        match code {
            5120 => Ok(ComponentType::I8),
            5121 => Ok(ComponentType::U8),
            5122 => Ok(ComponentType::I16),
            5123 => Ok(ComponentType::U16),
            5125 => Ok(ComponentType::U32),
            5126 => Ok(ComponentType::F32),
            other => Err(Error::UnsupportedComponentType(other)),
        }
    }

    /// The glTF `componentType` code.
    pub fn gltf_code(&self) -> u32 {
        match self {
            ComponentType::I8 => 5120,
            ComponentType::U8 => 5121,
            ComponentType::I16 => 5122,
            ComponentType::U16 => 5123,
            ComponentType::U32 => 5125,
            ComponentType::F32 => 5126,
        }
    }

    /// Size of one component in bytes.
    pub fn size(&self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }
}

/// Element arity of an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementType {
    /// Parse a glTF `type` string.
    pub fn from_gltf(name: &str) -> Result<Self> {
        match name {
            "SCALAR" => Ok(ElementType::Scalar),
            "VEC2" => Ok(ElementType::Vec2),
            "VEC3" => Ok(ElementType::Vec3),
            "VEC4" => Ok(ElementType::Vec4),
            "MAT2" => Ok(ElementType::Mat2),
            "MAT3" => Ok(ElementType::Mat3),
            "MAT4" => Ok(ElementType::Mat4),
            other => Err(Error::InvalidData(format!(
                "unknown accessor type {:?}",
                other
            ))),
        }
    }

    /// The glTF `type` string.
    pub fn gltf_name(&self) -> &'static str {
        match self {
            ElementType::Scalar => "SCALAR",
            ElementType::Vec2 => "VEC2",
            ElementType::Vec3 => "VEC3",
            ElementType::Vec4 => "VEC4",
            ElementType::Mat2 => "MAT2",
            ElementType::Mat3 => "MAT3",
            ElementType::Mat4 => "MAT4",
        }
    }

    /// Number of components per element.
    pub fn components(&self) -> usize {
        match self {
            ElementType::Scalar => 1,
            ElementType::Vec2 => 2,
            ElementType::Vec3 => 3,
            ElementType::Vec4 => 4,
            ElementType::Mat2 => 4,
            ElementType::Mat3 => 9,
            ElementType::Mat4 => 16,
        }
    }
}

/// Flat component storage tagged by component type.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

impl AttributeData {
    /// Total number of scalar components stored.
    pub fn component_len(&self) -> usize {
        match self {
            AttributeData::I8(v) => v.len(),
            AttributeData::U8(v) => v.len(),
            AttributeData::I16(v) => v.len(),
            AttributeData::U16(v) => v.len(),
            AttributeData::U32(v) => v.len(),
            AttributeData::F32(v) => v.len(),
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            AttributeData::I8(_) => ComponentType::I8,
            AttributeData::U8(_) => ComponentType::U8,
            AttributeData::I16(_) => ComponentType::I16,
            AttributeData::U16(_) => ComponentType::U16,
            AttributeData::U32(_) => ComponentType::U32,
            AttributeData::F32(_) => ComponentType::F32,
        }
    }

    /// Little-endian bytes of every component, in storage order.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            AttributeData::I8(v) => v.iter().map(|x| *x as u8).collect(),
            AttributeData::U8(v) => v.clone(),
            AttributeData::I16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            AttributeData::U16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            AttributeData::U32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            AttributeData::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }

    /// Lossless widening view as `f32` (integer variants are converted).
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            AttributeData::I8(v) => v.iter().map(|x| *x as f32).collect(),
            AttributeData::U8(v) => v.iter().map(|x| *x as f32).collect(),
            AttributeData::I16(v) => v.iter().map(|x| *x as f32).collect(),
            AttributeData::U16(v) => v.iter().map(|x| *x as f32).collect(),
            AttributeData::U32(v) => v.iter().map(|x| *x as f32).collect(),
            AttributeData::F32(v) => v.clone(),
        }
    }
}

/// A named vertex attribute: tag, storage and accessor metadata.
#[derive(Debug, Clone)]
pub struct VertexAttribute {
    /// glTF semantic, e.g. `POSITION`, `TEXCOORD_0`.
    pub semantic: String,
    pub element_type: ElementType,
    pub data: AttributeData,
    pub normalized: bool,
}

impl VertexAttribute {
    pub fn new(semantic: impl Into<String>, element_type: ElementType, data: AttributeData) -> Self {
        Self {
            semantic: semantic.into(),
            element_type,
            data,
            normalized: false,
        }
    }

    /// Number of elements (vertices).
    pub fn count(&self) -> usize {
        let c = self.element_type.components();
        if c == 0 {
            0
        } else {
            self.data.component_len() / c
        }
    }

    /// Tight element size in bytes.
    pub fn element_size(&self) -> usize {
        self.element_type.components() * self.data.component_type().size()
    }

    /// Scatter elements into new slots: `remap[old] = new`. Duplicate old
    /// vertices map to the same slot and write identical data.
    pub fn remap(&self, remap: &[u32], new_count: usize) -> VertexAttribute {
        let comps = self.element_type.components();

        fn scatter<T: Copy + Default>(
            data: &[T],
            remap: &[u32],
            comps: usize,
            new_count: usize,
        ) -> Vec<T> {
            let mut out = vec![T::default(); new_count * comps];
            for (old, &new) in remap.iter().enumerate() {
                let new = new as usize;
                if new >= new_count {
                    continue;
                }
                let src = old * comps;
                let dst = new * comps;
                if src + comps <= data.len() {
                    out[dst..dst + comps].copy_from_slice(&data[src..src + comps]);
                }
            }
            out
        }

        let data = match &self.data {
            AttributeData::I8(v) => AttributeData::I8(scatter(v, remap, comps, new_count)),
            AttributeData::U8(v) => AttributeData::U8(scatter(v, remap, comps, new_count)),
            AttributeData::I16(v) => AttributeData::I16(scatter(v, remap, comps, new_count)),
            AttributeData::U16(v) => AttributeData::U16(scatter(v, remap, comps, new_count)),
            AttributeData::U32(v) => AttributeData::U32(scatter(v, remap, comps, new_count)),
            AttributeData::F32(v) => AttributeData::F32(scatter(v, remap, comps, new_count)),
        };

        VertexAttribute {
            semantic: self.semantic.clone(),
            element_type: self.element_type,
            data,
            normalized: self.normalized,
        }
    }

    /// Gather elements by index: output element `i` is input element
    /// `order[i]`. Used when a stage produces a keep-list instead of a
    /// scatter remap.
    pub fn gather(&self, order: &[u32]) -> VertexAttribute {
        let comps = self.element_type.components();

        fn pick<T: Copy + Default>(data: &[T], order: &[u32], comps: usize) -> Vec<T> {
            let mut out = Vec::with_capacity(order.len() * comps);
            for &src in order {
                let s = src as usize * comps;
                if s + comps <= data.len() {
                    out.extend_from_slice(&data[s..s + comps]);
                } else {
                    out.extend(std::iter::repeat(T::default()).take(comps));
                }
            }
            out
        }

        let data = match &self.data {
            AttributeData::I8(v) => AttributeData::I8(pick(v, order, comps)),
            AttributeData::U8(v) => AttributeData::U8(pick(v, order, comps)),
            AttributeData::I16(v) => AttributeData::I16(pick(v, order, comps)),
            AttributeData::U16(v) => AttributeData::U16(pick(v, order, comps)),
            AttributeData::U32(v) => AttributeData::U32(pick(v, order, comps)),
            AttributeData::F32(v) => AttributeData::F32(pick(v, order, comps)),
        };

        VertexAttribute {
            semantic: self.semantic.clone(),
            element_type: self.element_type,
            data,
            normalized: self.normalized,
        }
    }
}
