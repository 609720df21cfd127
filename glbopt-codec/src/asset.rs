//! Parsed glTF-Binary asset and accessor addressing.
//!
//! An `Asset` owns the JSON document and the immutable binary blob. Typed
//! accessor reads borrow the blob zero-copy when the data is tightly packed
//! and gather-copy otherwise; all reads are bounds checked against the
//! owning buffer view.

use std::borrow::Cow;

use base64::Engine;
use glbopt_core::{
    AttributeData, ComponentType, ElementType, Error, PrimitiveData, Result, VertexAttribute,
    document::{Accessor, Document},
    primitive::POSITION,
};

use crate::glb;

/// Semantics the pipeline works on as `f32` arrays; everything else keeps
/// its native component type.
fn is_float_semantic(semantic: &str) -> bool {
    semantic == POSITION
        || semantic == "NORMAL"
        || semantic == "TANGENT"
        || semantic.starts_with("TEXCOORD_")
}

/// Summary counters for a parsed asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetStats {
    pub meshes: usize,
    pub primitives: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub images: usize,
    pub animations: usize,
    pub skins: usize,
}

/// A parsed glTF-Binary asset: document plus binary blob.
#[derive(Debug, Clone)]
pub struct Asset {
    pub document: Document,
    pub bin: Vec<u8>,
}

impl Asset {
    /// Parse a GLB byte stream.
    pub fn from_glb(data: &[u8]) -> Result<Asset> {
        let chunks = glb::split(data)?;
        let document: Document = serde_json::from_slice(&chunks.json)?;

        if document.buffers.len() > 1 {
            return Err(Error::InvalidData(
                "multi-buffer assets are not supported".to_string(),
            ));
        }
        if let Some(buffer) = document.buffers.first() {
            if buffer.uri.is_some() {
                return Err(Error::InvalidData(
                    "buffer 0 must use the BIN chunk, not a URI".to_string(),
                ));
            }
        }
        for (i, view) in document.buffer_views.iter().enumerate() {
            if view
                .extensions
                .as_ref()
                .and_then(|e| e.meshopt_compression.as_ref())
                .is_some()
            {
                return Err(Error::InvalidData(format!(
                    "buffer view {i} is meshopt-compressed; compressed input is not supported"
                )));
            }
        }

        Ok(Asset {
            document,
            bin: chunks.bin.unwrap_or_default(),
        })
    }

    /// Mesh/primitive/vertex/triangle counters.
    pub fn stats(&self) -> AssetStats {
        let mut stats = AssetStats {
            meshes: self.document.meshes.len(),
            images: self.document.images.len(),
            animations: self.document.animations.len(),
            skins: self.document.skins.len(),
            ..Default::default()
        };
        for mesh in &self.document.meshes {
            for prim in &mesh.primitives {
                stats.primitives += 1;
                if let Some(&pos) = prim.attributes.get(POSITION) {
                    if let Some(acc) = self.document.accessors.get(pos) {
                        stats.vertices += acc.count;
                        let index_count = prim
                            .indices
                            .and_then(|i| self.document.accessors.get(i))
                            .map_or(acc.count, |a| a.count);
                        stats.triangles += index_count / 3;
                    }
                }
            }
        }
        stats
    }

    fn accessor(&self, index: usize) -> Result<&Accessor> {
        self.document
            .accessors
            .get(index)
            .ok_or_else(|| Error::AccessorOutOfRange {
                index,
                reason: "no such accessor".to_string(),
            })
    }

    /// Raw bytes of an accessor: a zero-copy borrow when the stride equals
    /// the element size, a gathered copy otherwise.
    pub fn accessor_bytes(&self, index: usize) -> Result<Cow<'_, [u8]>> {
        let acc = self.accessor(index)?;
        let view_index = acc.buffer_view.ok_or_else(|| Error::AccessorOutOfRange {
            index,
            reason: "accessor has no buffer view".to_string(),
        })?;
        let view = self
            .document
            .buffer_views
            .get(view_index)
            .ok_or_else(|| Error::AccessorOutOfRange {
                index,
                reason: format!("buffer view {view_index} out of range"),
            })?;

        let component = ComponentType::from_gltf(acc.component_type)?;
        let element = ElementType::from_gltf(&acc.element_type)?;
        let element_size = component.size() * element.components();
        let stride = view.byte_stride.unwrap_or(element_size);

        let view_start = view.byte_offset;
        let view_end = view_start + view.byte_length;
        if view_end > self.bin.len() {
            return Err(Error::AccessorOutOfRange {
                index,
                reason: "buffer view exceeds binary blob".to_string(),
            });
        }

        let first = view_start + acc.byte_offset;
        if acc.count == 0 {
            return Ok(Cow::Borrowed(&[]));
        }
        // The final element needs element_size bytes even when stride is
        // larger.
        let last_end = first + (acc.count - 1) * stride + element_size;
        if last_end > view_end {
            return Err(Error::AccessorOutOfRange {
                index,
                reason: format!(
                    "count {} x stride {} overruns buffer view {}",
                    acc.count, stride, view_index
                ),
            });
        }

        if stride == element_size {
            Ok(Cow::Borrowed(&self.bin[first..last_end]))
        } else {
            let mut out = Vec::with_capacity(acc.count * element_size);
            for i in 0..acc.count {
                let start = first + i * stride;
                out.extend_from_slice(&self.bin[start..start + element_size]);
            }
            Ok(Cow::Owned(out))
        }
    }

    /// Read an accessor at its native component type.
    pub fn read_attribute_data(&self, index: usize) -> Result<(ElementType, AttributeData, bool)> {
        let acc = self.accessor(index)?;
        let component = ComponentType::from_gltf(acc.component_type)?;
        let element = ElementType::from_gltf(&acc.element_type)?;
        let normalized = acc.normalized;
        let bytes = self.accessor_bytes(index)?;

        let data = match component {
            ComponentType::I8 => {
                AttributeData::I8(bytes.iter().map(|&b| b as i8).collect())
            }
            ComponentType::U8 => AttributeData::U8(bytes.to_vec()),
            ComponentType::I16 => AttributeData::I16(
                bytes
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            ComponentType::U16 => AttributeData::U16(
                bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            ComponentType::U32 => AttributeData::U32(
                bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            ComponentType::F32 => AttributeData::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
        };

        Ok((element, data, normalized))
    }

    /// Read an accessor as `f32`, honoring the `normalized` flag of integer
    /// component types.
    pub fn accessor_f32(&self, index: usize) -> Result<Vec<f32>> {
        let (_, data, normalized) = self.read_attribute_data(index)?;
        if !normalized {
            return Ok(data.to_f32_vec());
        }
        let out = match data {
            AttributeData::I8(v) => v.iter().map(|&x| (x as f32 / 127.0).max(-1.0)).collect(),
            AttributeData::U8(v) => v.iter().map(|&x| x as f32 / 255.0).collect(),
            AttributeData::I16(v) => v.iter().map(|&x| (x as f32 / 32767.0).max(-1.0)).collect(),
            AttributeData::U16(v) => v.iter().map(|&x| x as f32 / 65535.0).collect(),
            AttributeData::U32(v) => v.iter().map(|&x| x as f32).collect(),
            AttributeData::F32(v) => v,
        };
        Ok(out)
    }

    /// Decode an index accessor to `u32`.
    pub fn read_indices(&self, index: usize) -> Result<Vec<u32>> {
        let (_, data, _) = self.read_attribute_data(index)?;
        match data {
            AttributeData::U8(v) => Ok(v.iter().map(|&i| i as u32).collect()),
            AttributeData::U16(v) => Ok(v.iter().map(|&i| i as u32).collect()),
            AttributeData::U32(v) => Ok(v),
            other => Err(Error::AccessorOutOfRange {
                index,
                reason: format!(
                    "index accessor has component type {:?}",
                    other.component_type()
                ),
            }),
        }
    }

    /// Decode every primitive into owned working arrays, in stable order
    /// (mesh index, then primitive index).
    pub fn primitives(&self) -> Result<Vec<PrimitiveData>> {
        let mut out = Vec::new();
        for (mesh_index, mesh) in self.document.meshes.iter().enumerate() {
            for (primitive_index, prim) in mesh.primitives.iter().enumerate() {
                if !prim.attributes.contains_key(POSITION) {
                    return Err(Error::MissingPositionAttribute {
                        mesh: mesh_index,
                        primitive: primitive_index,
                    });
                }

                let mut attributes = Vec::with_capacity(prim.attributes.len());
                let mut vertex_count = None;
                for (semantic, &acc_index) in &prim.attributes {
                    let (element, data, normalized) = self.read_attribute_data(acc_index)?;
                    let attr = if is_float_semantic(semantic) {
                        let floats = self.accessor_f32(acc_index)?;
                        VertexAttribute {
                            semantic: semantic.clone(),
                            element_type: element,
                            data: AttributeData::F32(floats),
                            normalized: false,
                        }
                    } else {
                        VertexAttribute {
                            semantic: semantic.clone(),
                            element_type: element,
                            data,
                            normalized,
                        }
                    };

                    let count = attr.count();
                    match vertex_count {
                        None => vertex_count = Some(count),
                        Some(expected) if expected != count => {
                            return Err(Error::InvalidData(format!(
                                "mesh {mesh_index} primitive {primitive_index}: attribute {} has \
                                 {count} elements, expected {expected}",
                                semantic
                            )));
                        }
                        _ => {}
                    }
                    attributes.push(attr);
                }

                // POSITION first so downstream stages can rely on it.
                attributes.sort_by_key(|a| (a.semantic != POSITION, a.semantic.clone()));

                let vertex_count = vertex_count.unwrap_or(0);
                let indices = match prim.indices {
                    Some(acc_index) => self.read_indices(acc_index)?,
                    None => (0..vertex_count as u32).collect(),
                };
                if let Some(&max) = indices.iter().max() {
                    if max as usize >= vertex_count {
                        return Err(Error::InvalidData(format!(
                            "mesh {mesh_index} primitive {primitive_index}: index {max} out of \
                             range for {vertex_count} vertices"
                        )));
                    }
                }

                out.push(PrimitiveData {
                    mesh_index,
                    primitive_index,
                    attributes,
                    indices,
                    material: prim.material,
                    mode: prim.mode,
                });
            }
        }
        Ok(out)
    }

    /// Bytes of an image: a buffer-view slice or a decoded data URI.
    /// `None` for external-file URIs.
    pub fn image_bytes(&self, index: usize) -> Result<Option<Vec<u8>>> {
        let image = match self.document.images.get(index) {
            Some(i) => i,
            None => return Ok(None),
        };
        if let Some(view_index) = image.buffer_view {
            let view = self
                .document
                .buffer_views
                .get(view_index)
                .ok_or_else(|| Error::InvalidData(format!(
                    "image {index} references buffer view {view_index} out of range"
                )))?;
            let start = view.byte_offset;
            let end = start + view.byte_length;
            if end > self.bin.len() {
                return Err(Error::InvalidData(format!(
                    "image {index} buffer view exceeds binary blob"
                )));
            }
            return Ok(Some(self.bin[start..end].to_vec()));
        }
        if let Some(uri) = &image.uri {
            if let Some(rest) = uri.strip_prefix("data:") {
                return decode_data_uri(rest).map(Some);
            }
        }
        Ok(None)
    }

    /// Best-effort mime type of an image: declared, or sniffed from magic
    /// bytes.
    pub fn image_mime(&self, index: usize) -> Option<String> {
        let image = self.document.images.get(index)?;
        if let Some(mime) = &image.mime_type {
            return Some(mime.clone());
        }
        let bytes = self.image_bytes(index).ok().flatten()?;
        if bytes.starts_with(b"\x89PNG") {
            Some("image/png".to_string())
        } else if bytes.starts_with(b"\xFF\xD8") {
            Some("image/jpeg".to_string())
        } else {
            None
        }
    }
}

/// Decode the part of a data URI after the `data:` prefix.
fn decode_data_uri(rest: &str) -> Result<Vec<u8>> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::InvalidData("malformed data URI".to_string()))?;
    if header.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| Error::InvalidData(format!("base64 decode error: {e}")))
    } else {
        Err(Error::InvalidData(
            "only base64 data URIs are supported".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glbopt_core::document::*;

    /// One float triangle with u16 indices, hand-assembled.
    fn make_triangle_asset() -> Asset {
        let positions: Vec<u8> = [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect();
        let mut bin = positions;
        let idx_offset = bin.len();
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        bin.extend_from_slice(&[0, 0]); // align

        let mut prim = Primitive::default();
        prim.attributes.insert(POSITION.to_string(), 0);
        prim.indices = Some(1);

        let document = Document {
            asset: AssetInfo::default(),
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
                    count: 3,
                    element_type: "VEC3".to_string(),
                    normalized: false,
                    min: None,
                    max: None,
                    name: None,
                },
                Accessor {
                    buffer_view: Some(1),
                    byte_offset: 0,
                    component_type: 5123,
                    count: 3,
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
                    byte_length: 36,
                    ..Default::default()
                },
                BufferView {
                    buffer: 0,
                    byte_offset: idx_offset,
                    byte_length: 6,
                    ..Default::default()
                },
            ],
            buffers: vec![Buffer {
                byte_length: 44,
                uri: None,
                name: None,
            }],
            ..Default::default()
        };

        Asset { document, bin }
    }

    #[test]
    fn test_parse_roundtrip_through_container() {
        let asset = make_triangle_asset();
        let json = serde_json::to_vec(&asset.document).unwrap();
        let bytes = glb::assemble(&json, Some(&asset.bin));
        let parsed = Asset::from_glb(&bytes).unwrap();
        assert_eq!(parsed.document.meshes.len(), 1);
        assert_eq!(parsed.stats().triangles, 1);
        assert_eq!(parsed.stats().vertices, 3);
    }

    #[test]
    fn test_accessor_zero_copy() {
        let asset = make_triangle_asset();
        let bytes = asset.accessor_bytes(0).unwrap();
        assert!(matches!(bytes, Cow::Borrowed(_)));
        assert_eq!(bytes.len(), 36);
    }

    #[test]
    fn test_strided_accessor_gathers() {
        let mut asset = make_triangle_asset();
        // Interleave: pretend stride 16 with 4 bytes padding per vertex.
        let mut strided = Vec::new();
        for chunk in asset.bin[..36].chunks_exact(12) {
            strided.extend_from_slice(chunk);
            strided.extend_from_slice(&[0xAA; 4]);
        }
        asset.bin = strided;
        asset.document.buffer_views[0].byte_length = 48;
        asset.document.buffer_views[0].byte_stride = Some(16);
        asset.document.buffer_views.truncate(1);
        asset.document.accessors.truncate(1);
        asset.document.meshes[0].primitives[0].indices = None;

        let bytes = asset.accessor_bytes(0).unwrap();
        assert!(matches!(bytes, Cow::Owned(_)));
        assert_eq!(bytes.len(), 36);
        let floats = asset.accessor_f32(0).unwrap();
        assert_eq!(floats[3], 1.0);
    }

    #[test]
    fn test_accessor_out_of_range() {
        let mut asset = make_triangle_asset();
        asset.document.accessors[0].count = 100;
        assert!(matches!(
            asset.accessor_bytes(0),
            Err(Error::AccessorOutOfRange { index: 0, .. })
        ));
    }

    #[test]
    fn test_primitives_decode_and_synthesize_indices() {
        let mut asset = make_triangle_asset();
        asset.document.meshes[0].primitives[0].indices = None;
        let prims = asset.primitives().unwrap();
        assert_eq!(prims.len(), 1);
        assert_eq!(prims[0].indices, vec![0, 1, 2]);
        assert_eq!(prims[0].vertex_count(), 3);
    }

    #[test]
    fn test_missing_position_attribute() {
        let mut asset = make_triangle_asset();
        asset.document.meshes[0].primitives[0]
            .attributes
            .remove(POSITION);
        assert!(matches!(
            asset.primitives(),
            Err(Error::MissingPositionAttribute {
                mesh: 0,
                primitive: 0
            })
        ));
    }

    #[test]
    fn test_normalized_read() {
        let mut asset = make_triangle_asset();
        // Replace positions with u8-normalized data.
        asset.bin = vec![0, 127, 255, 0, 0, 0];
        asset.document.buffer_views = vec![BufferView {
            buffer: 0,
            byte_offset: 0,
            byte_length: 3,
            ..Default::default()
        }];
        asset.document.accessors = vec![Accessor {
            buffer_view: Some(0),
            byte_offset: 0,
            component_type: 5121,
            count: 1,
            element_type: "VEC3".to_string(),
            normalized: true,
            min: None,
            max: None,
            name: None,
        }];
        let floats = asset.accessor_f32(0).unwrap();
        assert_eq!(floats[0], 0.0);
        assert!((floats[1] - 127.0 / 255.0).abs() < 1e-6);
        assert_eq!(floats[2], 1.0);
    }

    #[test]
    fn test_data_uri_image() {
        let mut asset = make_triangle_asset();
        asset.document.images.push(Image {
            uri: Some("data:image/png;base64,aGVsbG8=".to_string()),
            mime_type: Some("image/png".to_string()),
            buffer_view: None,
            name: None,
        });
        let bytes = asset.image_bytes(0).unwrap().unwrap();
        assert_eq!(bytes, b"hello");
    }
}
