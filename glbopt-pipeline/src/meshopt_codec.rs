//! Default `BufferCodec` backed by the meshopt encoders.

use glbopt_core::{BufferCodec, Error, Result};

/// `EXT_meshopt_compression` bitstream encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshoptCodec;

impl MeshoptCodec {
    pub fn new() -> Self {
        Self
    }
}

/// The vertex encoder is generic over a fixed-size record type, so runtime
/// strides dispatch to a const-sized chunk view.
fn encode_rows<const N: usize>(bytes: &[u8]) -> Result<Vec<u8>> {
    let rows: &[[u8; N]] = bytemuck::cast_slice(bytes);
    meshopt::encode_vertex_buffer(rows)
        .map_err(|e| Error::InvalidData(format!("meshopt vertex encode failed: {e}")))
}

impl BufferCodec for MeshoptCodec {
    fn encode_index_buffer(
        &self,
        indices: &[u32],
        count: usize,
        _stride: usize,
    ) -> Result<Vec<u8>> {
        if count == 0 || count % 3 != 0 {
            return Err(Error::InvalidData(format!(
                "index count {count} is not a triangle list"
            )));
        }
        let vertex_count = indices.iter().max().map_or(0, |&m| m as usize + 1);
        meshopt::encode_index_buffer(indices, vertex_count)
            .map_err(|e| Error::InvalidData(format!("meshopt index encode failed: {e}")))
    }

    fn encode_vertex_buffer(&self, bytes: &[u8], count: usize, stride: usize) -> Result<Vec<u8>> {
        if stride == 0 || stride % 4 != 0 || stride > 256 {
            return Err(Error::InvalidData(format!(
                "vertex stride {stride} not encodable (must be a positive multiple of 4, <= 256)"
            )));
        }
        if bytes.len() != count * stride {
            return Err(Error::InvalidData(format!(
                "vertex buffer length {} does not match count {count} x stride {stride}",
                bytes.len()
            )));
        }

        match stride {
            4 => encode_rows::<4>(bytes),
            8 => encode_rows::<8>(bytes),
            12 => encode_rows::<12>(bytes),
            16 => encode_rows::<16>(bytes),
            20 => encode_rows::<20>(bytes),
            24 => encode_rows::<24>(bytes),
            28 => encode_rows::<28>(bytes),
            32 => encode_rows::<32>(bytes),
            36 => encode_rows::<36>(bytes),
            40 => encode_rows::<40>(bytes),
            44 => encode_rows::<44>(bytes),
            48 => encode_rows::<48>(bytes),
            52 => encode_rows::<52>(bytes),
            56 => encode_rows::<56>(bytes),
            60 => encode_rows::<60>(bytes),
            64 => encode_rows::<64>(bytes),
            128 => encode_rows::<128>(bytes),
            256 => encode_rows::<256>(bytes),
            other => Err(Error::InvalidData(format!(
                "vertex stride {other} has no encoder instantiation"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_encode_roundtrip_size() {
        let codec = MeshoptCodec::new();
        let indices = vec![0u32, 1, 2, 2, 1, 3];
        let encoded = codec.encode_index_buffer(&indices, indices.len(), 4).unwrap();
        assert!(!encoded.is_empty());
    }

    #[test]
    fn test_index_encode_rejects_non_triangles() {
        let codec = MeshoptCodec::new();
        assert!(codec.encode_index_buffer(&[0, 1], 2, 4).is_err());
        assert!(codec.encode_index_buffer(&[], 0, 4).is_err());
    }

    #[test]
    fn test_vertex_encode_stride_contract() {
        let codec = MeshoptCodec::new();
        let data = vec![0u8; 64];
        assert!(codec.encode_vertex_buffer(&data, 8, 8).is_ok());
        // Stride not divisible by 4.
        assert!(codec.encode_vertex_buffer(&data, 8, 6).is_err());
        // Length mismatch.
        assert!(codec.encode_vertex_buffer(&data, 7, 8).is_err());
    }

    #[test]
    fn test_vertex_encode_compresses_repetitive_data() {
        let codec = MeshoptCodec::new();
        // Highly repetitive data should encode smaller than raw.
        let data = vec![7u8; 12 * 256];
        let encoded = codec.encode_vertex_buffer(&data, 256, 12).unwrap();
        assert!(encoded.len() < data.len());
    }
}
