//! GLB container framing.
//!
//! Splits a glTF-Binary file into its JSON and BIN chunks and assembles the
//! two back into a spec-conformant container. Everything is little-endian;
//! chunk payloads are padded to 4-byte boundaries (JSON with ASCII space,
//! BIN with zero bytes).

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use glbopt_core::{Error, Result};

/// `glTF` in little-endian.
pub const GLB_MAGIC: u32 = 0x4654_6C67;
pub const GLB_VERSION: u32 = 2;
/// `JSON` chunk type.
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
/// `BIN\0` chunk type.
pub const CHUNK_BIN: u32 = 0x004E_4942;

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// The two payloads of a GLB container.
#[derive(Debug, Clone)]
pub struct GlbChunks {
    pub json: Vec<u8>,
    pub bin: Option<Vec<u8>>,
}

/// Split a GLB byte stream into chunks, validating the header.
///
/// Unknown chunk types are skipped. A second JSON or BIN chunk is rejected
/// as invalid data.
pub fn split(data: &[u8]) -> Result<GlbChunks> {
    if data.len() < HEADER_LEN {
        return Err(Error::TruncatedChunk { offset: 0 });
    }
    let mut cursor = Cursor::new(data);
    let magic = cursor.read_u32::<LittleEndian>()?;
    if magic != GLB_MAGIC {
        return Err(Error::BadMagic(magic));
    }
    let version = cursor.read_u32::<LittleEndian>()?;
    if version != GLB_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let declared_length = cursor.read_u32::<LittleEndian>()? as usize;
    if declared_length > data.len() {
        return Err(Error::TruncatedChunk { offset: HEADER_LEN });
    }

    let mut offset = HEADER_LEN;
    let mut json: Option<Vec<u8>> = None;
    let mut bin: Option<Vec<u8>> = None;

    while offset + CHUNK_HEADER_LEN <= declared_length {
        let mut cursor = Cursor::new(&data[offset..]);
        let length = cursor.read_u32::<LittleEndian>()? as usize;
        let chunk_type = cursor.read_u32::<LittleEndian>()?;
        let payload_start = offset + CHUNK_HEADER_LEN;
        let payload_end = payload_start + length;
        if payload_end > data.len() {
            return Err(Error::TruncatedChunk { offset });
        }
        let payload = &data[payload_start..payload_end];

        match chunk_type {
            CHUNK_JSON => {
                if json.is_some() {
                    return Err(Error::InvalidData("duplicate JSON chunk".to_string()));
                }
                json = Some(payload.to_vec());
            }
            CHUNK_BIN => {
                if bin.is_some() {
                    return Err(Error::InvalidData("duplicate BIN chunk".to_string()));
                }
                bin = Some(payload.to_vec());
            }
            _ => {}
        }

        offset = payload_end;
        // Chunks start on 4-byte boundaries.
        offset = (offset + 3) & !3;
    }

    let json = json.ok_or(Error::MissingJsonChunk)?;
    Ok(GlbChunks { json, bin })
}

/// Assemble JSON and BIN payloads into a GLB byte stream.
///
/// The header length field covers the whole file including padding.
pub fn assemble(json: &[u8], bin: Option<&[u8]>) -> Vec<u8> {
    let json_padded = pad_len(json.len());
    let bin_padded = bin.map(|b| pad_len(b.len()));

    let total = HEADER_LEN
        + CHUNK_HEADER_LEN
        + json_padded
        + bin_padded.map_or(0, |b| CHUNK_HEADER_LEN + b);

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());

    out.extend_from_slice(&(json_padded as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(json);
    out.resize(out.len() + (json_padded - json.len()), b' ');

    if let Some(bin) = bin {
        let padded = pad_len(bin.len());
        out.extend_from_slice(&(padded as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(bin);
        out.resize(out.len() + (padded - bin.len()), 0u8);
    }

    debug_assert_eq!(out.len(), total);
    out
}

fn pad_len(len: usize) -> usize {
    (len + 3) & !3
}
