//! Vertex welding.
//!
//! Deduplicates vertices over their full per-vertex byte record, assigning
//! new slots in first-use order of the index stream. Vertices never
//! referenced by an index get no slot.

use std::collections::HashMap;

/// Sentinel for vertices that are dropped by the remap.
pub const UNUSED: u32 = u32::MAX;

/// Build a deduplication remap.
///
/// `vertex_bytes` holds `stride` bytes per vertex; two vertices weld only
/// when their records are byte-identical. Returns `remap[old] = new` (or
/// `UNUSED`) plus the unique vertex count. Assignment order follows the
/// index stream, so the result does not depend on hash iteration order.
pub fn compact(indices: &[u32], vertex_bytes: &[u8], stride: usize) -> (Vec<u32>, usize) {
    let vertex_count = if stride == 0 {
        0
    } else {
        vertex_bytes.len() / stride
    };
    let mut remap = vec![UNUSED; vertex_count];
    if vertex_count == 0 {
        return (remap, 0);
    }

    let mut seen: HashMap<&[u8], u32> = HashMap::with_capacity(vertex_count);
    let mut next = 0u32;
    for &index in indices {
        let v = index as usize;
        if v >= vertex_count || remap[v] != UNUSED {
            continue;
        }
        let key = &vertex_bytes[v * stride..(v + 1) * stride];
        let slot = *seen.entry(key).or_insert_with(|| {
            let slot = next;
            next += 1;
            slot
        });
        remap[v] = slot;
    }

    (remap, next as usize)
}

/// Rewrite an index stream through a compaction remap.
pub fn apply_remap(indices: &[u32], remap: &[u32]) -> Vec<u32> {
    indices
        .iter()
        .map(|&i| remap.get(i as usize).copied().unwrap_or(UNUSED))
        .collect()
}

/// Interleave per-vertex little-endian records from several attribute byte
/// arrays. `parts` pairs each attribute's bytes with its element size.
pub fn interleave(parts: &[(&[u8], usize)], vertex_count: usize) -> (Vec<u8>, usize) {
    let stride: usize = parts.iter().map(|(_, size)| size).sum();
    let mut out = vec![0u8; stride * vertex_count];
    for v in 0..vertex_count {
        let mut offset = v * stride;
        for (bytes, size) in parts {
            let start = v * size;
            if start + size <= bytes.len() {
                out[offset..offset + size].copy_from_slice(&bytes[start..start + size]);
            }
            offset += size;
        }
    }
    (out, stride)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_merges_identical_vertices() {
        // Six vertices, positions repeated twice: [A B C A B C]
        let mut bytes = Vec::new();
        for _ in 0..2 {
            for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
                for c in p {
                    bytes.extend_from_slice(&c.to_le_bytes());
                }
            }
        }
        let indices = [0u32, 1, 2, 3, 4, 5];
        let (remap, unique) = compact(&indices, &bytes, 12);
        assert_eq!(unique, 3);
        assert_eq!(remap, vec![0, 1, 2, 0, 1, 2]);

        let new_indices = apply_remap(&indices, &remap);
        assert_eq!(new_indices, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(*new_indices.iter().max().unwrap() as usize + 1, unique);
    }

    #[test]
    fn test_compact_first_use_order() {
        // Index stream starts at vertex 2, so vertex 2 gets slot 0.
        let bytes: Vec<u8> = (0..36).collect();
        let indices = [2u32, 1, 0];
        let (remap, unique) = compact(&indices, &bytes, 12);
        assert_eq!(unique, 3);
        assert_eq!(remap, vec![2, 1, 0]);
    }

    #[test]
    fn test_unreferenced_vertices_dropped() {
        let bytes: Vec<u8> = (0..48).collect();
        let indices = [0u32, 1, 3];
        let (remap, unique) = compact(&indices, &bytes, 12);
        assert_eq!(unique, 3);
        assert_eq!(remap[2], UNUSED);
    }

    #[test]
    fn test_different_attributes_do_not_weld() {
        // Same position, different second attribute byte.
        let mut bytes = vec![0u8; 26];
        bytes[12] = 7; // first vertex, extra byte differs
        let indices = [0u32, 1];
        let (_, unique) = compact(&indices, &bytes, 13);
        assert_eq!(unique, 2);
    }

    #[test]
    fn test_interleave() {
        let a = [1u8, 2, 3, 4]; // two vertices, 2 bytes each
        let b = [9u8, 8]; // two vertices, 1 byte each
        let (out, stride) = interleave(&[(&a, 2), (&b, 1)], 2);
        assert_eq!(stride, 3);
        assert_eq!(out, vec![1, 2, 9, 3, 4, 8]);
    }
}
