//! Vertex-cache triangle ordering.
//!
//! Triangles are reordered for post-transform cache reuse, then vertices
//! are renumbered in first-use order so fetches walk the vertex buffer
//! mostly forward.

use crate::weld::UNUSED;

/// Reorder `indices` in place for cache locality and return the vertex
/// remap (`remap[old] = new`, `UNUSED` for unreferenced vertices) plus the
/// referenced vertex count.
pub fn reorder(indices: &mut [u32], vertex_count: usize) -> (Vec<u32>, usize) {
    if !indices.is_empty() && indices.len() % 3 == 0 {
        meshopt::optimize_vertex_cache_in_place(indices, vertex_count);
    }

    // First-use renumbering over the reordered stream.
    let mut remap = vec![UNUSED; vertex_count];
    let mut next = 0u32;
    for index in indices.iter_mut() {
        let v = *index as usize;
        if v >= vertex_count {
            continue;
        }
        if remap[v] == UNUSED {
            remap[v] = next;
            next += 1;
        }
        *index = remap[v];
    }
    (remap, next as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_use_renumbering() {
        // After reordering, indices must count up from zero on first use.
        let mut indices = vec![5u32, 3, 1, 5, 1, 0];
        let (remap, unique) = reorder(&mut indices, 6);
        assert_eq!(unique, 4);

        let mut seen = 0u32;
        for &i in &indices {
            assert!(i <= seen, "index {i} introduced out of order");
            if i == seen {
                seen += 1;
            }
        }
        assert_eq!(*indices.iter().max().unwrap() as usize + 1, unique);
        // Unreferenced vertices keep no slot.
        assert_eq!(remap[2], UNUSED);
        assert_eq!(remap[4], UNUSED);
    }

    #[test]
    fn test_reorder_preserves_triangles() {
        let mut indices = vec![0u32, 1, 2, 2, 1, 3, 3, 1, 0];
        let before: Vec<[u32; 3]> = indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        let (remap, unique) = reorder(&mut indices, 4);
        assert_eq!(unique, 4);

        // Every original triangle must survive as a remapped triangle,
        // up to triangle order.
        let mut after: Vec<[u32; 3]> = indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        for tri in before {
            let mapped = [
                remap[tri[0] as usize],
                remap[tri[1] as usize],
                remap[tri[2] as usize],
            ];
            let pos = after
                .iter()
                .position(|t| {
                    // Same cycle, any rotation.
                    (0..3).any(|r| (0..3).all(|k| t[(r + k) % 3] == mapped[k]))
                })
                .unwrap_or_else(|| panic!("triangle {mapped:?} lost"));
            after.remove(pos);
        }
        assert!(after.is_empty());
    }

    #[test]
    fn test_empty_indices() {
        let mut indices: Vec<u32> = vec![];
        let (remap, unique) = reorder(&mut indices, 3);
        assert_eq!(unique, 0);
        assert!(remap.iter().all(|&r| r == UNUSED));
    }
}
