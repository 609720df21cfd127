//! UV-seam detection and vertex lock masks.
//!
//! Vertices that share a quantized position but differ in quantized UV sit
//! on a material seam; collapsing them tears the texture. Seam vertices get
//! a halved lock threshold.

use std::collections::HashMap;

/// Position quantized to 4 decimals, UV to 3.
const POS_QUANT: f32 = 1e4;
const UV_QUANT: f32 = 1e3;

fn pos_key(p: &[f32]) -> [i64; 3] {
    [
        (p[0] * POS_QUANT).round() as i64,
        (p[1] * POS_QUANT).round() as i64,
        (p[2] * POS_QUANT).round() as i64,
    ]
}

fn uv_key(uv: &[f32]) -> [i64; 2] {
    [
        (uv[0] * UV_QUANT).round() as i64,
        (uv[1] * UV_QUANT).round() as i64,
    ]
}

/// Mark vertices that share a position with a vertex carrying a different
/// UV.
pub fn detect_seams(positions: &[f32], uvs: &[f32], vertex_count: usize) -> Vec<bool> {
    let mut seams = vec![false; vertex_count];
    if positions.len() < vertex_count * 3 || uvs.len() < vertex_count * 2 {
        return seams;
    }

    let mut groups: HashMap<[i64; 3], Vec<usize>> = HashMap::new();
    for v in 0..vertex_count {
        groups
            .entry(pos_key(&positions[v * 3..v * 3 + 3]))
            .or_default()
            .push(v);
    }

    for group in groups.values() {
        if group.len() < 2 {
            continue;
        }
        let first = uv_key(&uvs[group[0] * 2..group[0] * 2 + 2]);
        let split = group
            .iter()
            .any(|&v| uv_key(&uvs[v * 2..v * 2 + 2]) != first);
        if split {
            for &v in group {
                seams[v] = true;
            }
        }
    }
    seams
}

/// Combine two optional importance vectors by elementwise maximum.
pub fn merge_importance(a: Option<Vec<f32>>, b: Option<Vec<f32>>) -> Option<Vec<f32>> {
    match (a, b) {
        (Some(mut a), Some(b)) => {
            for (x, y) in a.iter_mut().zip(b.iter()) {
                *x = x.max(*y);
            }
            Some(a)
        }
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Build the vertex lock mask.
///
/// `lock[v] = (seam(v) && score(v) > T/2) || (!seam(v) && score(v) > T)`.
pub fn vertex_locks(scores: &[f32], seams: &[bool], threshold: f32) -> Vec<bool> {
    scores
        .iter()
        .enumerate()
        .map(|(v, &s)| {
            let seam = seams.get(v).copied().unwrap_or(false);
            if seam {
                s > threshold * 0.5
            } else {
                s > threshold
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seam_detection() {
        // Vertices 0 and 1 share a position but differ in UV; vertex 2 is
        // alone.
        let positions = [
            0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0,
        ];
        let uvs = [
            0.0, 0.0, //
            0.5, 0.0, //
            0.0, 0.0,
        ];
        let seams = detect_seams(&positions, &uvs, 3);
        assert_eq!(seams, vec![true, true, false]);
    }

    #[test]
    fn test_duplicates_with_same_uv_are_not_seams() {
        let positions = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let uvs = [0.25, 0.25, 0.25, 0.25];
        let seams = detect_seams(&positions, &uvs, 2);
        assert_eq!(seams, vec![false, false]);
    }

    #[test]
    fn test_quantization_tolerance() {
        // Positions differing below 1e-4 still weld.
        let positions = [0.0, 0.0, 0.0, 0.000_04, 0.0, 0.0];
        let uvs = [0.0, 0.0, 0.9, 0.9];
        let seams = detect_seams(&positions, &uvs, 2);
        assert_eq!(seams, vec![true, true]);
    }

    #[test]
    fn test_merge_importance_elementwise_max() {
        let merged = merge_importance(Some(vec![0.2, 0.9]), Some(vec![0.5, 0.1])).unwrap();
        assert_eq!(merged, vec![0.5, 0.9]);
        assert_eq!(
            merge_importance(None, Some(vec![0.3])).unwrap(),
            vec![0.3]
        );
        assert!(merge_importance(None, None).is_none());
    }

    #[test]
    fn test_lock_rule() {
        let scores = [0.3, 0.3, 0.6, 0.6];
        let seams = [false, true, false, true];
        let locks = vertex_locks(&scores, &seams, 0.5);
        // 0.3 non-seam: below T. 0.3 seam: above T/2. 0.6 both: above.
        assert_eq!(locks, vec![false, true, true, true]);
    }
}
