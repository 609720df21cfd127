//! View-space importance analysis.
//!
//! Renders the normalized scene from 12 canonical viewpoints into a shaded
//! luminance target and a triangle-id target, then accumulates Sobel edge
//! magnitude per triangle weighted by visibility. Triangle ids are assigned
//! contiguously in primitive order; results are partitioned back per
//! primitive and projected to vertices by averaging incident triangles.

use glbopt_core::{CancelToken, DecodedImage, Result};
use nalgebra::Vector3;

use crate::texture::{luminance, sobel_magnitude};

/// Default framebuffer edge length.
pub const VIEW_RESOLUTION: usize = 512;

/// Shade used for untextured surfaces.
const BASE_SHADE: f32 = 0.8;

/// One primitive's geometry as seen by the rasterizer.
#[derive(Debug, Clone, Copy)]
pub struct ViewPrimitive<'a> {
    /// Three components per vertex.
    pub positions: &'a [f32],
    /// Two components per vertex, used to sample `base_color`.
    pub uvs: Option<&'a [f32]>,
    /// Triangle-list indices.
    pub indices: &'a [u32],
    /// Base-color image for textured shading.
    pub base_color: Option<&'a DecodedImage>,
}

/// The 12 canonical directions: 6 axial plus 6 edge diagonals.
fn view_directions() -> Vec<Vector3<f32>> {
    let raw: [[f32; 3]; 12] = [
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
        [1.0, 1.0, 0.0],
        [-1.0, -1.0, 0.0],
        [1.0, 0.0, 1.0],
        [-1.0, 0.0, -1.0],
        [0.0, 1.0, 1.0],
        [0.0, -1.0, -1.0],
    ];
    raw.iter()
        .map(|d| Vector3::new(d[0], d[1], d[2]).normalize())
        .collect()
}

struct Framebuffer {
    resolution: usize,
    depth: Vec<f32>,
    ids: Vec<u32>,
    shade: Vec<f32>,
}

impl Framebuffer {
    fn new(resolution: usize) -> Self {
        let n = resolution * resolution;
        Self {
            resolution,
            depth: vec![f32::INFINITY; n],
            ids: vec![0; n],
            shade: vec![0.0; n],
        }
    }

    fn clear(&mut self) {
        self.depth.fill(f32::INFINITY);
        self.ids.fill(0);
        self.shade.fill(0.0);
    }
}

/// Compute per-vertex view-space importance for each primitive.
///
/// Returns one score vector per input primitive, normalized to `[0, 1]`
/// within the primitive. The cancel token is checked once per view.
pub fn view_importance(
    prims: &[ViewPrimitive<'_>],
    resolution: usize,
    cancel: &CancelToken,
) -> Result<Vec<Vec<f32>>> {
    let resolution = resolution.max(8);
    let vertex_counts: Vec<usize> = prims.iter().map(|p| p.positions.len() / 3).collect();

    // Global triangle table, ids contiguous in primitive order.
    let mut tri_prims = Vec::new();
    for (pi, prim) in prims.iter().enumerate() {
        for tri in 0..prim.indices.len() / 3 {
            tri_prims.push((pi, tri));
        }
    }
    let total_tris = tri_prims.len();
    if total_tris == 0 {
        return Ok(vertex_counts.iter().map(|&n| vec![0.0; n]).collect());
    }

    // Normalize the scene into the unit cube centered at the origin.
    let mut min = Vector3::repeat(f32::INFINITY);
    let mut max = Vector3::repeat(f32::NEG_INFINITY);
    for prim in prims {
        for p in prim.positions.chunks_exact(3) {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }
    }
    let extent = max - min;
    let max_dim = extent.x.max(extent.y).max(extent.z);
    if !(max_dim > 0.0) || !max_dim.is_finite() {
        return Ok(vertex_counts.iter().map(|&n| vec![0.0; n]).collect());
    }
    let center = (min + max) * 0.5;
    let scale = 2.0 / max_dim;

    // Per-primitive base-color luminance, decoded once.
    let textures: Vec<Option<(Vec<f32>, usize, usize)>> = prims
        .iter()
        .map(|p| {
            p.base_color.map(|img| {
                (
                    luminance(img),
                    img.width as usize,
                    img.height as usize,
                )
            })
        })
        .collect();

    let mut importance = vec![0.0f64; total_tris];
    let mut visibility = vec![0u32; total_tris];
    let mut fb = Framebuffer::new(resolution);
    log::debug!("view importance: {total_tris} triangles at {resolution}x{resolution}");

    for dir in view_directions() {
        cancel.check()?;
        fb.clear();

        let forward = dir;
        let up_hint = if forward.y.abs() < 0.9 {
            Vector3::new(0.0, 1.0, 0.0)
        } else {
            Vector3::new(1.0, 0.0, 0.0)
        };
        let right = up_hint.cross(&forward).normalize();
        let up = forward.cross(&right);

        let mut global_id = 0u32;
        for (pi, prim) in prims.iter().enumerate() {
            let tex = textures[pi].as_ref();
            for tri in prim.indices.chunks_exact(3) {
                global_id += 1;
                if tri
                    .iter()
                    .any(|&v| v as usize * 3 + 3 > prim.positions.len())
                {
                    continue;
                }
                rasterize_triangle(
                    &mut fb, prim, tex, tri, global_id, &center, scale, &right, &up, &forward,
                );
            }
        }

        // Edge magnitude on the shaded target, attributed through the id
        // target. Accumulation is commutative across views.
        let edges = sobel_magnitude(&fb.shade, resolution, resolution);
        for (px, &id) in fb.ids.iter().enumerate() {
            if id > 0 {
                importance[(id - 1) as usize] += edges[px] as f64;
                visibility[(id - 1) as usize] += 1;
            }
        }
    }

    // Visibility-weighted triangle scores.
    let tri_scores: Vec<f32> = importance
        .iter()
        .zip(visibility.iter())
        .map(|(&imp, &vis)| if vis > 0 { (imp / vis as f64) as f32 } else { 0.0 })
        .collect();

    // Partition per primitive, normalize, project to vertices.
    let mut out = Vec::with_capacity(prims.len());
    let mut cursor = 0usize;
    for (pi, prim) in prims.iter().enumerate() {
        let tri_count = prim.indices.len() / 3;
        let slice = &tri_scores[cursor..cursor + tri_count];
        cursor += tri_count;

        let max_score = slice.iter().cloned().fold(0.0f32, f32::max);
        let vertex_count = vertex_counts[pi];
        let mut sums = vec![0.0f32; vertex_count];
        let mut counts = vec![0u32; vertex_count];
        for (tri, chunk) in prim.indices.chunks_exact(3).enumerate() {
            let score = if max_score > 0.0 {
                slice[tri] / max_score
            } else {
                0.0
            };
            for &v in chunk {
                let v = v as usize;
                if v < vertex_count {
                    sums[v] += score;
                    counts[v] += 1;
                }
            }
        }
        let scores = sums
            .iter()
            .zip(counts.iter())
            .map(|(&s, &c)| if c > 0 { s / c as f32 } else { 0.0 })
            .collect();
        out.push(scores);
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn rasterize_triangle(
    fb: &mut Framebuffer,
    prim: &ViewPrimitive<'_>,
    tex: Option<&(Vec<f32>, usize, usize)>,
    tri: &[u32],
    id: u32,
    center: &Vector3<f32>,
    scale: f32,
    right: &Vector3<f32>,
    up: &Vector3<f32>,
    forward: &Vector3<f32>,
) {
    let res = fb.resolution;
    let fetch = |v: u32| {
        let i = v as usize * 3;
        let p = Vector3::new(
            prim.positions[i],
            prim.positions[i + 1],
            prim.positions[i + 2],
        );
        (p - center) * scale
    };
    let p0 = fetch(tri[0]);
    let p1 = fetch(tri[1]);
    let p2 = fetch(tri[2]);

    // Lambert shade off the face normal; light comes from the camera.
    let normal = (p1 - p0).cross(&(p2 - p0));
    let len = normal.norm();
    if !(len > 0.0) {
        return;
    }
    let lambert = (normal / len).dot(forward).abs();

    // Orthographic projection with a small margin around the unit cube.
    let project = |p: &Vector3<f32>| {
        let x = p.dot(right);
        let y = p.dot(up);
        let z = p.dot(forward);
        (
            (x + 1.1) / 2.2 * (res - 1) as f32,
            (y + 1.1) / 2.2 * (res - 1) as f32,
            z,
        )
    };
    let (x0, y0, z0) = project(&p0);
    let (x1, y1, z1) = project(&p1);
    let (x2, y2, z2) = project(&p2);

    let area = (x1 - x0) * (y2 - y0) - (y1 - y0) * (x2 - x0);
    if area.abs() < 1e-8 {
        return;
    }

    let min_x = x0.min(x1).min(x2).floor().max(0.0) as usize;
    let max_x = (x0.max(x1).max(x2).ceil() as usize).min(res - 1);
    let min_y = y0.min(y1).min(y2).floor().max(0.0) as usize;
    let max_y = (y0.max(y1).max(y2).ceil() as usize).min(res - 1);

    for py in min_y..=max_y {
        for px in min_x..=max_x {
            let cx = px as f32 + 0.5;
            let cy = py as f32 + 0.5;
            let w0 = ((x1 - cx) * (y2 - cy) - (y1 - cy) * (x2 - cx)) / area;
            let w1 = ((x2 - cx) * (y0 - cy) - (y2 - cy) * (x0 - cx)) / area;
            let w2 = 1.0 - w0 - w1;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let depth = w0 * z0 + w1 * z1 + w2 * z2;
            let idx = py * res + px;
            if depth >= fb.depth[idx] {
                continue;
            }

            let tex_luma = match (tex, prim.uvs) {
                (Some((luma, w, h)), Some(uvs)) => {
                    let uv = |v: u32, c: usize| uvs[v as usize * 2 + c];
                    let u = w0 * uv(tri[0], 0) + w1 * uv(tri[1], 0) + w2 * uv(tri[2], 0);
                    let vv = w0 * uv(tri[0], 1) + w1 * uv(tri[1], 1) + w2 * uv(tri[2], 1);
                    sample_luma(luma, *w, *h, u, vv)
                }
                _ => BASE_SHADE,
            };

            fb.depth[idx] = depth;
            fb.ids[idx] = id;
            fb.shade[idx] = lambert * tex_luma;
        }
    }
}

/// Nearest-pixel luminance sample with UV wrapping.
fn sample_luma(luma: &[f32], width: usize, height: usize, u: f32, v: f32) -> f32 {
    if width == 0 || height == 0 {
        return BASE_SHADE;
    }
    let wrap = |x: f32| x - x.floor();
    let px = ((wrap(u) * width as f32) as usize).min(width - 1);
    let py = ((wrap(v) * height as f32) as usize).min(height - 1);
    luma[py * width + px]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A unit quad in the XY plane, two triangles.
    fn quad() -> (Vec<f32>, Vec<u32>) {
        (
            vec![
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                1.0, 1.0, 0.0, //
                0.0, 1.0, 0.0,
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn test_twelve_views_are_unit() {
        let dirs = view_directions();
        assert_eq!(dirs.len(), 12);
        for d in dirs {
            assert!((d.norm() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_quad_scores_in_unit_range() {
        let (positions, indices) = quad();
        let prim = ViewPrimitive {
            positions: &positions,
            uvs: None,
            indices: &indices,
            base_color: None,
        };
        let scores = view_importance(&[prim], 64, &CancelToken::new()).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].len(), 4);
        for &s in &scores[0] {
            assert!((0.0..=1.0).contains(&s), "score {s} out of range");
        }
    }

    #[test]
    fn test_empty_scene() {
        let positions: Vec<f32> = vec![0.0, 0.0, 0.0];
        let indices: Vec<u32> = vec![];
        let prim = ViewPrimitive {
            positions: &positions,
            uvs: None,
            indices: &indices,
            base_color: None,
        };
        let scores = view_importance(&[prim], 32, &CancelToken::new()).unwrap();
        assert_eq!(scores[0], vec![0.0]);
    }

    #[test]
    fn test_cancel_propagates() {
        let (positions, indices) = quad();
        let prim = ViewPrimitive {
            positions: &positions,
            uvs: None,
            indices: &indices,
            base_color: None,
        };
        let token = CancelToken::new();
        token.cancel();
        assert!(view_importance(&[prim], 32, &token).is_err());
    }

    #[test]
    fn test_partition_per_primitive() {
        let (positions, indices) = quad();
        let a = ViewPrimitive {
            positions: &positions,
            uvs: None,
            indices: &indices,
            base_color: None,
        };
        let shifted: Vec<f32> = positions
            .iter()
            .enumerate()
            .map(|(i, &v)| if i % 3 == 2 { v + 2.0 } else { v })
            .collect();
        let b = ViewPrimitive {
            positions: &shifted,
            uvs: None,
            indices: &indices,
            base_color: None,
        };
        let scores = view_importance(&[a, b], 64, &CancelToken::new()).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].len(), 4);
        assert_eq!(scores[1].len(), 4);
    }
}
