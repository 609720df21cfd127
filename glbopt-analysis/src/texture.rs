//! Texture-space importance analysis.
//!
//! A per-image importance map combines Sobel edge magnitude (weight 0.6)
//! with local 5x5 variance (weight 0.4). Per-vertex scores sample every
//! bound map at the vertex UV, weight by texture role, and normalize by the
//! maximum across the primitive.

use glbopt_core::DecodedImage;

const EDGE_WEIGHT: f32 = 0.6;
const VARIANCE_WEIGHT: f32 = 0.4;

/// Material slot an image is bound to; fixes the sampling weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureRole {
    BaseColor,
    Normal,
    MetallicRoughness,
    Occlusion,
    Emissive,
}

impl TextureRole {
    pub fn weight(&self) -> f32 {
        match self {
            TextureRole::BaseColor => 1.0,
            TextureRole::Normal => 2.0,
            TextureRole::MetallicRoughness => 0.5,
            TextureRole::Occlusion => 0.3,
            TextureRole::Emissive => 0.5,
        }
    }
}

/// Dense per-pixel importance in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ImageImportanceMap {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
}

impl ImageImportanceMap {
    /// Bilinear sample at `(u, v)`; coordinates wrap into `[0, 1)`.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 0.0;
        }
        let u = wrap_unit(u);
        let v = wrap_unit(v);
        let fx = u * (self.width - 1) as f32;
        let fy = v * (self.height - 1) as f32;
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let at = |x: usize, y: usize| self.values[y * self.width + x];
        let top = at(x0, y0) * (1.0 - tx) + at(x1, y0) * tx;
        let bottom = at(x0, y1) * (1.0 - tx) + at(x1, y1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}

fn wrap_unit(x: f32) -> f32 {
    let w = x - x.floor();
    if w >= 1.0 {
        0.0
    } else {
        w
    }
}

/// Per-pixel luminance in `[0, 1]` from RGBA8.
pub fn luminance(image: &DecodedImage) -> Vec<f32> {
    image
        .rgba
        .chunks_exact(4)
        .map(|px| {
            (0.2126 * px[0] as f32 + 0.7152 * px[1] as f32 + 0.0722 * px[2] as f32) / 255.0
        })
        .collect()
}

/// Build the importance map of one image.
pub fn build_image_map(image: &DecodedImage) -> ImageImportanceMap {
    let width = image.width as usize;
    let height = image.height as usize;
    let luma = luminance(image);

    let edges = sobel_magnitude(&luma, width, height);
    let variance = local_variance(&luma, width, height);

    let values = edges
        .iter()
        .zip(variance.iter())
        .map(|(&e, &v)| {
            (EDGE_WEIGHT * e.clamp(0.0, 1.0) + VARIANCE_WEIGHT * v.clamp(0.0, 1.0)).clamp(0.0, 1.0)
        })
        .collect();

    ImageImportanceMap {
        width,
        height,
        values,
    }
}

/// 3x3 Sobel magnitude, scaled so a full black/white step maps to 1.
pub fn sobel_magnitude(luma: &[f32], width: usize, height: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; width * height];
    if width < 3 || height < 3 {
        return out;
    }
    let at = |x: usize, y: usize| luma[y * width + x];
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = -at(x - 1, y - 1) + at(x + 1, y - 1) - 2.0 * at(x - 1, y)
                + 2.0 * at(x + 1, y)
                - at(x - 1, y + 1)
                + at(x + 1, y + 1);
            let gy = -at(x - 1, y - 1) - 2.0 * at(x, y - 1) - at(x + 1, y - 1)
                + at(x - 1, y + 1)
                + 2.0 * at(x, y + 1)
                + at(x + 1, y + 1);
            out[y * width + x] = (gx * gx + gy * gy).sqrt() / 4.0;
        }
    }
    out
}

/// Local 5x5 variance of luminance, scaled into roughly `[0, 1]`.
fn local_variance(luma: &[f32], width: usize, height: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; width * height];
    if width == 0 || height == 0 {
        return out;
    }
    const R: isize = 2;
    for y in 0..height as isize {
        for x in 0..width as isize {
            let mut sum = 0.0f32;
            let mut sum_sq = 0.0f32;
            let mut n = 0.0f32;
            for dy in -R..=R {
                for dx in -R..=R {
                    let sx = x + dx;
                    let sy = y + dy;
                    if sx < 0 || sy < 0 || sx >= width as isize || sy >= height as isize {
                        continue;
                    }
                    let v = luma[sy as usize * width + sx as usize];
                    sum += v;
                    sum_sq += v * v;
                    n += 1.0;
                }
            }
            let mean = sum / n;
            let var = (sum_sq / n - mean * mean).max(0.0);
            // Max variance of a [0,1] signal is 0.25.
            out[y as usize * width + x as usize] = var * 4.0;
        }
    }
    out
}

/// Per-vertex texture-space importance.
///
/// `maps` pairs each bound image map with its role weight. Returns `None`
/// when no maps are bound; scores are normalized to `[0, 1]` by the maximum
/// over the primitive.
pub fn texture_importance(
    uvs: &[f32],
    vertex_count: usize,
    maps: &[(TextureRole, &ImageImportanceMap)],
) -> Option<Vec<f32>> {
    if maps.is_empty() || uvs.len() < vertex_count * 2 {
        return None;
    }
    let total_weight: f32 = maps.iter().map(|(role, _)| role.weight()).sum();
    if total_weight <= 0.0 {
        return None;
    }

    let mut scores = Vec::with_capacity(vertex_count);
    for v in 0..vertex_count {
        let u = uvs[v * 2];
        let w = uvs[v * 2 + 1];
        let mut sum = 0.0f32;
        for (role, map) in maps {
            sum += role.weight() * map.sample(u, w);
        }
        scores.push(sum / total_weight);
    }

    let max = scores.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        for s in &mut scores {
            *s /= max;
        }
    }
    Some(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_image(size: u32, value: u8) -> DecodedImage {
        DecodedImage {
            width: size,
            height: size,
            rgba: (0..size * size).flat_map(|_| [value, value, value, 255]).collect(),
        }
    }

    /// Left half black, right half white.
    fn split_image(size: u32) -> DecodedImage {
        let mut rgba = Vec::new();
        for _y in 0..size {
            for x in 0..size {
                let v = if x < size / 2 { 0 } else { 255 };
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        DecodedImage {
            width: size,
            height: size,
            rgba,
        }
    }

    #[test]
    fn test_flat_image_has_no_importance() {
        let map = build_image_map(&flat_image(16, 128));
        assert!(map.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_edge_has_importance() {
        let size = 16;
        let map = build_image_map(&split_image(size));
        let mid = size as usize / 2;
        // Pixels at the black/white boundary score high.
        let on_edge = map.values[8 * size as usize + mid];
        let far = map.values[8 * size as usize + 1];
        assert!(on_edge > 0.3, "edge importance {on_edge}");
        assert!(on_edge > far);
    }

    #[test]
    fn test_sample_wraps_uv() {
        let map = build_image_map(&split_image(16));
        let inside = map.sample(0.75, 0.5);
        let wrapped = map.sample(1.75, 0.5);
        assert!((inside - wrapped).abs() < 1e-6);
        let negative = map.sample(-0.25, 0.5);
        assert!((inside - negative).abs() < 1e-6);
    }

    #[test]
    fn test_vertex_scores_normalized() {
        let map = build_image_map(&split_image(32));
        // One vertex on the edge, one in flat black.
        let uvs = [0.5f32, 0.5, 0.1, 0.5];
        let scores =
            texture_importance(&uvs, 2, &[(TextureRole::BaseColor, &map)]).unwrap();
        assert_eq!(scores.len(), 2);
        assert!((scores[0] - 1.0).abs() < 1e-6);
        assert!(scores[1] < scores[0]);
    }

    #[test]
    fn test_no_maps_yields_none() {
        assert!(texture_importance(&[0.0, 0.0], 1, &[]).is_none());
    }

    #[test]
    fn test_role_weights() {
        assert_eq!(TextureRole::Normal.weight(), 2.0);
        assert_eq!(TextureRole::Occlusion.weight(), 0.3);
    }
}
