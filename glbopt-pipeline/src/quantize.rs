//! Attribute quantization.
//!
//! Pure numeric transforms from `f32` arrays to integer arrays plus
//! de-quantization metadata. Each quantizer round-trips to within
//! `1/max_value` of the input magnitude along each axis.

use glbopt_core::{AttributeData, DequantTransform, PositionBits, UvRemap};

/// Quantize positions to i16 or i8 around the per-axis bounding box center.
///
/// A flat axis (`min == max`) keeps scale 1 so de-quantization recovers the
/// exact constant.
pub fn quantize_positions(
    positions: &[f32],
    bits: PositionBits,
) -> (AttributeData, DequantTransform) {
    let max_value = bits.max_value() as f32;

    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for p in positions.chunks_exact(3) {
        for i in 0..3 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }
    if positions.is_empty() {
        min = [0.0; 3];
        max = [0.0; 3];
    }

    let mut center = [0.0f32; 3];
    let mut scale = [1.0f32; 3];
    for i in 0..3 {
        center[i] = (min[i] + max[i]) * 0.5;
        let range = max[i] - min[i];
        scale[i] = if range > 0.0 {
            range / (2.0 * max_value)
        } else {
            1.0
        };
    }

    let quantize = |p: f32, axis: usize| -> i32 {
        (((p - center[axis]) / scale[axis]).round()).clamp(-max_value, max_value) as i32
    };

    let data = match bits {
        PositionBits::Bits16 => {
            let mut out = Vec::with_capacity(positions.len());
            for p in positions.chunks_exact(3) {
                for (axis, &v) in p.iter().enumerate() {
                    out.push(quantize(v, axis) as i16);
                }
            }
            AttributeData::I16(out)
        }
        PositionBits::Bits8 => {
            let mut out = Vec::with_capacity(positions.len());
            for p in positions.chunks_exact(3) {
                for (axis, &v) in p.iter().enumerate() {
                    out.push(quantize(v, axis) as i8);
                }
            }
            AttributeData::I8(out)
        }
    };

    (
        data,
        DequantTransform {
            scale,
            translation: center,
        },
    )
}

/// Quantize unit normals to i8, `normalized = true` on the accessor.
pub fn quantize_normals(normals: &[f32]) -> AttributeData {
    let mut out = Vec::with_capacity(normals.len());
    for n in normals.chunks_exact(3) {
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        let (x, y, z) = if len > 0.0 && len.is_finite() {
            (n[0] / len, n[1] / len, n[2] / len)
        } else {
            (0.0, 0.0, 1.0)
        };
        out.push(quant_snorm8(x));
        out.push(quant_snorm8(y));
        out.push(quant_snorm8(z));
    }
    AttributeData::I8(out)
}

/// Quantize UVs to u16. In-range UVs map directly; out-of-range UVs are
/// offset/scaled into `[0, 1]` first, with the remap returned so callers
/// can compensate materials.
pub fn quantize_uvs(uvs: &[f32]) -> (AttributeData, Option<UvRemap>) {
    let in_range = uvs.iter().all(|&v| (0.0..=1.0).contains(&v));
    if in_range {
        let out = uvs
            .iter()
            .map(|&v| (v * 65535.0).round().clamp(0.0, 65535.0) as u16)
            .collect();
        return (AttributeData::U16(out), None);
    }

    let mut min = [f32::INFINITY; 2];
    let mut max = [f32::NEG_INFINITY; 2];
    for uv in uvs.chunks_exact(2) {
        for i in 0..2 {
            min[i] = min[i].min(uv[i]);
            max[i] = max[i].max(uv[i]);
        }
    }
    let mut scale = [1.0f32; 2];
    for i in 0..2 {
        let range = max[i] - min[i];
        scale[i] = if range > 0.0 { range } else { 1.0 };
    }

    let mut out = Vec::with_capacity(uvs.len());
    for uv in uvs.chunks_exact(2) {
        for i in 0..2 {
            let n = (uv[i] - min[i]) / scale[i];
            out.push((n * 65535.0).round().clamp(0.0, 65535.0) as u16);
        }
    }
    (
        AttributeData::U16(out),
        Some(UvRemap {
            offset: min,
            scale,
        }),
    )
}

/// Quantize tangents to i8 vec4. The sign of `w` (handedness) is preserved
/// exactly as +-127.
pub fn quantize_tangents(tangents: &[f32]) -> AttributeData {
    let mut out = Vec::with_capacity(tangents.len());
    for t in tangents.chunks_exact(4) {
        let len = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
        let (x, y, z) = if len > 0.0 && len.is_finite() {
            (t[0] / len, t[1] / len, t[2] / len)
        } else {
            (1.0, 0.0, 0.0)
        };
        out.push(quant_snorm8(x));
        out.push(quant_snorm8(y));
        out.push(quant_snorm8(z));
        out.push(if t[3] >= 0.0 { 127 } else { -127 });
    }
    AttributeData::I8(out)
}

fn quant_snorm8(v: f32) -> i8 {
    (v * 127.0).round().clamp(-127.0, 127.0) as i8
}
