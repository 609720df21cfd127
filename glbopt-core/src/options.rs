//! Optimization options and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Position quantization precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionBits {
    Bits8,
    Bits16,
}

impl PositionBits {
    /// Largest representable magnitude for the chosen width.
    pub fn max_value(&self) -> i32 {
        match self {
            PositionBits::Bits8 => 127,
            PositionBits::Bits16 => 32767,
        }
    }
}

/// Options recognized by `optimize`.
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    pub deduplicate_vertices: bool,
    pub optimize_vertex_cache: bool,
    pub quantize_positions: bool,
    pub position_bits: PositionBits,
    pub quantize_normals: bool,
    pub quantize_uvs: bool,
    pub quantize_tangents: bool,
    pub meshopt_compression: bool,
    /// Enable texture- and view-space importance analysis.
    pub texture_aware: bool,
    /// Lock threshold T for importance-protected vertices, in `[0, 1]`.
    pub importance_threshold: f32,
    /// Simplifier error threshold in normalized parameter space.
    pub lod_error_threshold: f32,
    /// Uniform image down-scale factor in `(0, 1]`; 1.0 leaves images alone.
    pub texture_scale: f32,
    /// Reduction ratios, each in `(0, 1]`. Ratio 1.0 skips simplification.
    pub lod_levels: Vec<f32>,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            deduplicate_vertices: true,
            optimize_vertex_cache: true,
            quantize_positions: true,
            position_bits: PositionBits::Bits16,
            quantize_normals: true,
            quantize_uvs: true,
            quantize_tangents: true,
            meshopt_compression: true,
            texture_aware: false,
            importance_threshold: 0.5,
            lod_error_threshold: 0.02,
            texture_scale: 1.0,
            lod_levels: vec![1.0, 0.9, 0.8, 0.7, 0.5, 0.25],
        }
    }
}

impl OptimizeOptions {
    /// Reject out-of-range knobs before the pipeline starts.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.importance_threshold) {
            return Err(Error::InvalidData(
                "importance_threshold must be in [0, 1]".to_string(),
            ));
        }
        if self.lod_error_threshold < 0.0 {
            return Err(Error::InvalidData(
                "lod_error_threshold must be non-negative".to_string(),
            ));
        }
        if !(self.texture_scale > 0.0 && self.texture_scale <= 1.0) {
            return Err(Error::InvalidData(
                "texture_scale must be in (0, 1]".to_string(),
            ));
        }
        if self.lod_levels.is_empty() {
            return Err(Error::InvalidData(
                "lod_levels must not be empty".to_string(),
            ));
        }
        for &r in &self.lod_levels {
            if !(r > 0.0 && r <= 1.0) {
                return Err(Error::InvalidData(format!(
                    "lod level {} outside (0, 1]",
                    r
                )));
            }
        }
        Ok(())
    }
}

/// Caller-scoped cancellation token, checked at stage boundaries.
///
/// Cloning shares the flag. Cancellation discards all partial results; no
/// output is ever written for a cancelled run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Error out of the current stage if the token is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let opts = OptimizeOptions::default();
        assert!(opts.deduplicate_vertices);
        assert!(opts.optimize_vertex_cache);
        assert_eq!(opts.position_bits.max_value(), 32767);
        assert!(!opts.texture_aware);
        assert_eq!(opts.importance_threshold, 0.5);
        assert_eq!(opts.lod_levels, vec![1.0, 0.9, 0.8, 0.7, 0.5, 0.25]);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_knobs() {
        let mut opts = OptimizeOptions::default();
        opts.importance_threshold = 1.5;
        assert!(opts.validate().is_err());

        let mut opts = OptimizeOptions::default();
        opts.lod_levels = vec![0.0];
        assert!(opts.validate().is_err());

        let mut opts = OptimizeOptions::default();
        opts.texture_scale = 0.0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        let shared = token.clone();
        shared.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }
}
