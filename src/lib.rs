//! # glbopt
//!
//! A GLB (binary glTF) mesh optimizer for Rust.
//!
//! This is the umbrella crate that provides convenient access to all glbopt
//! functionality. You can use this crate to get everything in one place, or
//! use individual crates for more granular control over dependencies.
//!
//! ## Features
//!
//! - **Core**: document model, tagged attribute arrays, options and errors
//! - **Codec**: GLB container parsing and the rebuild-from-scratch writer
//! - **Analysis**: texture- and view-space importance, UV-seam detection
//! - **Pipeline**: dedupe, cache reorder, simplify, quantize, LOD chains
//!
//! ## Quick Start
//!
//! ```no_run
//! use glbopt::prelude::*;
//!
//! let bytes = std::fs::read("model.glb").unwrap();
//! let options = OptimizeOptions::default();
//! let (optimized, report) = optimize_to_glb(&bytes, &options).unwrap();
//! std::fs::write("model.opt.glb", optimized).unwrap();
//! println!("{}", report.summary());
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: enables codec, analysis and pipeline
//! - `codec`: GLB container codec
//! - `analysis`: importance analyzers and the raster image codec
//! - `pipeline`: the optimization pipeline (implies codec and analysis)

// Re-export core functionality
pub use glbopt_core::*;

// Re-export sub-crates
#[cfg(feature = "codec")]
pub use glbopt_codec as codec;

#[cfg(feature = "analysis")]
pub use glbopt_analysis as analysis;

#[cfg(feature = "pipeline")]
pub use glbopt_pipeline as pipeline;

#[cfg(feature = "pipeline")]
pub use glbopt_pipeline::{optimize, optimize_to_glb, optimize_with};

/// Convenient imports for common use cases
pub mod prelude {
    pub use glbopt_core::*;

    #[cfg(feature = "codec")]
    pub use glbopt_codec::{Asset, AssetStats, GlbWriter};

    #[cfg(feature = "analysis")]
    pub use glbopt_analysis::RasterImageCodec;

    #[cfg(feature = "pipeline")]
    pub use glbopt_pipeline::{
        optimize, optimize_to_glb, optimize_with, MeshBackend, MeshoptCodec, OptimizeContext,
        OptimizeOutput,
    };
}
