//! Importance analysis for glbopt
//!
//! Two independent analyzers score vertices by visual salience: a
//! texture-space pass over the material images and a view-space pass that
//! renders the scene from canonical viewpoints with a triangle-id target.
//! Scores feed the simplifier's vertex lock mask; UV seams get a reduced
//! lock threshold.

pub mod image_codec;
pub mod seams;
pub mod texture;
pub mod view;

pub use image_codec::RasterImageCodec;
pub use seams::{detect_seams, merge_importance, vertex_locks};
pub use texture::{build_image_map, texture_importance, ImageImportanceMap, TextureRole};
pub use view::{view_importance, ViewPrimitive, VIEW_RESOLUTION};
