//! Default `ImageCodec` backed by the `image` crate.

use std::io::Cursor;

use glbopt_core::{DecodedImage, Error, ImageCodec, ResizedImage, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

/// JPEG re-encode quality used by `resize` (the contract requires >= 0.9).
const JPEG_QUALITY: u8 = 92;

/// PNG/JPEG decode, resample and re-encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterImageCodec;

impl RasterImageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for RasterImageCodec {
    fn decode(&self, bytes: &[u8], _mime: &str) -> Result<DecodedImage> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| Error::InvalidData(format!("image decode failed: {e}")))?;
        let rgba = img.to_rgba8();
        Ok(DecodedImage {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }

    fn resize(&self, bytes: &[u8], mime: &str, scale: f32) -> Result<ResizedImage> {
        if !(scale > 0.0 && scale < 1.0) {
            return Err(Error::InvalidData(format!(
                "resize scale {scale} outside (0, 1)"
            )));
        }
        let img = image::load_from_memory(bytes)
            .map_err(|e| Error::InvalidData(format!("image decode failed: {e}")))?;
        let width = ((img.width() as f32 * scale).round() as u32).max(1);
        let height = ((img.height() as f32 * scale).round() as u32).max(1);

        let mut out = Vec::new();
        match mime {
            "image/png" => {
                let resized = image::imageops::resize(
                    &img.to_rgba8(),
                    width,
                    height,
                    image::imageops::FilterType::Lanczos3,
                );
                PngEncoder::new(Cursor::new(&mut out))
                    .write_image(&resized, width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| Error::InvalidData(format!("png encode failed: {e}")))?;
            }
            "image/jpeg" => {
                let resized = image::imageops::resize(
                    &img.to_rgb8(),
                    width,
                    height,
                    image::imageops::FilterType::Lanczos3,
                );
                JpegEncoder::new_with_quality(Cursor::new(&mut out), JPEG_QUALITY)
                    .write_image(&resized, width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| Error::InvalidData(format!("jpeg encode failed: {e}")))?;
            }
            other => {
                return Err(Error::InvalidData(format!(
                    "unsupported mime type for resize: {other}"
                )))
            }
        }

        Ok(ResizedImage {
            bytes: out,
            width,
            height,
        })
    }

    fn dimensions(&self, bytes: &[u8], _mime: &str) -> Result<(u32, u32)> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| Error::InvalidData(format!("image decode failed: {e}")))?;
        Ok((img.width(), img.height()))
    }
}
