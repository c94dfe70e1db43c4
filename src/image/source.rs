//! Decoded input image.
//!
//! The pipeline only needs the image metadata, a grayscale float view for
//! gradient-based stages and encoded crops for the external verifier. The
//! pixel buffer itself stays private and is never mutated after decoding.

use super::ImageF32;
use crate::error::{Error, Result};
use crate::proposals::NormalizedBox;
use image::{DynamicImage, ImageOutputFormat};
use std::io::Cursor;
use std::sync::Arc;

/// Immutable decoded image shared between pipeline stages.
#[derive(Clone, Debug)]
pub struct SourceImage {
    width: u32,
    height: u32,
    pixels: Arc<DynamicImage>,
}

impl SourceImage {
    /// Decode raw bytes (PNG/JPEG) into a source image.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        Self::from_dynamic(img)
    }

    /// Wrap an already decoded image.
    pub fn from_dynamic(img: DynamicImage) -> Result<Self> {
        let (width, height) = (img.width(), img.height());
        if width == 0 || height == 0 {
            return Err(Error::EmptyImage { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels: Arc::new(img),
        })
    }

    /// Build from tightly packed 8-bit grayscale samples.
    pub fn from_luma8(width: u32, height: u32, gray: Vec<u8>) -> Result<Self> {
        let buffer = image::GrayImage::from_raw(width, height, gray)
            .ok_or(Error::EmptyImage { width, height })?;
        Self::from_dynamic(DynamicImage::ImageLuma8(buffer))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Normalized grayscale view in [0, 1].
    pub fn to_gray_f32(&self) -> ImageF32 {
        let luma = self.pixels.to_luma8();
        ImageF32::from_luma8(self.width as usize, self.height as usize, luma.as_raw())
    }

    /// Pixel rectangle `(x, y, w, h)` covered by a normalized box, clamped to
    /// the image and at least one pixel in each direction.
    pub fn pixel_rect(&self, bbox: &NormalizedBox) -> (u32, u32, u32, u32) {
        let clamp_x = |v: f32| ((v.clamp(0.0, 1.0)) * self.width as f32) as u32;
        let clamp_y = |v: f32| ((v.clamp(0.0, 1.0)) * self.height as f32) as u32;
        let x0 = clamp_x(bbox.x0).min(self.width - 1);
        let y0 = clamp_y(bbox.y0).min(self.height - 1);
        let x1 = (bbox.x1.clamp(0.0, 1.0) * self.width as f32).ceil() as u32;
        let y1 = (bbox.y1.clamp(0.0, 1.0) * self.height as f32).ceil() as u32;
        let w = x1.min(self.width).saturating_sub(x0).max(1);
        let h = y1.min(self.height).saturating_sub(y0).max(1);
        (x0, y0, w, h)
    }

    /// Encode the region covered by `bbox` as PNG bytes.
    pub fn crop_png(&self, bbox: &NormalizedBox) -> Result<Vec<u8>> {
        let (x, y, w, h) = self.pixel_rect(bbox);
        let crop = self.pixels.crop_imm(x, y, w, h);
        let mut out = Cursor::new(Vec::new());
        crop.write_to(&mut out, ImageOutputFormat::Png)?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_rect_clamps_to_image() {
        let img = SourceImage::from_luma8(100, 50, vec![0u8; 5000]).expect("image");
        let (x, y, w, h) = img.pixel_rect(&NormalizedBox::new(0.9, 0.5, 1.4, 1.0));
        assert_eq!((x, y), (90, 25));
        assert_eq!((w, h), (10, 25));
    }

    #[test]
    fn crop_png_round_trips_dimensions() {
        let img = SourceImage::from_luma8(64, 64, vec![128u8; 64 * 64]).expect("image");
        let png = img
            .crop_png(&NormalizedBox::new(0.25, 0.25, 0.75, 0.5))
            .expect("crop");
        let decoded = image::load_from_memory(&png).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
    }

    #[test]
    fn rejects_undecodable_bytes() {
        assert!(SourceImage::decode(b"not an image").is_err());
    }
}
