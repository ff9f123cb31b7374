use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::error::{CoreError, Result};

/// Decode/resize/encode, isolated behind a trait so consumers don't depend
/// on `image`/`webp` directly and a fixture-backed fake can stand in for
/// tests that don't want to round-trip real bytes.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage>;
    /// Scales `img` to fit within `max_w`x`max_h`, preserving aspect ratio.
    /// Never upscales past the original size and never crops: the full
    /// source always maps to the full destination.
    fn resize_to_fit(&self, img: &DynamicImage, max_w: u32, max_h: u32) -> DynamicImage;
    fn encode_webp(&self, img: &DynamicImage, quality: u8) -> Result<Vec<u8>>;
}

/// `image` + `webp`-backed [`ImageCodec`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardImageCodec;

impl ImageCodec for StandardImageCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| CoreError::UnsupportedImage(e.to_string()))
    }

    fn resize_to_fit(&self, img: &DynamicImage, max_w: u32, max_h: u32) -> DynamicImage {
        let (w, h) = img.dimensions();
        if w <= max_w && h <= max_h {
            return img.clone();
        }
        let scale = f64::min(max_w as f64 / w as f64, max_h as f64 / h as f64);
        let target_w = ((w as f64) * scale).round().max(1.0) as u32;
        let target_h = ((h as f64) * scale).round().max(1.0) as u32;
        img.resize_exact(target_w, target_h, FilterType::CatmullRom)
    }

    fn encode_webp(&self, img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        let encoder = webp::Encoder::from_rgba(&rgba, w, h);
        let encoded = encoder.encode(quality as f32);
        Ok(encoded.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn resize_to_fit_preserves_aspect_ratio_without_cropping() {
        let codec = StandardImageCodec;
        let img = solid_image(400, 200);
        let resized = codec.resize_to_fit(&img, 100, 100);
        let (w, h) = resized.dimensions();
        assert_eq!(w, 100);
        assert_eq!(h, 50);
    }

    #[test]
    fn resize_to_fit_leaves_images_already_within_bounds_untouched() {
        let codec = StandardImageCodec;
        let img = solid_image(50, 50);
        let resized = codec.resize_to_fit(&img, 100, 100);
        assert_eq!(resized.dimensions(), (50, 50));
    }

    #[test]
    fn encode_webp_round_trips_through_decode() {
        let codec = StandardImageCodec;
        let img = solid_image(16, 16);
        let bytes = codec.encode_webp(&img, 80).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));
    }
}
