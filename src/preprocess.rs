use image::{imageops, imageops::FilterType, RgbImage};

use crate::errors::{FreshscanError, Result};

/// Decode uploaded bytes into an 8-bit RGB buffer.
///
/// Channel order is a correctness contract: the detector was trained on RGB
/// input, and silently swapping to BGR degrades accuracy without raising any
/// error. Everything downstream (tensor packing, rendering) assumes the
/// order produced here.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(FreshscanError::Decode {
            operation: "decode upload".to_string(),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "empty image payload",
            )),
        });
    }

    let img = image::load_from_memory(bytes).map_err(|e| FreshscanError::Decode {
        operation: "decode upload".to_string(),
        source: Box::new(e),
    })?;

    Ok(img.to_rgb8())
}

/// Downsample so the longer side equals `max_size`, preserving aspect ratio.
///
/// Images already within the bound pass through untouched — the bound exists
/// to cap per-request memory, never to upsample small inputs.
pub fn bound_dimensions(image: RgbImage, max_size: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let longer = width.max(height);
    if longer <= max_size {
        return image;
    }

    let scale = max_size as f64 / longer as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);
    imageops::resize(&image, new_width, new_height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;

    fn encode_png(image: &RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_rejects_empty_payload() {
        let err = decode_image(&[]).unwrap_err();
        assert!(matches!(err, FreshscanError::Decode { .. }));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"not an image at all").unwrap_err();
        assert!(matches!(err, FreshscanError::Decode { .. }));
    }

    #[test]
    fn test_decode_preserves_rgb_channel_order() {
        // A pure red image must come back as [255, 0, 0]; if it reads as
        // [0, 0, 255] the channel order contract is broken.
        let red = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
        let decoded = decode_image(&encode_png(&red)).unwrap();
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_bound_is_noop_within_limit() {
        let image = RgbImage::new(800, 600);
        let bounded = bound_dimensions(image, 1024);
        assert_eq!(bounded.dimensions(), (800, 600));
    }

    #[test]
    fn test_bound_is_noop_at_exact_limit() {
        let image = RgbImage::new(1024, 512);
        let bounded = bound_dimensions(image, 1024);
        assert_eq!(bounded.dimensions(), (1024, 512));
    }

    #[test]
    fn test_bound_shrinks_longer_side_to_limit() {
        let image = RgbImage::new(2048, 1024);
        let bounded = bound_dimensions(image, 1024);
        assert_eq!(bounded.dimensions(), (1024, 512));
    }

    #[test]
    fn test_bound_preserves_aspect_ratio_within_rounding() {
        let image = RgbImage::new(3000, 1300);
        let bounded = bound_dimensions(image, 1024);
        let (w, h) = bounded.dimensions();
        assert_eq!(w, 1024);

        let original_ratio = 3000.0 / 1300.0;
        let bounded_ratio = w as f64 / h as f64;
        assert!((original_ratio - bounded_ratio).abs() < 0.01);
    }

    #[test]
    fn test_bound_handles_tall_images() {
        let image = RgbImage::new(500, 4000);
        let bounded = bound_dimensions(image, 1024);
        let (w, h) = bounded.dimensions();
        assert_eq!(h, 1024);
        assert_eq!(w, 128);
    }

    #[test]
    fn test_bound_never_upsamples() {
        let image = RgbImage::new(10, 10);
        let bounded = bound_dimensions(image, 1024);
        assert_eq!(bounded.dimensions(), (10, 10));
    }
}
