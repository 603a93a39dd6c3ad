//! Screenshot preparation for the vision model.
//!
//! Pure transformation: decode the raw capture, downscale so the longer
//! edge fits the configured cap (never upsampling), re-encode as JPEG at
//! a fixed quality, and base64 the result. Same input and configuration
//! always produce byte-identical output.

use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to decode screenshot: {0}")]
    Decode(String),

    #[error("failed to re-encode screenshot: {0}")]
    Encode(String),
}

/// Compact, text-safe representation of one screenshot. Consumed once by
/// the decision engine and never persisted.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Base64 of the JPEG bytes, ready for a data URL or an image block.
    pub base64: String,
    pub width: u32,
    pub height: u32,
}

impl EncodedFrame {
    pub fn media_type(&self) -> &'static str {
        "image/jpeg"
    }

    pub fn data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.base64)
    }
}

/// Downscale and re-encode a raw screenshot.
///
/// `max_edge` caps the longer edge; aspect ratio is preserved and images
/// already within the cap pass through at their original size.
pub fn encode_frame(raw: &[u8], max_edge: u32, quality: u8) -> Result<EncodedFrame, FrameError> {
    let decoded =
        image::load_from_memory(raw).map_err(|err| FrameError::Decode(err.to_string()))?;

    let (width, height) = (decoded.width(), decoded.height());
    let resized = if width.max(height) > max_edge {
        decoded.resize(max_edge, max_edge, FilterType::Lanczos3)
    } else {
        decoded
    };

    // JPEG has no alpha channel; flatten whatever the capture produced.
    let rgb = resized.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&rgb)
        .map_err(|err| FrameError::Encode(err.to_string()))?;

    Ok(EncodedFrame {
        base64: Base64.encode(&jpeg),
        width: rgb.width(),
        height: rgb.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};

    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let mut img = RgbaImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, 255]);
        }
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut out),
                image::ImageOutputFormat::Png,
            )
            .expect("encode fixture");
        out
    }

    #[test]
    fn small_images_are_never_upsampled() {
        let raw = png_fixture(320, 200);
        let frame = encode_frame(&raw, 1024, 85).unwrap();
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 200);
    }

    #[test]
    fn longer_edge_is_capped_preserving_aspect() {
        let raw = png_fixture(2048, 1024);
        let frame = encode_frame(&raw, 1024, 85).unwrap();
        assert_eq!(frame.width, 1024);
        assert_eq!(frame.height, 512);

        let raw = png_fixture(500, 2000);
        let frame = encode_frame(&raw, 1024, 85).unwrap();
        assert_eq!(frame.height, 1024);
        assert_eq!(frame.width, 256);
    }

    #[test]
    fn encoding_is_deterministic() {
        let raw = png_fixture(640, 480);
        let first = encode_frame(&raw, 1024, 85).unwrap();
        let second = encode_frame(&raw, 1024, 85).unwrap();
        assert_eq!(first.base64, second.base64);
    }

    #[test]
    fn garbage_input_is_a_decode_error() {
        let err = encode_frame(b"not an image", 1024, 85).unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }

    #[test]
    fn data_url_carries_jpeg_media_type() {
        let raw = png_fixture(64, 64);
        let frame = encode_frame(&raw, 1024, 85).unwrap();
        assert!(frame.data_url().starts_with("data:image/jpeg;base64,"));
    }
}
