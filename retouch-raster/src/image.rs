//! Image codec helpers.
//!
//! Decoding to RGBA, PNG/JPEG encoding and `data:` URI building.

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use retouch_core::{Color, SaveFormat};

use crate::error::{RasterError, RasterResult};

/// JPEG quality used when saving.
pub const JPEG_QUALITY: u8 = 90;

/// Image formats recognized by content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// GIF.
    Gif,
    /// Windows bitmap.
    Bmp,
    /// WebP (alpha support).
    WebP,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Self::Gif;
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }
        if data.len() >= 14 && data.starts_with(b"BM") {
            return Self::Bmp;
        }
        Self::Unknown
    }

    /// MIME type, if known.
    #[must_use]
    pub const fn mime(self) -> Option<&'static str> {
        match self {
            Self::Png => Some("image/png"),
            Self::Jpeg => Some("image/jpeg"),
            Self::Gif => Some("image/gif"),
            Self::Bmp => Some("image/bmp"),
            Self::WebP => Some("image/webp"),
            Self::Unknown => None,
        }
    }
}

/// Decode any supported format into RGBA pixels.
///
/// # Errors
///
/// Returns an error if the image cannot be decoded.
pub fn decode_rgba(data: &[u8]) -> RasterResult<RgbaImage> {
    let img = image::load_from_memory(data).map_err(|e| RasterError::Decode(e.to_string()))?;
    Ok(img.to_rgba8())
}

/// Encode RGBA pixels as PNG.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_png(pixels: &RgbaImage) -> RasterResult<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            pixels.as_raw(),
            pixels.width(),
            pixels.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| RasterError::Encode(format!("PNG encoding failed: {e}")))?;
    Ok(buf)
}

/// Encode RGBA pixels as JPEG, flattening transparency onto `background`.
///
/// # Errors
///
/// Returns an error if encoding fails.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode_jpeg(pixels: &RgbaImage, quality: u8, background: Color) -> RasterResult<Vec<u8>> {
    let bg = [background.r, background.g, background.b];
    let mut rgb_data = Vec::with_capacity(pixels.as_raw().len() / 4 * 3);
    for pixel in pixels.pixels() {
        let alpha = f32::from(pixel[3]) / 255.0;
        let inv = 1.0 - alpha;
        for channel in 0..3 {
            let value = f32::from(pixel[channel]).mul_add(alpha, f32::from(bg[channel]) * inv);
            rgb_data.push(value.round().clamp(0.0, 255.0) as u8);
        }
    }

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(
            &rgb_data,
            pixels.width(),
            pixels.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| RasterError::Encode(format!("JPEG encoding failed: {e}")))?;
    Ok(buf)
}

/// Re-encode a snapshot for saving. PNG input is passed through untouched.
///
/// Returns the MIME type and the encoded bytes.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be decoded or re-encoded.
pub fn transcode(data: &[u8], format: SaveFormat) -> RasterResult<(&'static str, Vec<u8>)> {
    match format {
        SaveFormat::Png if ImageFormat::from_magic_bytes(data) == ImageFormat::Png => {
            Ok(("image/png", data.to_vec()))
        }
        SaveFormat::Png => Ok(("image/png", encode_png(&decode_rgba(data)?)?)),
        SaveFormat::Jpeg => Ok((
            "image/jpeg",
            encode_jpeg(&decode_rgba(data)?, JPEG_QUALITY, Color::WHITE)?,
        )),
    }
}

/// Build a base64 `data:` URI.
#[must_use]
pub fn to_data_uri(mime: &str, data: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    format!("data:{mime};base64,{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_format_detection_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            ImageFormat::Png
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            ImageFormat::Jpeg
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(b"RIFF\x00\x00\x00\x00WEBP"),
            ImageFormat::WebP
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a...."), ImageFormat::Gif);
        assert_eq!(ImageFormat::from_magic_bytes(b"abc"), ImageFormat::Unknown);
        assert_eq!(ImageFormat::Unknown.mime(), None);
    }

    #[test]
    fn test_data_uri_builder() {
        let uri = to_data_uri("image/png", &[1, 2, 3]);
        assert_eq!(uri, "data:image/png;base64,AQID");
    }

    #[test]
    fn test_png_encode_decodes() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 128]));
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[0..4], &[137, 80, 78, 71]);
        assert_eq!(decode_rgba(&png).unwrap(), img);
    }

    #[test]
    fn test_jpeg_flattens_onto_background() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]));
        let jpeg = encode_jpeg(&img, JPEG_QUALITY, Color::WHITE).unwrap();
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
        let back = decode_rgba(&jpeg).unwrap();
        assert!(back.get_pixel(4, 4)[0] > 240);
    }

    #[test]
    fn test_transcode() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let png = encode_png(&img).unwrap();

        let (mime, same) = transcode(&png, SaveFormat::Png).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(same, png);

        let (mime, jpeg) = transcode(&png, SaveFormat::Jpeg).unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(ImageFormat::from_magic_bytes(&jpeg), ImageFormat::Jpeg);

        assert!(transcode(b"garbage", SaveFormat::Jpeg).is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(decode_rgba(b"nope"), Err(RasterError::Decode(_))));
    }
}
