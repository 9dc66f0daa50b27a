//! Tile payload codecs.
//!
//! The store never interprets tile bytes itself. It hands images to a
//! [`TileCodec`] together with a short format tag (`"png"`, `"jpg"`, ...) and
//! persists whatever bytes come back.
//!
//! # Formats
//!
//! [`ImageCodec`] covers the formats compiled into the `image` crate:
//!
//! - **png**: lossless, keeps the alpha channel. The default tile format.
//! - **jpg / jpeg**: lossy, alpha is dropped, quality is configurable.
//! - **tif / tiff**: lossless, keeps the alpha channel.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};

use crate::error::CodecError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Codec Trait
// =============================================================================

/// Encoder/decoder for tile payloads.
///
/// Implementations must be thread-safe: one codec instance is shared by every
/// ingestion worker.
pub trait TileCodec: Send + Sync {
    /// Encode `image` in the format named by `file_type`.
    fn encode(&self, image: &RgbaImage, file_type: &str) -> Result<Bytes, CodecError>;

    /// Decode bytes previously produced by [`encode`](TileCodec::encode).
    fn decode(&self, data: &[u8], file_type: &str) -> Result<RgbaImage, CodecError>;

    /// Whether `file_type` can be both encoded and decoded.
    fn supports(&self, file_type: &str) -> bool;
}

// =============================================================================
// Image Codec
// =============================================================================

/// [`TileCodec`] backed by the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageCodec {
    jpeg_quality: u8,
}

impl ImageCodec {
    pub fn new() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Create a codec that writes JPEG tiles at `quality` (clamped to 1-100).
    pub fn with_jpeg_quality(quality: u8) -> Self {
        Self {
            jpeg_quality: clamp_quality(quality),
        }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    fn format_for(file_type: &str) -> Result<ImageFormat, CodecError> {
        match normalize_file_type(file_type).as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "tif" | "tiff" => Ok(ImageFormat::Tiff),
            _ => Err(CodecError::UnsupportedFileType(file_type.to_string())),
        }
    }
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TileCodec for ImageCodec {
    fn encode(&self, image: &RgbaImage, file_type: &str) -> Result<Bytes, CodecError> {
        let format = Self::format_for(file_type)?;
        let encode_error = |e: image::ImageError| CodecError::EncodeError {
            file_type: file_type.to_string(),
            message: e.to_string(),
        };

        let mut output = Vec::new();
        match format {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut output, self.jpeg_quality);
                encoder.encode_image(&rgb).map_err(encode_error)?;
            }
            _ => {
                image
                    .write_to(&mut Cursor::new(&mut output), format)
                    .map_err(encode_error)?;
            }
        }

        Ok(Bytes::from(output))
    }

    fn decode(&self, data: &[u8], file_type: &str) -> Result<RgbaImage, CodecError> {
        let format = Self::format_for(file_type)?;

        let reader = ImageReader::with_format(Cursor::new(data), format);
        let img = reader.decode().map_err(|e| CodecError::DecodeError {
            file_type: file_type.to_string(),
            message: e.to_string(),
        })?;

        Ok(img.to_rgba8())
    }

    fn supports(&self, file_type: &str) -> bool {
        Self::format_for(file_type).is_ok()
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Canonical lowercase form of a format tag, without a leading dot.
pub fn normalize_file_type(file_type: &str) -> String {
    file_type.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Validate JPEG quality parameter.
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
