// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Base64 image decoding for OCR inputs

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GenericImageView, ImageFormat};
use thiserror::Error;

/// Maximum decoded image size (20MB)
const MAX_IMAGE_SIZE: usize = 20 * 1024 * 1024;

/// Custom error types for image decoding
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,
}

/// A decoded image together with the base64 it was decoded from
///
/// The http protocol resends the original bytes, the grpc protocol sends
/// preprocessed pixels, so both are kept side by side.
#[derive(Debug, Clone)]
pub struct SourceImage {
    base64: String,
    image: DynamicImage,
}

impl SourceImage {
    /// Pair an already decoded image with its base64 source
    pub fn new(base64: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            base64: base64.into(),
            image,
        }
    }

    /// Decode a base64 string (optionally a `data:` URL) into a source image
    pub fn decode(base64_str: &str) -> Result<Self, ImageError> {
        let payload = strip_data_url(base64_str);
        let image = decode_base64_image(payload)?;
        Ok(Self::new(payload, image))
    }

    /// Base64 payload without any `data:` prefix
    pub fn base64(&self) -> &str {
        &self.base64
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Original width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Original height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Longest side of the original image
    pub fn max_side(&self) -> u32 {
        let (w, h) = self.image.dimensions();
        w.max(h)
    }
}

/// Strip a `data:image/...;base64,` prefix if present
pub fn strip_data_url(input: &str) -> &str {
    if input.starts_with("data:") {
        if let Some(idx) = input.find(";base64,") {
            return &input[idx + ";base64,".len()..];
        }
    }
    input
}

/// Decode a base64-encoded image
///
/// # Arguments
/// * `base64_str` - Base64 encoded image data
///
/// # Returns
/// * `Ok(DynamicImage)` - The decoded image
/// * `Err(ImageError)` - If decoding fails
pub fn decode_base64_image(base64_str: &str) -> Result<DynamicImage, ImageError> {
    if base64_str.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let bytes = STANDARD.decode(base64_str.trim())?;
    decode_image_bytes(&bytes)
}

/// Decode raw image bytes
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(ImageError::TooLarge(bytes.len(), MAX_IMAGE_SIZE));
    }

    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let format = detect_format(bytes)?;

    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))
}

/// Encode raw file bytes as standard base64
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Detect image format from magic bytes
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF87a / GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II or MM
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => Err(ImageError::UnsupportedFormat),
    }
}
