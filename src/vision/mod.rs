// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing: image decoding and the OCR inference adapter

pub mod image_utils;
pub mod ocr;

pub use image_utils::{decode_base64_image, decode_image_bytes, detect_format, ImageError, SourceImage};
