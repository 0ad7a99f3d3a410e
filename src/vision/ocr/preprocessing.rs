// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the OCR backends
//!
//! Both routines produce an NHWC `[1, H, W, 3]` float tensor plus the
//! [`Geometry`] needed to map detections back onto the original image.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;

use super::errors::OcrError;
use super::geometry::Geometry;

/// Longest side PaddleOCR images are resized to
pub const PADDLE_MAX_DIMENSION: u32 = 960;

/// PaddleOCR canvases are a multiple of this stride
pub const PADDLE_STRIDE: u32 = 32;

/// Where the resized image sits inside the padded canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadPosition {
    /// Image centred, padding split on both sides
    Center,
    /// Image anchored at the top-left, padding on the bottom and right
    BottomRight,
}

/// Output of a preprocessing routine
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// NHWC tensor, shape `[1, H, W, 3]`
    pub tensor: Array4<f32>,
    pub geometry: Geometry,
}

/// Preprocess an image for PaddleOCR
///
/// Steps:
/// 1. Resize so the longest side equals `max_dimension`
/// 2. Normalize pixels to `[0, 1]`
/// 3. Centre on a black square canvas of `max_dimension` rounded up to a multiple of 32
///
/// Every image of a call lands on the same canvas size, so paddle batches
/// can be concatenated.
pub fn preprocess_for_paddle(
    image: &DynamicImage,
    max_dimension: u32,
) -> Result<PreprocessedImage, OcrError> {
    let (orig_w, orig_h) = non_empty_dimensions(image)?;
    if max_dimension == 0 {
        return Err(OcrError::InvalidShape(
            "paddle max dimension must be positive".to_string(),
        ));
    }

    let scale = max_dimension as f64 / orig_w.max(orig_h) as f64;
    let new_w = scaled_side(orig_w, scale, max_dimension);
    let new_h = scaled_side(orig_h, scale, max_dimension);

    let canvas = round_up(max_dimension, PADDLE_STRIDE);
    let (tensor, offset_x, offset_y) = resize_into_canvas(
        image,
        (new_w, new_h),
        (canvas, canvas),
        PadPosition::Center,
        1.0 / 255.0,
    );

    let geometry = Geometry::new(canvas, canvas, offset_x, offset_y, scale)?;
    Ok(PreprocessedImage { tensor, geometry })
}

/// Preprocess an image for the generic detector
///
/// The image is fitted inside a `target_size` square with its aspect ratio
/// preserved and padded bottom-right. Pixel values stay in `[0, 255]`.
pub fn preprocess_for_detector(
    image: &DynamicImage,
    target_size: u32,
) -> Result<PreprocessedImage, OcrError> {
    let (orig_w, orig_h) = non_empty_dimensions(image)?;
    if target_size == 0 {
        return Err(OcrError::InvalidShape(
            "detector target size must be positive".to_string(),
        ));
    }

    let scale = (target_size as f64 / orig_w as f64).min(target_size as f64 / orig_h as f64);
    let new_w = scaled_side(orig_w, scale, target_size);
    let new_h = scaled_side(orig_h, scale, target_size);

    let (tensor, offset_x, offset_y) = resize_into_canvas(
        image,
        (new_w, new_h),
        (target_size, target_size),
        PadPosition::BottomRight,
        1.0,
    );

    let geometry = Geometry::new(target_size, target_size, offset_x, offset_y, scale)?;
    Ok(PreprocessedImage { tensor, geometry })
}

fn non_empty_dimensions(image: &DynamicImage) -> Result<(u32, u32), OcrError> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(OcrError::InvalidShape(format!(
            "image has an empty dimension: {}x{}",
            w, h
        )));
    }
    Ok((w, h))
}

fn scaled_side(side: u32, scale: f64, limit: u32) -> u32 {
    ((side as f64 * scale).round() as u32).clamp(1, limit)
}

fn round_up(value: u32, multiple: u32) -> u32 {
    value.div_ceil(multiple) * multiple
}

/// Resize `image` to `new_size` and write it into a zeroed NHWC canvas
///
/// Returns the tensor and the (x, y) offset of the image inside the canvas.
fn resize_into_canvas(
    image: &DynamicImage,
    new_size: (u32, u32),
    canvas: (u32, u32),
    position: PadPosition,
    scale_pixels: f32,
) -> (Array4<f32>, u32, u32) {
    let (new_w, new_h) = new_size;
    let (canvas_w, canvas_h) = canvas;

    let rgb = if image.dimensions() == (new_w, new_h) {
        image.to_rgb8()
    } else {
        image
            .resize_exact(new_w, new_h, FilterType::Triangle)
            .to_rgb8()
    };

    let (offset_x, offset_y) = match position {
        PadPosition::Center => ((canvas_w - new_w) / 2, (canvas_h - new_h) / 2),
        PadPosition::BottomRight => (0, 0),
    };

    let mut tensor = Array4::zeros((1, canvas_h as usize, canvas_w as usize, 3));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let cy = (y + offset_y) as usize;
        let cx = (x + offset_x) as usize;
        for c in 0..3 {
            tensor[[0, cy, cx, c]] = pixel[c] as f32 * scale_pixels;
        }
    }

    (tensor, offset_x, offset_y)
}
