// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inverse of the preprocessing transform: model coordinates -> original pixels

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::errors::OcrError;
use super::geometry::Geometry;

/// A 2D point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Polygon as reported by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum RawPolygon {
    Points(Vec<Point>),
    /// "nan" sentinel: the detection carries no usable geometry
    NotANumber,
}

/// Detections of one image, in original pixel space
///
/// The three sequences are index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub polygons: Vec<Vec<Point>>,
    pub texts: Vec<String>,
    pub confidences: Vec<f64>,
}

impl DetectionResult {
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

/// Which inverse steps to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapOptions {
    /// Multiply normalized coordinates by the canvas size and undo the resize
    pub scale_coordinates: bool,
    /// Subtract the padding offset
    pub shift_coordinates: bool,
}

impl Default for RemapOptions {
    fn default() -> Self {
        Self {
            scale_coordinates: true,
            shift_coordinates: true,
        }
    }
}

/// What to do when an image index has no geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryFallback {
    /// Fail with [`OcrError::GeometryOutOfRange`]
    #[default]
    Strict,
    /// Log a warning and use the first geometry
    FirstWithWarning,
}

/// Maps backend polygons back onto the caller's image
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateRemapper {
    fallback: GeometryFallback,
}

impl CoordinateRemapper {
    pub fn new(fallback: GeometryFallback) -> Self {
        Self { fallback }
    }

    pub fn fallback(&self) -> GeometryFallback {
        self.fallback
    }

    /// Remap one image's detections, dropping "nan" polygons and their text/confidence
    pub fn remap(
        &self,
        polygons: Vec<RawPolygon>,
        texts: Vec<String>,
        confidences: Vec<f64>,
        geometries: &[Geometry],
        image_index: usize,
        options: RemapOptions,
    ) -> Result<DetectionResult, OcrError> {
        let geometry = self.select_geometry(geometries, image_index)?;
        if polygons.len() != texts.len() || texts.len() != confidences.len() {
            return Err(OcrError::MalformedResponse(format!(
                "image {}: {} polygons, {} texts, {} confidences",
                image_index,
                polygons.len(),
                texts.len(),
                confidences.len()
            )));
        }

        let max_w = if options.scale_coordinates { geometry.new_width as f64 } else { 1.0 };
        let max_h = if options.scale_coordinates { geometry.new_height as f64 } else { 1.0 };
        let pad_w = if options.shift_coordinates { geometry.pad_width as f64 } else { 0.0 };
        let pad_h = if options.shift_coordinates { geometry.pad_height as f64 } else { 0.0 };
        let scale = if options.scale_coordinates { geometry.scale_factor } else { 1.0 };

        let mut result = DetectionResult::default();
        for ((polygon, text), confidence) in polygons.into_iter().zip(texts).zip(confidences) {
            let RawPolygon::Points(points) = polygon else {
                continue;
            };
            let mapped = points
                .into_iter()
                .map(|p| Point::new((p.x * max_w - pad_w) / scale, (p.y * max_h - pad_h) / scale))
                .collect();
            result.polygons.push(mapped);
            result.texts.push(text);
            result.confidences.push(confidence);
        }

        Ok(result)
    }

    fn select_geometry<'a>(
        &self,
        geometries: &'a [Geometry],
        image_index: usize,
    ) -> Result<&'a Geometry, OcrError> {
        let first = geometries.first().ok_or(OcrError::MissingGeometry)?;
        match geometries.get(image_index) {
            Some(geometry) => Ok(geometry),
            None => match self.fallback {
                GeometryFallback::Strict => Err(OcrError::GeometryOutOfRange {
                    index: image_index,
                    available: geometries.len(),
                }),
                GeometryFallback::FirstWithWarning => {
                    warn!(
                        "Image index {} out of range for {} stored geometries; using the first",
                        image_index,
                        geometries.len()
                    );
                    Ok(first)
                }
            },
        }
    }
}
