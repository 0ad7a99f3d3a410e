// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-image record of the resize/pad/scale applied before inference

use serde::{Deserialize, Serialize};

use super::errors::OcrError;

/// How an image was transformed before being sent to the model
///
/// `new_width`/`new_height` are the extents normalized coordinates refer to,
/// `pad_*` the offset of the image content inside that canvas, and
/// `scale_factor` the ratio between resized and original pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeometry")]
pub struct Geometry {
    pub new_width: u32,
    pub new_height: u32,
    pub pad_width: u32,
    pub pad_height: u32,
    pub scale_factor: f64,
}

fn default_scale_factor() -> f64 {
    1.0
}

/// Unchecked wire form of [`Geometry`]
#[derive(Deserialize)]
struct RawGeometry {
    new_width: u32,
    new_height: u32,
    #[serde(default)]
    pad_width: u32,
    #[serde(default)]
    pad_height: u32,
    #[serde(default = "default_scale_factor")]
    scale_factor: f64,
}

impl TryFrom<RawGeometry> for Geometry {
    type Error = OcrError;

    fn try_from(raw: RawGeometry) -> Result<Self, Self::Error> {
        Geometry::new(
            raw.new_width,
            raw.new_height,
            raw.pad_width,
            raw.pad_height,
            raw.scale_factor,
        )
    }
}

impl Geometry {
    /// Create a geometry, validating its invariants
    pub fn new(
        new_width: u32,
        new_height: u32,
        pad_width: u32,
        pad_height: u32,
        scale_factor: f64,
    ) -> Result<Self, OcrError> {
        let geometry = Self {
            new_width,
            new_height,
            pad_width,
            pad_height,
            scale_factor,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Geometry of an image sent untouched (no padding, unit scale)
    pub fn unscaled(width: u32, height: u32) -> Result<Self, OcrError> {
        Self::new(width, height, 0, 0, 1.0)
    }

    /// Check `new_* > 0` and a finite positive scale
    pub fn validate(&self) -> Result<(), OcrError> {
        if self.new_width == 0 || self.new_height == 0 {
            return Err(OcrError::InvalidGeometry(format!(
                "new size must be positive, got {}x{}",
                self.new_width, self.new_height
            )));
        }
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(OcrError::InvalidGeometry(format!(
                "scale factor must be positive, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}
