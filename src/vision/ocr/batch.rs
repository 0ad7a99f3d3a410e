// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Batch preparation: decoded images -> aligned (payload, geometry) batches

use ndarray::Array4;
use serde_json::Value;
use tracing::debug;

use super::errors::OcrError;
use super::geometry::Geometry;
use super::model::{OcrModelKind, PreprocessMode, Protocol};
use super::preprocessing::{preprocess_for_detector, preprocess_for_paddle, PADDLE_MAX_DIMENSION};
use crate::vision::image_utils::SourceImage;

/// Input key for a single base64 image
pub const SINGLE_IMAGE_KEY: &str = "base64_image";

/// Input key for a list of base64 images
pub const MULTI_IMAGE_KEY: &str = "base64_images";

/// Base64 images handed to the adapter
#[derive(Debug, Clone, PartialEq)]
pub enum OcrInput {
    Single(String),
    Many(Vec<String>),
}

impl OcrInput {
    /// Read the image payload out of a JSON mapping
    ///
    /// The list key takes precedence when both keys are present.
    pub fn from_value(data: &Value) -> Result<Self, OcrError> {
        if let Some(list) = data.get(MULTI_IMAGE_KEY) {
            let items = list.as_array().ok_or_else(|| {
                OcrError::InvalidShape(format!(
                    "'{}' must contain a list of base64-encoded strings",
                    MULTI_IMAGE_KEY
                ))
            })?;
            let images = items
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    v.as_str().map(str::to_string).ok_or_else(|| {
                        OcrError::InvalidShape(format!(
                            "'{}'[{}] is not a base64 string",
                            MULTI_IMAGE_KEY, i
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(OcrInput::Many(images));
        }

        if let Some(single) = data.get(SINGLE_IMAGE_KEY) {
            let image = single.as_str().ok_or_else(|| {
                OcrError::InvalidShape(format!("'{}' must be a base64 string", SINGLE_IMAGE_KEY))
            })?;
            return Ok(OcrInput::Single(image.to_string()));
        }

        Err(OcrError::MissingInputKey(format!(
            "input data must include '{}' or '{}'",
            SINGLE_IMAGE_KEY, MULTI_IMAGE_KEY
        )))
    }

    pub fn into_vec(self) -> Vec<String> {
        match self {
            OcrInput::Single(image) => vec![image],
            OcrInput::Many(images) => images,
        }
    }

    /// Decode every image, preserving order
    pub fn decode(self) -> Result<Vec<SourceImage>, OcrError> {
        self.into_vec()
            .iter()
            .map(|b64| SourceImage::decode(b64).map_err(OcrError::from))
            .collect()
    }
}

/// Per-image request fragment
#[derive(Debug, Clone)]
pub enum PayloadFragment {
    /// grpc: NHWC tensor of shape `[1, H, W, C]`
    Tensor(Array4<f32>),
    /// http: base64 of the source image
    ImageUrl(String),
}

/// One image ready to be batched
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub fragment: PayloadFragment,
    pub geometry: Geometry,
}

/// Ordered, bounded group of prepared images sent in one request
#[derive(Debug, Clone, Default)]
pub struct Batch {
    items: Vec<PreparedImage>,
}

impl Batch {
    pub fn new(items: Vec<PreparedImage>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[PreparedImage] {
        &self.items
    }

    /// Geometries aligned with the batch elements
    pub fn geometries(&self) -> Vec<Geometry> {
        self.items.iter().map(|item| item.geometry).collect()
    }
}

/// Turns decoded images into protocol-specific batches
#[derive(Debug, Clone)]
pub struct BatchPreprocessor {
    model: OcrModelKind,
    protocol: Protocol,
    max_batch_size: usize,
    paddle_max_dimension: u32,
}

impl BatchPreprocessor {
    pub fn new(model: OcrModelKind, protocol: Protocol, max_batch_size: usize) -> Self {
        Self {
            model,
            protocol,
            max_batch_size,
            paddle_max_dimension: PADDLE_MAX_DIMENSION,
        }
    }

    pub fn with_paddle_max_dimension(mut self, max_dimension: u32) -> Self {
        self.paddle_max_dimension = max_dimension;
        self
    }

    /// Build one (fragment, geometry) pair per image, same order as the input
    pub fn prepare(&self, images: &[SourceImage]) -> Result<Vec<PreparedImage>, OcrError> {
        if images.is_empty() {
            return Err(OcrError::InvalidShape("no images to prepare".to_string()));
        }

        match self.protocol {
            Protocol::Http => images
                .iter()
                .map(|image| {
                    Ok(PreparedImage {
                        fragment: PayloadFragment::ImageUrl(image.base64().to_string()),
                        geometry: Geometry::unscaled(image.width(), image.height())?,
                    })
                })
                .collect(),
            Protocol::Grpc => self.prepare_tensors(images),
        }
    }

    fn prepare_tensors(&self, images: &[SourceImage]) -> Result<Vec<PreparedImage>, OcrError> {
        match self.model.capabilities().preprocess {
            PreprocessMode::PerImage => images
                .iter()
                .map(|image| {
                    let out = preprocess_for_paddle(image.image(), self.paddle_max_dimension)?;
                    Ok(PreparedImage {
                        fragment: PayloadFragment::Tensor(out.tensor),
                        geometry: out.geometry,
                    })
                })
                .collect(),
            PreprocessMode::SharedSquare => {
                // One canvas for the whole call, so every chunk shares it
                let target = images.iter().map(SourceImage::max_side).max().unwrap_or(0);
                debug!(
                    "Preparing {} images on a shared {}x{} canvas",
                    images.len(),
                    target,
                    target
                );
                images
                    .iter()
                    .map(|image| {
                        let out = preprocess_for_detector(image.image(), target)?;
                        Ok(PreparedImage {
                            fragment: PayloadFragment::Tensor(out.tensor),
                            geometry: out.geometry,
                        })
                    })
                    .collect()
            }
        }
    }

    /// Prepare and split into batches of at most `max_batch_size`
    pub fn prepare_batches(&self, images: &[SourceImage]) -> Result<Vec<Batch>, OcrError> {
        let prepared = self.prepare(images)?;
        chunk_prepared(prepared, self.max_batch_size)
    }
}

/// Split prepared images into consecutive batches, preserving order
pub fn chunk_prepared(
    prepared: Vec<PreparedImage>,
    max_batch_size: usize,
) -> Result<Vec<Batch>, OcrError> {
    if max_batch_size == 0 {
        return Err(OcrError::InvalidShape(
            "max_batch_size must be at least 1".to_string(),
        ));
    }

    let mut batches = Vec::with_capacity(prepared.len().div_ceil(max_batch_size));
    let mut current = Vec::with_capacity(max_batch_size);
    for item in prepared {
        current.push(item);
        if current.len() == max_batch_size {
            batches.push(Batch::new(std::mem::take(&mut current)));
        }
    }
    if !current.is_empty() {
        batches.push(Batch::new(current));
    }
    Ok(batches)
}
