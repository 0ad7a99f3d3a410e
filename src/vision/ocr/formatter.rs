// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Protocol-specific request construction for one batch

use ndarray::{concatenate, Array2, Array4, ArrayView4, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::batch::{Batch, PayloadFragment};
use super::errors::OcrError;
use super::geometry::Geometry;
use super::model::{OcrModelKind, Protocol};

/// Image entry of the http request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrlInput {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

impl ImageUrlInput {
    /// Wrap base64 PNG data as a data URL entry
    pub fn from_base64(base64: &str) -> Self {
        Self {
            kind: "image_url".to_string(),
            url: format!("data:image/png;base64,{}", base64),
        }
    }
}

/// JSON body of an http inference request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpOcrRequest {
    pub input: Vec<ImageUrlInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_levels: Option<Vec<String>>,
}

/// Inputs of a grpc inference request
#[derive(Debug, Clone)]
pub struct GrpcRequest {
    /// NHWC batch tensor, shape `[B, H, W, C]`
    pub images: Array4<f32>,
    /// Merge level repeated per image, shape `[1, B]`; generic detector only
    pub merge_levels: Option<Array2<String>>,
}

/// A request ready to be sent over the selected protocol
#[derive(Debug, Clone)]
pub enum InferenceRequest {
    Grpc(GrpcRequest),
    Http(HttpOcrRequest),
}

impl InferenceRequest {
    pub fn protocol(&self) -> Protocol {
        match self {
            InferenceRequest::Grpc(_) => Protocol::Grpc,
            InferenceRequest::Http(_) => Protocol::Http,
        }
    }
}

/// Build the request for `batch`, returning it with the batch geometries
pub fn format_batch(
    batch: &Batch,
    protocol: Protocol,
    model: OcrModelKind,
    merge_level: &str,
) -> Result<(InferenceRequest, Vec<Geometry>), OcrError> {
    if batch.is_empty() {
        return Err(OcrError::InvalidShape("cannot format an empty batch".to_string()));
    }

    let sends_merge_levels = model.capabilities().sends_merge_levels;
    let request = match protocol {
        Protocol::Grpc => {
            debug!("Formatting grpc OCR batch of {} images ({})", batch.len(), model);
            InferenceRequest::Grpc(format_grpc(batch, sends_merge_levels, merge_level)?)
        }
        Protocol::Http => {
            debug!("Formatting http OCR batch of {} images ({})", batch.len(), model);
            InferenceRequest::Http(format_http(batch, sends_merge_levels, merge_level)?)
        }
    };

    Ok((request, batch.geometries()))
}

fn format_grpc(
    batch: &Batch,
    sends_merge_levels: bool,
    merge_level: &str,
) -> Result<GrpcRequest, OcrError> {
    let views = batch
        .items()
        .iter()
        .map(|item| match &item.fragment {
            PayloadFragment::Tensor(tensor) => Ok(tensor.view()),
            PayloadFragment::ImageUrl(_) => Err(OcrError::MissingInputKey(
                "image tensor; prepare the batch for grpc first".to_string(),
            )),
        })
        .collect::<Result<Vec<ArrayView4<f32>>, _>>()?;

    let images = concatenate(Axis(0), &views)
        .map_err(|e| OcrError::InvalidShape(format!("batch tensors differ in shape: {}", e)))?;

    let merge_levels = sends_merge_levels
        .then(|| Array2::from_elem((1, images.shape()[0]), merge_level.to_string()));

    Ok(GrpcRequest {
        images,
        merge_levels,
    })
}

fn format_http(
    batch: &Batch,
    sends_merge_levels: bool,
    merge_level: &str,
) -> Result<HttpOcrRequest, OcrError> {
    let input = batch
        .items()
        .iter()
        .map(|item| match &item.fragment {
            PayloadFragment::ImageUrl(base64) => Ok(ImageUrlInput::from_base64(base64)),
            PayloadFragment::Tensor(_) => Err(OcrError::MissingInputKey(
                "base64 image; prepare the batch for http first".to_string(),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let merge_levels = sends_merge_levels.then(|| vec![merge_level.to_string(); input.len()]);

    Ok(HttpOcrRequest {
        input,
        merge_levels,
    })
}
