// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Adapter facade used by the inference pipeline

use serde_json::Value;
use tracing::debug;

use super::batch::{BatchPreprocessor, OcrInput};
use super::errors::{OcrError, OcrResultExt};
use super::formatter::{format_batch, InferenceRequest};
use super::geometry::Geometry;
use super::model::{OcrModelKind, Protocol, DEFAULT_MERGE_LEVEL};
use super::preprocessing::PADDLE_MAX_DIMENSION;
use super::remap::{CoordinateRemapper, DetectionResult, GeometryFallback};
use super::response::{InferenceResponse, ResponseParser};
use crate::config::OcrConfig;
use crate::vision::image_utils::SourceImage;

/// Name the adapter registers under
pub const INTERFACE_NAME: &str = "OCR";

/// One request plus the geometries needed to parse its reply
#[derive(Debug, Clone)]
pub struct FormattedBatch {
    pub request: InferenceRequest,
    pub geometries: Vec<Geometry>,
}

impl FormattedBatch {
    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }
}

/// OCR adapter for one resolved model
#[derive(Debug, Clone)]
pub struct OcrModelInterface {
    model_name: String,
    model: OcrModelKind,
    merge_level: String,
    paddle_max_dimension: u32,
    fallback: GeometryFallback,
}

impl OcrModelInterface {
    pub fn new(model_name: impl Into<String>) -> Self {
        let model_name = model_name.into();
        let model = OcrModelKind::from_name(&model_name);
        Self {
            model_name,
            model,
            merge_level: DEFAULT_MERGE_LEVEL.to_string(),
            paddle_max_dimension: PADDLE_MAX_DIMENSION,
            fallback: GeometryFallback::default(),
        }
    }

    pub fn from_config(model_name: impl Into<String>, config: &OcrConfig) -> Self {
        Self::new(model_name)
            .with_merge_level(config.merge_level.clone())
            .with_paddle_max_dimension(config.paddle_max_dimension)
            .with_geometry_fallback(config.geometry_fallback())
    }

    pub fn with_merge_level(mut self, merge_level: impl Into<String>) -> Self {
        self.merge_level = merge_level.into();
        self
    }

    pub fn with_paddle_max_dimension(mut self, max_dimension: u32) -> Self {
        self.paddle_max_dimension = max_dimension;
        self
    }

    pub fn with_geometry_fallback(mut self, fallback: GeometryFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn name(&self) -> &'static str {
        INTERFACE_NAME
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn model_kind(&self) -> OcrModelKind {
        self.model
    }

    pub fn merge_level(&self) -> &str {
        &self.merge_level
    }

    /// Decode the base64 images found under `base64_images` or `base64_image`
    pub fn prepare_data_for_inference(&self, data: &Value) -> Result<Vec<SourceImage>, OcrError> {
        OcrInput::from_value(data)
            .and_then(OcrInput::decode)
            .with_operation("prepare_data_for_inference")
    }

    /// Preprocess, chunk and format `images` for `protocol`
    pub fn format_input(
        &self,
        images: &[SourceImage],
        protocol: &str,
        max_batch_size: usize,
    ) -> Result<Vec<FormattedBatch>, OcrError> {
        self.format_input_inner(images, protocol, max_batch_size)
            .with_operation("format_input")
    }

    fn format_input_inner(
        &self,
        images: &[SourceImage],
        protocol: &str,
        max_batch_size: usize,
    ) -> Result<Vec<FormattedBatch>, OcrError> {
        let protocol: Protocol = protocol.parse()?;
        let batches = BatchPreprocessor::new(self.model, protocol, max_batch_size)
            .with_paddle_max_dimension(self.paddle_max_dimension)
            .prepare_batches(images)?;
        debug!(
            "Formatting {} images into {} {} batches for {}",
            images.len(),
            batches.len(),
            protocol,
            self.model_name
        );

        batches
            .iter()
            .map(|batch| {
                let (request, geometries) =
                    format_batch(batch, protocol, self.model, &self.merge_level)?;
                Ok(FormattedBatch {
                    request,
                    geometries,
                })
            })
            .collect()
    }

    /// Parse one batch reply with the geometries returned by [`Self::format_input`]
    pub fn parse_output(
        &self,
        response: &InferenceResponse,
        protocol: &str,
        geometries: &[Geometry],
    ) -> Result<Vec<DetectionResult>, OcrError> {
        protocol
            .parse::<Protocol>()
            .and_then(|protocol| self.parser().parse(response, protocol, geometries))
            .with_operation("parse_output")
    }

    /// Post-processing hook; results pass through unchanged
    pub fn process_inference_results(&self, results: Vec<DetectionResult>) -> Vec<DetectionResult> {
        results
    }

    fn parser(&self) -> ResponseParser {
        ResponseParser::new(self.model, CoordinateRemapper::new(self.fallback))
    }
}
