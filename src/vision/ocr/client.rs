// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP client for an OCR inference backend

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use super::errors::{OcrError, OcrResultExt};
use super::formatter::{HttpOcrRequest, InferenceRequest};
use super::interface::OcrModelInterface;
use super::model::Protocol;
use super::remap::DetectionResult;
use super::response::InferenceResponse;
use crate::vision::image_utils::SourceImage;

/// Posts formatted http batches to an infer URL
pub struct OcrHttpClient {
    client: Client,
    endpoint: String,
}

impl OcrHttpClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, OcrError> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = endpoint.trim_end_matches('/').to_string();
        info!(
            "OCR http client configured: endpoint={}, timeout={:?}",
            endpoint, timeout
        );
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one batch and return the decoded JSON reply
    pub async fn infer(&self, request: &HttpOcrRequest) -> Result<Value, OcrError> {
        debug!(
            "OCR infer POST {} ({} images)",
            self.endpoint,
            request.input.len()
        );
        let response = self.client.post(&self.endpoint).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(OcrError::Transport(format!(
                "OCR backend returned {}: {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OcrError::MalformedResponse(format!("reply is not JSON: {}", e)))
    }

    /// Format, send and parse every batch; results keep the input order
    pub async fn run(
        &self,
        interface: &OcrModelInterface,
        images: &[SourceImage],
        max_batch_size: usize,
    ) -> Result<Vec<DetectionResult>, OcrError> {
        let protocol = Protocol::Http.as_str();
        let batches = interface.format_input(images, protocol, max_batch_size)?;

        let mut results = Vec::with_capacity(images.len());
        for (index, batch) in batches.iter().enumerate() {
            let InferenceRequest::Http(body) = &batch.request else {
                return Err(OcrError::InvalidProtocol(batch.request.protocol().to_string()));
            };
            let reply = self
                .infer(body)
                .await
                .with_operation(&format!("infer batch {}", index))?;
            let parsed =
                interface.parse_output(&InferenceResponse::Http(reply), protocol, &batch.geometries)?;
            results.extend(interface.process_inference_results(parsed));
        }

        info!(
            "OCR run complete: {} images, {} batches",
            results.len(),
            batches.len()
        );
        Ok(results)
    }
}
