// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decoding of grpc and http OCR replies into per-image detections
//!
//! grpc replies are a `3 x N` array of UTF-8 JSON byte strings (boxes, texts,
//! confidences per image column). http replies are a JSON document with one
//! `data` entry per image. Both end up in [`CoordinateRemapper::remap`].

use ndarray::{Array2, ArrayD, Ix2};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::errors::OcrError;
use super::geometry::Geometry;
use super::model::{OcrModelKind, Protocol};
use super::remap::{CoordinateRemapper, DetectionResult, Point, RawPolygon, RemapOptions};

/// Raw reply from the inference backend
#[derive(Debug, Clone)]
pub enum InferenceResponse {
    /// Byte-string array of shape `(3,)` or `(3, N)`
    Grpc(ArrayD<Vec<u8>>),
    /// Decoded JSON body
    Http(Value),
}

impl InferenceResponse {
    pub fn protocol(&self) -> Protocol {
        match self {
            InferenceResponse::Grpc(_) => Protocol::Grpc,
            InferenceResponse::Http(_) => Protocol::Http,
        }
    }
}

// --- http wire types ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpOcrResponse {
    #[serde(default)]
    pub data: Vec<HttpImageResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpImageResult {
    #[serde(default)]
    pub text_detections: Vec<HttpTextDetection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTextDetection {
    pub text_prediction: HttpTextPrediction,
    pub bounding_box: HttpBoundingBox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTextPrediction {
    pub text: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpBoundingBox {
    pub points: Vec<Point>,
}

/// Row order of a grpc reply
const GRPC_ROWS: [&str; 3] = ["bounding boxes", "text predictions", "confidence scores"];

/// Parses backend replies for one model variant
#[derive(Debug, Clone, Copy)]
pub struct ResponseParser {
    model: OcrModelKind,
    remapper: CoordinateRemapper,
}

impl ResponseParser {
    pub fn new(model: OcrModelKind, remapper: CoordinateRemapper) -> Self {
        Self { model, remapper }
    }

    /// Parse `response` into one [`DetectionResult`] per image, in request order
    pub fn parse(
        &self,
        response: &InferenceResponse,
        protocol: Protocol,
        geometries: &[Geometry],
    ) -> Result<Vec<DetectionResult>, OcrError> {
        match (protocol, response) {
            (Protocol::Grpc, InferenceResponse::Grpc(reply)) => {
                debug!("Parsing grpc OCR reply ({})", self.model);
                self.parse_grpc(reply, geometries)
            }
            (Protocol::Http, InferenceResponse::Http(body)) => {
                debug!("Parsing http OCR reply ({})", self.model);
                self.parse_http(body, geometries)
            }
            (expected, other) => Err(OcrError::MalformedResponse(format!(
                "expected a {} reply, got a {} reply",
                expected,
                other.protocol()
            ))),
        }
    }

    fn parse_grpc(
        &self,
        reply: &ArrayD<Vec<u8>>,
        geometries: &[Geometry],
    ) -> Result<Vec<DetectionResult>, OcrError> {
        let reply = normalize_grpc_shape(reply)?;
        let options = RemapOptions {
            scale_coordinates: self.model.capabilities().scale_grpc_coordinates,
            shift_coordinates: true,
        };

        let mut results = Vec::with_capacity(reply.ncols());
        for (index, column) in reply.columns().into_iter().enumerate() {
            let boxes = decode_cell(&column[0], GRPC_ROWS[0], index)?;
            let texts = decode_cell(&column[1], GRPC_ROWS[1], index)?;
            let confidences = decode_cell(&column[2], GRPC_ROWS[2], index)?;

            let polygons = with_singleton_unwrap(&boxes, polygons_from_value)
                .ok_or_else(|| unexpected_structure(GRPC_ROWS[0], index))?;
            let texts = with_singleton_unwrap(&texts, strings_from_value)
                .ok_or_else(|| unexpected_structure(GRPC_ROWS[1], index))?;
            let confidences = with_singleton_unwrap(&confidences, floats_from_value)
                .ok_or_else(|| unexpected_structure(GRPC_ROWS[2], index))?;

            results.push(self.remapper.remap(
                polygons,
                texts,
                confidences,
                geometries,
                index,
                options,
            )?);
        }

        Ok(results)
    }

    fn parse_http(
        &self,
        body: &Value,
        geometries: &[Geometry],
    ) -> Result<Vec<DetectionResult>, OcrError> {
        let response = HttpOcrResponse::deserialize(body)
            .map_err(|e| OcrError::MalformedResponse(format!("invalid http reply: {}", e)))?;
        if response.data.is_empty() {
            return Err(OcrError::MalformedResponse(
                "'data' key is missing or empty".to_string(),
            ));
        }

        response
            .data
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let count = item.text_detections.len();
                let mut polygons = Vec::with_capacity(count);
                let mut texts = Vec::with_capacity(count);
                let mut confidences = Vec::with_capacity(count);
                for detection in item.text_detections {
                    polygons.push(RawPolygon::Points(detection.bounding_box.points));
                    texts.push(detection.text_prediction.text);
                    confidences.push(detection.text_prediction.confidence);
                }
                self.remapper.remap(
                    polygons,
                    texts,
                    confidences,
                    geometries,
                    index,
                    RemapOptions::default(),
                )
            })
            .collect()
    }
}

/// Coerce a grpc reply to `3 x N`; a flat `(3,)` reply becomes `(3, 1)`
pub fn normalize_grpc_shape(reply: &ArrayD<Vec<u8>>) -> Result<Array2<Vec<u8>>, OcrError> {
    match reply.shape() {
        [3] => Array2::from_shape_vec((3, 1), reply.iter().cloned().collect())
            .map_err(|e| OcrError::InvalidShape(e.to_string())),
        [3, _] => reply
            .clone()
            .into_dimensionality::<Ix2>()
            .map_err(|e| OcrError::InvalidShape(e.to_string())),
        other => Err(OcrError::InvalidShape(format!(
            "unexpected response shape {:?}, expecting (3,) or (3, n)",
            other
        ))),
    }
}

/// Inner value of a single-element list
pub fn unwrap_singleton(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) if items.len() == 1 => items.first(),
        _ => None,
    }
}

/// Decode `value`, retrying one level down if it is a single-element wrapper
///
/// Some backends nest each cell in an extra list when the batch holds one
/// image. The unwrap only happens when the value does not already decode,
/// so a genuine single detection is left alone.
fn with_singleton_unwrap<T>(value: &Value, decode: impl Fn(&Value) -> Option<T>) -> Option<T> {
    decode(value).or_else(|| unwrap_singleton(value).and_then(&decode))
}

fn decode_cell(bytes: &[u8], what: &str, index: usize) -> Result<Value, OcrError> {
    serde_json::from_slice(bytes).map_err(|e| {
        OcrError::MalformedResponse(format!(
            "image {}: {} cell is not UTF-8 JSON: {}",
            index, what, e
        ))
    })
}

fn unexpected_structure(what: &str, index: usize) -> OcrError {
    OcrError::MalformedResponse(format!(
        "image {}: {} cell has an unexpected structure",
        index, what
    ))
}

fn polygons_from_value(value: &Value) -> Option<Vec<RawPolygon>> {
    value.as_array()?.iter().map(polygon_from_value).collect()
}

fn polygon_from_value(value: &Value) -> Option<RawPolygon> {
    match value {
        Value::String(s) if s.eq_ignore_ascii_case("nan") => Some(RawPolygon::NotANumber),
        Value::Array(points) if !points.is_empty() => points
            .iter()
            .map(point_from_value)
            .collect::<Option<Vec<_>>>()
            .map(RawPolygon::Points),
        _ => None,
    }
}

fn point_from_value(value: &Value) -> Option<Point> {
    match value {
        Value::Array(xy) if xy.len() == 2 => Some(Point::new(xy[0].as_f64()?, xy[1].as_f64()?)),
        Value::Object(map) => Some(Point::new(map.get("x")?.as_f64()?, map.get("y")?.as_f64()?)),
        _ => None,
    }
}

fn strings_from_value(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn floats_from_value(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(Value::as_f64).collect()
}
