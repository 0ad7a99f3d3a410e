// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR inference adapter
//!
//! Turns base64 images into batched grpc or http requests for a remote OCR
//! backend and maps the returned polygons back onto the original images.
//!
//! Components:
//! - `batch` - Input decoding, preprocessing and chunking
//! - `formatter` - Per-protocol request bodies
//! - `response` - Reply decoding and shape normalization
//! - `remap` - Model coordinates back to original pixels
//! - `resolver` - Served model name lookup with cache and retry
//! - `interface` - Adapter facade
//! - `client` - HTTP transport

pub mod batch;
pub mod client;
pub mod errors;
pub mod formatter;
pub mod geometry;
pub mod interface;
pub mod model;
pub mod preprocessing;
pub mod remap;
pub mod resolver;
pub mod response;

pub use batch::{Batch, BatchPreprocessor, OcrInput, PayloadFragment, PreparedImage};
pub use client::OcrHttpClient;
pub use errors::{OcrError, OcrErrorKind, OcrResultExt};
pub use formatter::{format_batch, GrpcRequest, HttpOcrRequest, ImageUrlInput, InferenceRequest};
pub use geometry::Geometry;
pub use interface::{FormattedBatch, OcrModelInterface};
pub use model::{OcrModelKind, Protocol};
pub use remap::{CoordinateRemapper, DetectionResult, GeometryFallback, Point, RawPolygon};
pub use resolver::{ModelNameCache, ModelNameResolver, ModelRegistry, RetryPolicy};
pub use response::{InferenceResponse, ResponseParser};
