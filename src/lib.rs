// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod vision;

// Re-export main types
pub use config::OcrConfig;
pub use vision::ocr::{
    DetectionResult, Geometry, InferenceRequest, InferenceResponse, ModelNameResolver,
    OcrError, OcrErrorKind, OcrHttpClient, OcrModelInterface, OcrModelKind, Protocol,
};
