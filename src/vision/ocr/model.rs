// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR model variants, their capabilities, and the wire protocol selector

use std::fmt;
use std::str::FromStr;

use super::errors::OcrError;

/// Default OCR model name when nothing else is configured
pub const DEFAULT_OCR_MODEL_NAME: &str = "paddle";

/// Default merge level sent to the generic detector
pub const DEFAULT_MERGE_LEVEL: &str = "paragraph";

/// Inference wire protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Grpc,
    Http,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Grpc => "grpc",
            Protocol::Http => "http",
        }
    }
}

impl FromStr for Protocol {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grpc" => Ok(Protocol::Grpc),
            "http" => Ok(Protocol::Http),
            _ => Err(OcrError::InvalidProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a model wants its grpc pixels prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessMode {
    /// Each image resized and centre-padded on its own
    PerImage,
    /// All images fitted into one shared square canvas, padded bottom-right
    SharedSquare,
}

/// Per-variant behaviour, selected once per request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    pub preprocess: PreprocessMode,
    /// Attach merge levels to each batch
    pub sends_merge_levels: bool,
    /// grpc replies carry normalized coordinates that need scaling
    pub scale_grpc_coordinates: bool,
}

/// Concrete OCR model family served by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrModelKind {
    Paddle,
    GenericDetector,
}

impl OcrModelKind {
    /// Map a served model name onto its family
    ///
    /// Only "paddle" selects the PaddleOCR path; every other name is treated
    /// as the generic detector.
    pub fn from_name(name: &str) -> Self {
        if name == DEFAULT_OCR_MODEL_NAME {
            OcrModelKind::Paddle
        } else {
            OcrModelKind::GenericDetector
        }
    }

    pub fn is_paddle(&self) -> bool {
        matches!(self, OcrModelKind::Paddle)
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        match self {
            OcrModelKind::Paddle => ModelCapabilities {
                preprocess: PreprocessMode::PerImage,
                sends_merge_levels: false,
                scale_grpc_coordinates: true,
            },
            OcrModelKind::GenericDetector => ModelCapabilities {
                preprocess: PreprocessMode::SharedSquare,
                sends_merge_levels: true,
                scale_grpc_coordinates: false,
            },
        }
    }
}

impl fmt::Display for OcrModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrModelKind::Paddle => f.write_str("paddle"),
            OcrModelKind::GenericDetector => f.write_str("generic-detector"),
        }
    }
}
