// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the OCR inference adapter
//!
//! Every failure is raised where it is detected. Callers that wrap the adapter
//! add context with [`OcrError::with_context`], which keeps the original error
//! as the `source()` and keeps [`OcrError::kind`] pointing at the root cause.

use thiserror::Error;

use crate::vision::image_utils::ImageError;

/// Errors that can occur while preparing, formatting or parsing OCR batches
#[derive(Error, Debug)]
pub enum OcrError {
    /// Required input key (image payload, tensor, ...) is absent
    #[error("Missing input key: {0}")]
    MissingInputKey(String),

    /// A list was expected but something else was found, or an array has the wrong shape
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Protocol selector is neither "grpc" nor "http"
    #[error("Invalid protocol '{0}': must be 'grpc' or 'http'")]
    InvalidProtocol(String),

    /// Required reply fields are absent, empty or undecodable
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Coordinate remapping was requested without any geometry
    #[error("No image geometry provided")]
    MissingGeometry,

    /// Image index has no matching geometry entry
    #[error("Image index {index} out of range for {available} stored geometries")]
    GeometryOutOfRange { index: usize, available: usize },

    /// Geometry values violate their invariants
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Base64 image could not be decoded
    #[error("Image decode failed: {0}")]
    ImageDecode(#[from] ImageError),

    /// Network call to the inference backend or registry failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// An upstream operation failed; `source` is the original error
    #[error("{operation}: {source}")]
    Context {
        operation: String,
        #[source]
        source: Box<OcrError>,
    },
}

/// Error kind, stable across context wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrErrorKind {
    MissingInputKey,
    InvalidShape,
    InvalidProtocol,
    MalformedResponse,
    MissingGeometry,
    GeometryOutOfRange,
    InvalidGeometry,
    ImageDecode,
    Transport,
}

impl OcrError {
    /// Wrap this error with the name of the operation that failed
    pub fn with_context(self, operation: impl Into<String>) -> Self {
        OcrError::Context {
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// Kind of the innermost error
    pub fn kind(&self) -> OcrErrorKind {
        match self {
            OcrError::MissingInputKey(_) => OcrErrorKind::MissingInputKey,
            OcrError::InvalidShape(_) => OcrErrorKind::InvalidShape,
            OcrError::InvalidProtocol(_) => OcrErrorKind::InvalidProtocol,
            OcrError::MalformedResponse(_) => OcrErrorKind::MalformedResponse,
            OcrError::MissingGeometry => OcrErrorKind::MissingGeometry,
            OcrError::GeometryOutOfRange { .. } => OcrErrorKind::GeometryOutOfRange,
            OcrError::InvalidGeometry(_) => OcrErrorKind::InvalidGeometry,
            OcrError::ImageDecode(_) => OcrErrorKind::ImageDecode,
            OcrError::Transport(_) => OcrErrorKind::Transport,
            OcrError::Context { source, .. } => source.kind(),
        }
    }

    /// Innermost error with all context layers stripped
    pub fn root_cause(&self) -> &OcrError {
        match self {
            OcrError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Get error code for logging and metrics
    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            OcrErrorKind::MissingInputKey => "MISSING_INPUT_KEY",
            OcrErrorKind::InvalidShape => "INVALID_SHAPE",
            OcrErrorKind::InvalidProtocol => "INVALID_PROTOCOL",
            OcrErrorKind::MalformedResponse => "MALFORMED_RESPONSE",
            OcrErrorKind::MissingGeometry => "MISSING_GEOMETRY",
            OcrErrorKind::GeometryOutOfRange => "GEOMETRY_OUT_OF_RANGE",
            OcrErrorKind::InvalidGeometry => "INVALID_GEOMETRY",
            OcrErrorKind::ImageDecode => "IMAGE_DECODE",
            OcrErrorKind::Transport => "TRANSPORT",
        }
    }

    /// Check if this error is worth retrying against the backend
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), OcrErrorKind::Transport)
    }
}

impl From<reqwest::Error> for OcrError {
    fn from(err: reqwest::Error) -> Self {
        OcrError::Transport(err.to_string())
    }
}

/// Adds operation context to `Result<T, OcrError>`
pub trait OcrResultExt<T> {
    fn with_operation(self, operation: &str) -> Result<T, OcrError>;
}

impl<T> OcrResultExt<T> for Result<T, OcrError> {
    fn with_operation(self, operation: &str) -> Result<T, OcrError> {
        self.map_err(|e| e.with_context(operation))
    }
}
