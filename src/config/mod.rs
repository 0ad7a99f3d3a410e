// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the OCR inference adapter

use std::env;
use std::str::FromStr;

use tracing::warn;
use url::Url;

use crate::vision::ocr::model::{Protocol, DEFAULT_MERGE_LEVEL, DEFAULT_OCR_MODEL_NAME};
use crate::vision::ocr::preprocessing::PADDLE_MAX_DIMENSION;
use crate::vision::ocr::remap::GeometryFallback;
use crate::vision::ocr::resolver::DEFAULT_NAME_CACHE_CAPACITY;

/// Configuration for OCR batching, transport and model resolution
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Unconditional model name override (`OCR_MODEL_NAME`)
    pub model_name_override: Option<String>,
    /// Model name used when the registry gives no answer
    pub default_model_name: String,
    /// Merge level sent to the generic detector
    pub merge_level: String,
    /// Maximum images per inference request
    pub max_batch_size: usize,
    /// Wire protocol used for inference
    pub protocol: Protocol,
    /// Full URL of the http infer route
    pub http_endpoint: Option<String>,
    /// Base URL of the model registry
    pub registry_endpoint: Option<String>,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Total time the resolver may spend retrying the registry
    pub resolve_max_wait_secs: u64,
    /// Resolver cache capacity
    pub name_cache_capacity: usize,
    /// Longest side of PaddleOCR inputs
    pub paddle_max_dimension: u32,
    /// Fail on out-of-range geometry indices instead of reusing the first
    pub strict_geometry: bool,
}

impl OcrConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unparsable values use the default
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            model_name_override: non_empty("OCR_MODEL_NAME"),
            default_model_name: non_empty("OCR_DEFAULT_MODEL_NAME")
                .unwrap_or(defaults.default_model_name),
            merge_level: non_empty("OCR_MERGE_LEVEL").unwrap_or(defaults.merge_level),
            max_batch_size: parse_or(&lookup, "OCR_MAX_BATCH_SIZE", defaults.max_batch_size),
            protocol: parse_or(&lookup, "OCR_INFER_PROTOCOL", defaults.protocol),
            http_endpoint: non_empty("OCR_HTTP_ENDPOINT"),
            registry_endpoint: non_empty("OCR_REGISTRY_ENDPOINT"),
            request_timeout_secs: parse_or(
                &lookup,
                "OCR_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            resolve_max_wait_secs: parse_or(
                &lookup,
                "OCR_RESOLVE_MAX_WAIT_SECS",
                defaults.resolve_max_wait_secs,
            ),
            name_cache_capacity: parse_or(
                &lookup,
                "OCR_NAME_CACHE_CAPACITY",
                defaults.name_cache_capacity,
            ),
            paddle_max_dimension: parse_or(
                &lookup,
                "OCR_PADDLE_MAX_DIMENSION",
                defaults.paddle_max_dimension,
            ),
            strict_geometry: lookup("OCR_STRICT_GEOMETRY")
                .map(|v| v.trim().to_lowercase() != "false")
                .unwrap_or(defaults.strict_geometry),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_batch_size == 0 {
            return Err("Max batch size must be greater than 0".to_string());
        }
        if self.merge_level.trim().is_empty() {
            return Err("Merge level must not be empty".to_string());
        }
        if self.default_model_name.trim().is_empty() {
            return Err("Default model name must not be empty".to_string());
        }
        if self.paddle_max_dimension == 0 {
            return Err("Paddle max dimension must be greater than 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("Request timeout must be greater than 0".to_string());
        }
        for (key, endpoint) in [
            ("OCR_HTTP_ENDPOINT", &self.http_endpoint),
            ("OCR_REGISTRY_ENDPOINT", &self.registry_endpoint),
        ] {
            if let Some(endpoint) = endpoint {
                Url::parse(endpoint).map_err(|e| format!("{} is not a valid URL: {}", key, e))?;
            }
        }
        Ok(())
    }

    /// Validate, additionally requiring an http infer endpoint
    pub fn validate_for_http_inference(&self) -> Result<(), String> {
        self.validate()?;
        if self.http_endpoint.is_none() {
            return Err("OCR_HTTP_ENDPOINT is required for http inference".to_string());
        }
        Ok(())
    }

    pub fn geometry_fallback(&self) -> GeometryFallback {
        if self.strict_geometry {
            GeometryFallback::Strict
        } else {
            GeometryFallback::FirstWithWarning
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_name_override: None,
            default_model_name: DEFAULT_OCR_MODEL_NAME.to_string(),
            merge_level: DEFAULT_MERGE_LEVEL.to_string(),
            max_batch_size: 8,
            protocol: Protocol::Http,
            http_endpoint: None,
            registry_endpoint: None,
            request_timeout_secs: 120,
            resolve_max_wait_secs: 30,
            name_cache_capacity: DEFAULT_NAME_CACHE_CAPACITY,
            paddle_max_dimension: PADDLE_MAX_DIMENSION,
            strict_geometry: true,
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}; using default", key, raw);
            default
        }),
        None => default,
    }
}
