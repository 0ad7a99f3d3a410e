// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Served OCR model name resolution
//!
//! Priority: explicit override, then the cached answer, then the first model
//! listed by the registry, then the caller's default name. Resolution never
//! fails; registry problems are logged and fall back to the default.

pub mod cache;
pub mod registry;
pub mod retry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::vision::ocr::errors::OcrError;

pub use cache::{ModelNameCache, DEFAULT_NAME_CACHE_CAPACITY};
pub use registry::{HttpModelRegistry, ModelRegistry};
pub use retry::RetryPolicy;

/// Picks the model name to use for a backend
pub struct ModelNameResolver {
    registry: Arc<dyn ModelRegistry>,
    cache: Arc<ModelNameCache>,
    retry: RetryPolicy,
    override_name: Option<String>,
}

impl ModelNameResolver {
    pub fn new(registry: Arc<dyn ModelRegistry>) -> Self {
        Self {
            registry,
            cache: Arc::new(ModelNameCache::default()),
            retry: RetryPolicy::default(),
            override_name: None,
        }
    }

    /// Resolver backed by the http registry, configured from `config`
    pub fn from_config(config: &OcrConfig) -> Result<Self, OcrError> {
        let registry = HttpModelRegistry::new(Duration::from_secs(config.request_timeout_secs))?;
        let retry = RetryPolicy::default()
            .with_max_total_time(Duration::from_secs(config.resolve_max_wait_secs));

        Ok(Self::new(Arc::new(registry))
            .with_cache(Arc::new(ModelNameCache::new(config.name_cache_capacity)))
            .with_retry_policy(retry)
            .with_override(config.model_name_override.clone()))
    }

    pub fn with_cache(mut self, cache: Arc<ModelNameCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Name returned unconditionally; empty names are ignored
    pub fn with_override(mut self, name: Option<String>) -> Self {
        self.override_name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self
    }

    pub fn cache(&self) -> &Arc<ModelNameCache> {
        &self.cache
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn override_name(&self) -> Option<&str> {
        self.override_name.as_deref()
    }

    /// Resolve the model name served at `endpoint`
    pub async fn resolve(&self, endpoint: Option<&str>, default_name: &str) -> String {
        if let Some(name) = &self.override_name {
            info!("Using OCR model name override: {}", name);
            return name.clone();
        }

        if let Some(cached) = self.cache.get(endpoint, default_name) {
            debug!("OCR model name cache hit: {}", cached);
            return cached;
        }

        let name = match endpoint.map(str::trim).filter(|e| !e.is_empty()) {
            None => default_name.to_string(),
            Some(url) => match self.query_with_retry(url).await {
                Some(name) => name,
                None => {
                    warn!(
                        "Could not resolve OCR model name at {}; falling back to '{}'",
                        url, default_name
                    );
                    default_name.to_string()
                }
            },
        };

        info!("Resolved OCR model name: {}", name);
        self.cache.insert(endpoint, default_name, &name);
        name
    }

    /// First listed model name, retrying until the policy budget is spent
    async fn query_with_retry(&self, endpoint: &str) -> Option<String> {
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            let remaining = self.retry.remaining(start.elapsed());
            match tokio::time::timeout(remaining, self.registry.list_models(endpoint)).await {
                Ok(Ok(models)) => match models.into_iter().find(|n| !n.is_empty()) {
                    Some(name) => return Some(name),
                    None => warn!("Model registry at {} lists no models", endpoint),
                },
                Ok(Err(e)) => warn!(
                    "Model registry query failed [{}]: {}",
                    e.error_code(),
                    e
                ),
                Err(_) => warn!(
                    "Model registry at {} did not answer within {:?}",
                    endpoint, remaining
                ),
            }
            attempt += 1;

            let delay = self.retry.delay_for_attempt(attempt - 1);
            if !self.retry.allows(attempt, start.elapsed(), delay) {
                return None;
            }
            debug!("Retrying model registry in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }
}
