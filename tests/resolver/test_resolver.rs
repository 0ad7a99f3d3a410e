// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model name resolution priority, caching and retry budget

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ocr_inference_adapter::config::OcrConfig;
use ocr_inference_adapter::vision::ocr::resolver::{
    ModelNameCache, ModelNameResolver, ModelRegistry, RetryPolicy,
};
use ocr_inference_adapter::vision::ocr::OcrError;

/// Registry double that counts calls and either lists models or fails
struct MockRegistry {
    models: Option<Vec<String>>,
    calls: AtomicUsize,
}

impl MockRegistry {
    fn listing(models: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            models: Some(models.iter().map(|m| m.to_string()).collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            models: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelRegistry for MockRegistry {
    async fn list_models(&self, _endpoint: &str) -> Result<Vec<String>, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models
            .clone()
            .ok_or_else(|| OcrError::Transport("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_override_always_wins() {
    let registry = MockRegistry::listing(&["scene_text"]);
    let resolver = ModelNameResolver::new(registry.clone())
        .with_retry_policy(RetryPolicy::no_wait())
        .with_override(Some("forced".to_string()));

    assert_eq!(resolver.resolve(Some("http://triton:8000"), "paddle").await, "forced");
    assert_eq!(resolver.resolve(None, "paddle").await, "forced");
    assert_eq!(resolver.resolve(None, "other").await, "forced");
    assert_eq!(registry.calls(), 0);
}

#[tokio::test]
async fn test_override_beats_cached_value() {
    let cache = Arc::new(ModelNameCache::default());
    cache.insert(Some("http://triton:8000"), "paddle", "cached_model");

    let resolver = ModelNameResolver::new(MockRegistry::listing(&[]))
        .with_cache(cache)
        .with_override(Some("forced".to_string()));
    assert_eq!(resolver.resolve(Some("http://triton:8000"), "paddle").await, "forced");
}

#[tokio::test]
async fn test_no_endpoint_makes_no_calls() {
    let registry = MockRegistry::listing(&["scene_text"]);
    let resolver = ModelNameResolver::new(registry.clone());

    assert_eq!(resolver.resolve(None, "paddle").await, "paddle");
    assert_eq!(resolver.resolve(Some("   "), "paddle").await, "paddle");
    assert_eq!(registry.calls(), 0);
}

#[tokio::test]
async fn test_first_registry_model_is_used() {
    let registry = MockRegistry::listing(&["scene_text_ensemble", "paddle"]);
    let resolver = ModelNameResolver::new(registry.clone()).with_retry_policy(RetryPolicy::no_wait());

    let name = resolver.resolve(Some("http://triton:8000"), "paddle").await;
    assert_eq!(name, "scene_text_ensemble");
    assert_eq!(registry.calls(), 1);
}

#[tokio::test]
async fn test_failing_endpoint_falls_back_without_waiting() {
    let registry = MockRegistry::failing();
    let resolver = ModelNameResolver::new(registry.clone()).with_retry_policy(RetryPolicy::no_wait());

    let started = std::time::Instant::now();
    let name = resolver.resolve(Some("http://triton:8000"), "paddle").await;
    assert_eq!(name, "paddle");
    assert_eq!(registry.calls(), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_failing_endpoint_retries_within_budget() {
    let registry = MockRegistry::failing();
    let policy = RetryPolicy {
        max_total_time: Duration::from_millis(200),
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        exponential_base: 2.0,
        max_attempts: None,
    };
    let resolver = ModelNameResolver::new(registry.clone()).with_retry_policy(policy);

    let started = std::time::Instant::now();
    let name = resolver.resolve(Some("http://triton:8000"), "paddle").await;
    assert_eq!(name, "paddle");
    assert!(registry.calls() > 1, "calls = {}", registry.calls());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_fallback_is_cached() {
    let registry = MockRegistry::failing();
    let resolver = ModelNameResolver::new(registry.clone()).with_retry_policy(RetryPolicy::no_wait());

    resolver.resolve(Some("http://triton:8000"), "paddle").await;
    resolver.resolve(Some("http://triton:8000"), "paddle").await;
    assert_eq!(registry.calls(), 1);
    assert_eq!(resolver.cache().len(), 1);
}

#[tokio::test]
async fn test_cache_keyed_by_endpoint_and_default() {
    let registry = MockRegistry::listing(&["scene_text"]);
    let resolver = ModelNameResolver::new(registry.clone()).with_retry_policy(RetryPolicy::no_wait());

    resolver.resolve(Some("http://a:8000"), "paddle").await;
    resolver.resolve(Some("http://b:8000"), "paddle").await;
    resolver.resolve(Some("http://a:8000"), "other").await;
    resolver.resolve(Some("http://a:8000"), "paddle").await;
    assert_eq!(registry.calls(), 3);
}

#[tokio::test]
async fn test_shared_cache_across_resolvers() {
    let cache = Arc::new(ModelNameCache::new(10));
    let first = MockRegistry::listing(&["scene_text"]);
    let second = MockRegistry::listing(&["something_else"]);

    let a = ModelNameResolver::new(first.clone())
        .with_cache(cache.clone())
        .with_retry_policy(RetryPolicy::no_wait());
    let b = ModelNameResolver::new(second.clone())
        .with_cache(cache.clone())
        .with_retry_policy(RetryPolicy::no_wait());

    assert_eq!(a.resolve(Some("http://triton"), "paddle").await, "scene_text");
    assert_eq!(b.resolve(Some("http://triton"), "paddle").await, "scene_text");
    assert_eq!(second.calls(), 0);
}

#[test]
fn test_resolve_blocking() {
    let resolver = ModelNameResolver::new(MockRegistry::listing(&["scene_text"]))
        .with_retry_policy(RetryPolicy::no_wait());
    let name = tokio_test::block_on(resolver.resolve(Some("http://triton"), "paddle"));
    assert_eq!(name, "scene_text");
}

// Only test in this binary that touches OCR_MODEL_NAME
#[tokio::test]
async fn test_env_override_from_config() {
    std::env::set_var("OCR_MODEL_NAME", "env_model");
    let config = OcrConfig::from_env();
    std::env::remove_var("OCR_MODEL_NAME");

    assert_eq!(config.model_name_override.as_deref(), Some("env_model"));
    let resolver = ModelNameResolver::from_config(&config).unwrap();
    assert_eq!(resolver.resolve(Some("http://127.0.0.1:9"), "paddle").await, "env_model");
}

/// Registry double whose listing never arrives in time
struct StalledRegistry;

#[async_trait]
impl ModelRegistry for StalledRegistry {
    async fn list_models(&self, _endpoint: &str) -> Result<Vec<String>, OcrError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(vec!["too_late".to_string()])
    }
}

#[tokio::test]
async fn test_stalled_registry_bounded_by_budget() {
    let policy = RetryPolicy::default().with_max_total_time(Duration::from_millis(300));
    let resolver = ModelNameResolver::new(Arc::new(StalledRegistry)).with_retry_policy(policy);

    let started = std::time::Instant::now();
    let name = resolver.resolve(Some("http://triton:8000"), "paddle").await;
    assert_eq!(name, "paddle");
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
}
