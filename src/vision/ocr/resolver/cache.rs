// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! LRU cache of resolved model names

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// Default number of (endpoint, default name) pairs kept
pub const DEFAULT_NAME_CACHE_CAPACITY: usize = 100;

type CacheKey = (Option<String>, String);

/// Resolved model names keyed by `(endpoint, default_name)`
pub struct ModelNameCache {
    cache: Mutex<LruCache<CacheKey, String>>,
}

impl ModelNameCache {
    /// Create a cache; a zero capacity is bumped to one entry
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, endpoint: Option<&str>, default_name: &str) -> Option<String> {
        let mut cache = self.cache.lock().ok()?;
        cache
            .get(&(endpoint.map(str::to_string), default_name.to_string()))
            .cloned()
    }

    pub fn insert(&self, endpoint: Option<&str>, default_name: &str, model_name: &str) {
        let mut cache = match self.cache.lock() {
            Ok(c) => c,
            Err(_) => return,
        };
        cache.put(
            (endpoint.map(str::to_string), default_name.to_string()),
            model_name.to_string(),
        );
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

impl Default for ModelNameCache {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for ModelNameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelNameCache")
            .field("len", &self.len())
            .finish()
    }
}
