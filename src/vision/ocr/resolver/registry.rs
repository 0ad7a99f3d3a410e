// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model registry lookups

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::vision::ocr::errors::OcrError;

/// Lists the models served at an endpoint
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Names of the served models, in registry order
    async fn list_models(&self, endpoint: &str) -> Result<Vec<String>, OcrError>;
}

#[derive(Debug, Deserialize)]
struct RepositoryEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RepositoryIndex {
    Bare(Vec<RepositoryEntry>),
    Wrapped { models: Vec<RepositoryEntry> },
}

impl RepositoryIndex {
    fn into_names(self) -> Vec<String> {
        let entries = match self {
            RepositoryIndex::Bare(entries) => entries,
            RepositoryIndex::Wrapped { models } => models,
        };
        entries.into_iter().map(|e| e.name).collect()
    }
}

/// Registry backed by the KServe v2 repository index
/// (`POST {endpoint}/v2/repository/index`)
pub struct HttpModelRegistry {
    client: Client,
}

impl HttpModelRegistry {
    pub fn new(timeout: Duration) -> Result<Self, OcrError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ModelRegistry for HttpModelRegistry {
    async fn list_models(&self, endpoint: &str) -> Result<Vec<String>, OcrError> {
        let url = format!("{}/v2/repository/index", endpoint.trim_end_matches('/'));
        debug!("Model registry POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(OcrError::Transport(format!(
                "model registry returned {}: {}",
                status, text
            )));
        }

        let index: RepositoryIndex = response.json().await.map_err(|e| {
            OcrError::MalformedResponse(format!("invalid repository index: {}", e))
        })?;
        Ok(index.into_names())
    }
}
