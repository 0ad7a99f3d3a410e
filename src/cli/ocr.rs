// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::config::OcrConfig;
use crate::vision::image_utils::{encode_base64, SourceImage};
use crate::vision::ocr::{
    FormattedBatch, InferenceRequest, ModelNameResolver, OcrHttpClient, OcrModelInterface,
};

/// Arguments for resolve-model command
#[derive(Args, Debug)]
pub struct ResolveModelArgs {
    /// Model registry base URL
    #[arg(long, env = "OCR_REGISTRY_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Name returned when the registry gives no answer
    #[arg(long)]
    pub default_name: Option<String>,
}

/// Arguments for format command
#[derive(Args, Debug)]
pub struct FormatArgs {
    /// Image files to format
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Wire protocol (grpc/http)
    #[arg(long, env = "OCR_INFER_PROTOCOL", default_value = "http")]
    pub protocol: String,

    /// Model name; resolved through the registry when omitted
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum images per batch
    #[arg(long)]
    pub max_batch_size: Option<usize>,
}

/// Arguments for infer command
#[derive(Args, Debug)]
pub struct InferArgs {
    /// Image files to run OCR on
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Full URL of the http infer route
    #[arg(long, env = "OCR_HTTP_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Model name; resolved through the registry when omitted
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum images per batch
    #[arg(long)]
    pub max_batch_size: Option<usize>,
}

/// Print the model name the resolver picks
pub async fn resolve_model(args: ResolveModelArgs) -> Result<()> {
    let mut config = load_config()?;
    if args.endpoint.is_some() {
        config.registry_endpoint = args.endpoint;
    }
    if let Some(default_name) = args.default_name {
        config.default_model_name = default_name;
    }

    let name = resolve_name(&config, None).await?;
    println!("{}", name);
    Ok(())
}

/// Format images into batches without sending them
pub async fn format_images(args: FormatArgs) -> Result<()> {
    let config = load_config()?;
    let max_batch_size = args.max_batch_size.unwrap_or(config.max_batch_size);
    let model_name = resolve_name(&config, args.model).await?;
    let interface = OcrModelInterface::from_config(&model_name, &config);

    let images = read_images(&args.images)?;
    let batches = interface.format_input(&images, &args.protocol, max_batch_size)?;

    let summary: Vec<_> = batches.iter().map(describe_batch).collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "model": model_name,
            "protocol": args.protocol,
            "batches": summary,
        }))?
    );
    Ok(())
}

/// Run OCR over http and print the detections
pub async fn infer_images(args: InferArgs) -> Result<()> {
    let mut config = load_config()?;
    if args.endpoint.is_some() {
        config.http_endpoint = args.endpoint;
    }
    config
        .validate_for_http_inference()
        .map_err(|e| anyhow!("invalid configuration: {}", e))?;
    let endpoint = config
        .http_endpoint
        .clone()
        .ok_or_else(|| anyhow!("Use --endpoint or set OCR_HTTP_ENDPOINT"))?;

    let max_batch_size = args.max_batch_size.unwrap_or(config.max_batch_size);
    let model_name = resolve_name(&config, args.model).await?;
    let interface = OcrModelInterface::from_config(&model_name, &config);
    let client = OcrHttpClient::new(&endpoint, Duration::from_secs(config.request_timeout_secs))?;

    let images = read_images(&args.images)?;
    let results = client.run(&interface, &images, max_batch_size).await?;

    let output: Vec<_> = args
        .images
        .iter()
        .zip(&results)
        .map(|(path, result)| json!({"image": path.display().to_string(), "result": result}))
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_config() -> Result<OcrConfig> {
    dotenv::dotenv().ok();
    let config = OcrConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow!("invalid configuration: {}", e))?;
    Ok(config)
}

async fn resolve_name(config: &OcrConfig, explicit: Option<String>) -> Result<String> {
    if let Some(name) = explicit {
        return Ok(name);
    }
    let resolver = ModelNameResolver::from_config(config)?;
    let name = resolver
        .resolve(config.registry_endpoint.as_deref(), &config.default_model_name)
        .await;
    info!("Using OCR model {}", name);
    Ok(name)
}

fn read_images(paths: &[PathBuf]) -> Result<Vec<SourceImage>> {
    paths
        .iter()
        .map(|path| {
            let bytes =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            SourceImage::decode(&encode_base64(&bytes))
                .with_context(|| format!("decoding {}", path.display()))
        })
        .collect()
}

fn describe_batch(batch: &FormattedBatch) -> serde_json::Value {
    let payload = match &batch.request {
        InferenceRequest::Grpc(grpc) => json!({
            "images_shape": grpc.images.shape(),
            "merge_levels": grpc.merge_levels.as_ref().map(|m| m.iter().cloned().collect::<Vec<_>>()),
        }),
        InferenceRequest::Http(http) => json!({
            "inputs": http.input.len(),
            "merge_levels": http.merge_levels,
        }),
    };
    json!({
        "size": batch.len(),
        "geometries": batch.geometries,
        "payload": payload,
    })
}
