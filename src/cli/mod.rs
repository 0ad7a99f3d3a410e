// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod ocr;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// OCR inference adapter CLI
#[derive(Parser, Debug)]
#[command(name = "ocr-cli")]
#[command(version)]
#[command(about = "Batch, send and parse OCR inference requests", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show which model name the registry resolves to
    ResolveModel(ocr::ResolveModelArgs),

    /// Preprocess and batch images without sending them (dry run)
    Format(ocr::FormatArgs),

    /// Run OCR against an http backend
    Infer(ocr::InferArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::ResolveModel(args) => ocr::resolve_model(args).await,
        Commands::Format(args) => ocr::format_images(args).await,
        Commands::Infer(args) => ocr::infer_images(args).await,
    }
}
