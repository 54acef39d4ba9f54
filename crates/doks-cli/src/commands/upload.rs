use super::api_client;
use anyhow::{Context, Result};
use colored::Colorize;
use doks_core::config::DoksConfig;
use doks_core::document::DocumentApi;
use std::path::Path;

pub async fn run(config: &DoksConfig, path: &Path) -> Result<()> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    println!("📤 Uploading {} ({} bytes)...", filename, bytes.len());

    let client = api_client(config)?;
    let document = client
        .upload(filename, bytes)
        .await
        .with_context(|| format!("Failed to upload {}", filename))?;

    let pages = document
        .pages
        .map(|pages| format!(", {} pages", pages))
        .unwrap_or_default();
    println!(
        "{}",
        format!("✅ Uploaded {}{}", document.filename, pages).green()
    );
    println!("   Document id: {}", document.id.bold());
    println!(
        "{}",
        format!("   Ask about it with: doks ask --doc-id {} \"...\"", document.id).bright_black()
    );

    Ok(())
}
