pub mod ask;
pub mod chat;
pub mod health;
pub mod render;
pub mod upload;

use anyhow::{Context, Result};
use doks_core::config::DoksConfig;
use doks_interaction::RagApiClient;
use std::sync::Arc;

fn api_client(config: &DoksConfig) -> Result<Arc<RagApiClient>> {
    let client = RagApiClient::from_config(config)
        .with_context(|| format!("Failed to create API client for {}", config.api.base_url))?;
    Ok(Arc::new(client))
}
