//! RagApiClient - REST client for the remote DoksAI RAG service.
//!
//! One client covers the three endpoints the application uses:
//! `GET /health`, `POST /query` and `POST /upload`.

use async_trait::async_trait;
use doks_core::config::DoksConfig;
use doks_core::document::{DocumentApi, UploadResponseBody, UploadedDocument, validate_pdf};
use doks_core::error::{DoksError, Result};
use doks_core::health::{HealthApi, HealthReport};
use doks_core::query::{QueryApi, QueryOutcome, QueryRequest, QueryResponseBody};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

const PDF_MIME: &str = "application/pdf";

/// HTTP implementation of the health, query and document collaborators.
#[derive(Clone)]
pub struct RagApiClient {
    client: Client,
    base_url: String,
    health_timeout: Duration,
    max_upload_bytes: u64,
}

impl RagApiClient {
    /// Creates a client with the default timeouts and upload limit.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::from_config(&DoksConfig {
            api: doks_core::config::ApiConfig {
                base_url: base_url.into(),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Creates a client from the `api` and `upload` sections of the config.
    pub fn from_config(config: &DoksConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.api.request_timeout())
            .build()
            .map_err(|err| DoksError::config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            health_timeout: config.api.health_timeout(),
            max_upload_bytes: config.upload.max_upload_bytes,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl HealthApi for RagApiClient {
    async fn check(&self) -> Result<HealthReport> {
        let response = self
            .client
            .get(self.endpoint("health"))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        response
            .json::<HealthReport>()
            .await
            .map_err(|err| DoksError::Decode(format!("Failed to parse health response: {err}")))
    }
}

#[async_trait]
impl QueryApi for RagApiClient {
    async fn query(&self, request: QueryRequest) -> Result<QueryOutcome> {
        request.validate()?;

        let response = self
            .client
            .post(self.endpoint("query"))
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|err| DoksError::Transport(format!("Failed to read query response: {err}")))?;

        if status.is_success() {
            let body: QueryResponseBody = serde_json::from_str(&body_text)
                .map_err(|err| DoksError::Decode(format!("Failed to parse query response: {err}")))?;
            return body.into_outcome();
        }

        // Error statuses usually still carry the `success: false` body
        match serde_json::from_str::<QueryResponseBody>(&body_text) {
            Ok(body) if !body.success => body.into_outcome(),
            _ => Err(map_http_error(status, body_text)),
        }
    }
}

#[async_trait]
impl DocumentApi for RagApiClient {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadedDocument> {
        validate_pdf(filename, &bytes, self.max_upload_bytes)?;

        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(PDF_MIME)
            .map_err(|err| DoksError::invalid_input(format!("Invalid upload part: {err}")))?;
        let form = Form::new().part("file", part);

        tracing::debug!("[RagApiClient] Uploading {} ({} bytes)", filename, size);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|err| DoksError::Transport(format!("Failed to read upload response: {err}")))?;

        match serde_json::from_str::<UploadResponseBody>(&body_text) {
            Ok(body) if status.is_success() || !body.success => body.into_result(),
            Ok(_) => Err(map_http_error(status, body_text)),
            Err(err) if status.is_success() => Err(DoksError::Decode(format!(
                "Failed to parse upload response: {err}"
            ))),
            Err(_) => Err(map_http_error(status, body_text)),
        }
    }
}

fn map_send_error(err: reqwest::Error) -> DoksError {
    if err.is_connect() {
        DoksError::Unreachable(err.to_string())
    } else if err.is_timeout() {
        DoksError::Transport(format!("request timed out: {err}"))
    } else {
        DoksError::Transport(err.to_string())
    }
}

async fn http_error(response: Response) -> DoksError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    map_http_error(status, body)
}

fn map_http_error(status: StatusCode, body: String) -> DoksError {
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        body
    };
    DoksError::Http {
        status: status.as_u16(),
        message,
    }
}
