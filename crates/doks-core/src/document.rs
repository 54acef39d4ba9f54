//! Document upload types.

use crate::error::{DoksError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Leading bytes of every PDF file.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// A document accepted by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub pages: Option<u32>,
}

/// Raw body of `POST <base>/upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponseBody {
    pub success: bool,
    #[serde(default)]
    pub document: Option<UploadedDocument>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl UploadResponseBody {
    pub fn into_result(self) -> Result<UploadedDocument> {
        if !self.success {
            return Err(DoksError::api(
                self.code.unwrap_or_else(|| "UNKNOWN".to_string()),
                self.error.unwrap_or_else(|| "Upload failed".to_string()),
            ));
        }
        self.document
            .ok_or_else(|| DoksError::Decode("successful upload response has no document".into()))
    }
}

/// Checks that a file looks like a PDF the service will accept.
pub fn validate_pdf(filename: &str, bytes: &[u8], max_bytes: u64) -> Result<()> {
    let is_pdf_name = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf_name {
        return Err(DoksError::invalid_input(format!(
            "'{}' is not a .pdf file",
            filename
        )));
    }
    if bytes.is_empty() {
        return Err(DoksError::invalid_input(format!("'{}' is empty", filename)));
    }
    if bytes.len() as u64 > max_bytes {
        return Err(DoksError::invalid_input(format!(
            "'{}' is {} bytes, the limit is {}",
            filename,
            bytes.len(),
            max_bytes
        )));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(DoksError::invalid_input(format!(
            "'{}' does not contain PDF data",
            filename
        )));
    }
    Ok(())
}

/// Remote document intake.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadedDocument>;
}
