//! Listings API client for the bulk-upload endpoint.
//!
//! The endpoint is called twice per upload: once with `validateOnly=true` to
//! check rows without persisting, then with `validateOnly=false` to commit.
//! Both calls carry the identical CSV payload; the API is responsible for
//! skipping invalid rows during the commit pass.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};

const BULK_UPLOAD_PATH: &str = "/api/properties/bulk-upload";

/// Request body for both upload passes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUploadRequest {
    pub csv_data: String,
    pub transaction_type: String,
    pub validate_only: bool,
}

/// Per-field error reported by the API for one row.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field errors the API reported for one row.
#[derive(Debug, Clone, Deserialize)]
pub struct RowErrors {
    pub row: usize,
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

/// Result payload of a validate or commit pass.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUploadReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    #[serde(default)]
    pub valid_rows: Vec<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<RowErrors>,
}

#[derive(Debug, Deserialize)]
struct BulkUploadEnvelope {
    #[serde(default)]
    success: bool,
    data: BulkUploadReport,
}

/// Async interface to the bulk-upload collaborator, so tests can substitute
/// an in-process fake for the HTTP client.
#[async_trait::async_trait]
pub trait BulkUploadApi: Send + Sync {
    async fn bulk_upload(&self, request: &BulkUploadRequest) -> Result<BulkUploadReport>;
}

/// HTTP client for the listings API.
pub struct ListingsApiClient {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl ListingsApiClient {
    pub fn new(base_url: String, bearer_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        })
    }
}

#[async_trait::async_trait]
impl BulkUploadApi for ListingsApiClient {
    async fn bulk_upload(&self, request: &BulkUploadRequest) -> Result<BulkUploadReport> {
        let url = format!("{}{}", self.base_url, BULK_UPLOAD_PATH);
        debug!(
            "POST {} (validateOnly={}, {} bytes of CSV)",
            url,
            request.validate_only,
            request.csv_data.len()
        );

        let mut builder = self.client.post(&url).json(request);
        if let Some(token) = &self.bearer_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if !request.validate_only {
            // Commit replays an already-validated payload; the key lets an
            // idempotency-aware API deduplicate retries of the same file.
            builder = builder.header("Idempotency-Key", idempotency_key(&request.csv_data));
        }

        let response = builder
            .send()
            .await
            .context("Failed to reach the listings API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body).unwrap_or_else(|| {
                format!("Bulk upload request failed with status {}", status)
            });
            warn!("Listings API error ({}): {}", status, message);
            anyhow::bail!(message);
        }

        let envelope: BulkUploadEnvelope = response
            .json()
            .await
            .context("Failed to parse the listings API response")?;
        if !envelope.success {
            anyhow::bail!("Listings API reported a failed upload");
        }

        Ok(envelope.data)
    }
}

/// Pull the user-facing message out of an error body, preferring `error`
/// over `message`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// SHA-256 hex digest of the CSV payload, sent as the commit idempotency key.
fn idempotency_key(csv_data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(csv_data.as_bytes());
    format!("{:x}", hasher.finalize())
}
