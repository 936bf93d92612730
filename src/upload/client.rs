//! Authenticated snapshot PUT.

use super::outcome::{interpret_response, UploadOutcome, UploadResult};
use crate::capture::CaptureFile;
use crate::config::CameraConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

const SNAPSHOT_CONTENT_TYPE: &str = "image/jpg";
const TOKEN_HEADER: &str = "token";
const FINGERPRINT_HEADER: &str = "fingerprint";

/// Errors that keep an upload from being attempted at all.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid upload endpoint {0:?}")]
    InvalidEndpoint(String),
    #[error("{0} is not a valid HTTP header value")]
    InvalidHeader(&'static str),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("failed to read snapshot: {0}")]
    Read(#[from] std::io::Error),
}

/// Uploads snapshots to the remote endpoint.
#[derive(Debug, Clone)]
pub struct SnapshotUploader {
    client: reqwest::Client,
    endpoint: Url,
}

impl SnapshotUploader {
    /// Creates an uploader from the camera configuration.
    ///
    /// The fingerprint must already be provisioned.
    pub fn from_config(config: &CameraConfig) -> Result<Self, UploadError> {
        Self::new(
            &config.upload.endpoint,
            config.upload.timeout(),
            &config.token,
            config.fingerprint(),
        )
    }

    /// Creates an uploader for `endpoint` carrying the given credentials.
    pub fn new(
        endpoint: &str,
        timeout: Duration,
        token: &str,
        fingerprint: &str,
    ) -> Result<Self, UploadError> {
        let endpoint =
            Url::parse(endpoint).map_err(|_| UploadError::InvalidEndpoint(endpoint.to_string()))?;

        let mut token = HeaderValue::from_str(token).map_err(|_| UploadError::InvalidHeader("token"))?;
        token.set_sensitive(true);
        let fingerprint = HeaderValue::from_str(fingerprint)
            .map_err(|_| UploadError::InvalidHeader("fingerprint"))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(SNAPSHOT_CONTENT_TYPE));
        headers.insert(HeaderName::from_static(TOKEN_HEADER), token);
        headers.insert(HeaderName::from_static(FINGERPRINT_HEADER), fingerprint);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, endpoint })
    }

    /// Reads the captured file, deletes it, and uploads its contents.
    ///
    /// A read failure aborts the upload.
    pub async fn upload_file(&self, file: CaptureFile) -> Result<UploadResult, UploadError> {
        let data = file.read_and_remove().await?;
        Ok(self.upload(data).await)
    }

    /// PUTs the snapshot bytes and interprets the response.
    ///
    /// Never fails: every outcome is returned and logged.
    pub async fn upload(&self, data: Vec<u8>) -> UploadResult {
        let size = data.len();
        let result = self.send(data).await;

        match &result.outcome {
            UploadOutcome::Delivered => {
                tracing::info!(status = ?result.transport_status, size, "Snapshot uploaded");
            }
            UploadOutcome::Rejected { body } => {
                tracing::warn!(
                    status = ?result.transport_status,
                    body = %body,
                    "Unexpected response to snapshot upload"
                );
            }
            UploadOutcome::TransportError(detail) => {
                tracing::error!(
                    status = ?result.transport_status,
                    error = %detail,
                    "Snapshot upload failed"
                );
            }
        }
        result
    }

    async fn send(&self, data: Vec<u8>) -> UploadResult {
        let response = match self.client.put(self.endpoint.clone()).body(data).send().await {
            Ok(r) => r,
            Err(e) => return UploadResult::transport_error(None, describe(&e)),
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => interpret_response(status, &body),
            Err(e) => UploadResult::transport_error(Some(status), describe(&e)),
        }
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}
