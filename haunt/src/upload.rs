#![doc = "HTTP transport for the pipeline: implements the core `TransferClient` trait against the upload/analysis service."]
//
//! # HTTP client (CLI <-> Core)
//!
//! [`HttpClient`] maps each pipeline operation to one request:
//!
//! | Operation | Request |
//! |---|---|
//! | `send_part` | `POST {base}/upload-chunk`, multipart with `file`, `sessionId`, `filename`, `start`, `totalSize`, and `isWholeFile` for single-request transfers |
//! | `finalize` | `POST {base}/finalize-upload`, JSON `{sessionId, files:[{filename, size}]}` |
//! | `analyze` | `POST {base}/analyze`, JSON `{files, folder, prompt}` |
//! | [`HttpClient::fetch_report`] | `GET {base}/results/{filename}` |
//!
//! Any non-2xx status becomes an error carrying the status and the body's `error` field
//! when present. An analyze reply with an `{error}` body on a success status is passed to
//! the core, which classifies it.

use std::time::Duration;

use async_trait::async_trait;
use haunt_core::contract::{
    AnalyzeRequest, AnalyzeResponse, ClientError, FinalizeRequest, FinalizeResponse, PartUpload,
    TransferAck, TransferClient,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::load_config::CliConfig;

pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
}

/// Error returned for a non-success HTTP status.
#[derive(Error, Debug)]
pub enum HttpStatusError {
    #[error("HTTP {status}")]
    Bare { status: StatusCode },
    #[error("HTTP {status}: {message}")]
    WithMessage { status: StatusCode, message: String },
}

impl HttpStatusError {
    pub fn new(status: StatusCode, message: String) -> Self {
        if message.trim().is_empty() {
            Self::Bare { status }
        } else {
            Self::WithMessage { status, message }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Bare { status } | Self::WithMessage { status, .. } => *status,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| {
            tracing::error!(error = ?e, "Failed to build HTTP client");
            e
        })?;
        Ok(Self::with_client(http, base_url))
    }

    /// Wraps an already configured `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!(base_url = %base_url, "Initialized HttpClient");
        Self { http, base_url }
    }

    pub fn from_config(config: &CliConfig) -> Result<Self, ClientError> {
        Self::new(
            config.server.base_url.clone(),
            config.server.timeout_secs.map(Duration::from_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// URL of the report for `filename`, with the name percent-encoded as one path segment.
    fn report_url(&self, filename: &str) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|()| ClientError::from(format!("base URL cannot take a path: {}", self.base_url)))?
            .pop_if_empty()
            .push("results")
            .push(filename);
        Ok(url)
    }

    /// Retrieves the rendered report artifact for an analyzed file.
    pub async fn fetch_report(&self, filename: &str) -> Result<Vec<u8>, ClientError> {
        tracing::info!(filename, "Fetching analysis report");
        let response = self.http.get(self.report_url(filename)?).send().await?;
        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;
        tracing::info!(filename, size = bytes.len(), "Fetched analysis report");
        Ok(bytes.to_vec())
    }
}

/// Turns a non-success status into an [`HttpStatusError`].
async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or(body);
    tracing::error!(%status, message = %message, "Request rejected by server");
    Err(Box::new(HttpStatusError::new(status, message)))
}

async fn json_body<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = ensure_success(response).await?;
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::error!(error = ?e, "Malformed response body");
        format!("malformed response body: {e}").into()
    })
}

#[async_trait]
impl TransferClient for HttpClient {
    async fn send_part(&self, part: PartUpload) -> Result<TransferAck, ClientError> {
        tracing::debug!(
            session_id = %part.session_id,
            filename = %part.filename,
            offset = part.chunk.offset,
            length = part.chunk.length,
            whole_file = part.whole_file,
            "Uploading part"
        );
        let file_part = Part::bytes(part.payload).file_name(part.filename.clone());
        let mut form = Form::new()
            .part("file", file_part)
            .text("sessionId", part.session_id.to_string())
            .text("filename", part.filename.clone())
            .text("start", part.chunk.offset.to_string())
            .text("totalSize", part.chunk.total_size.to_string());
        if part.whole_file {
            form = form.text("isWholeFile", "true");
        }

        let response = self
            .http
            .post(self.url("upload-chunk"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, filename = %part.filename, "Transport error uploading part");
                e
            })?;
        json_body(response).await
    }

    async fn finalize(&self, req: FinalizeRequest) -> Result<FinalizeResponse, ClientError> {
        tracing::info!(session_id = %req.session_id, files = req.files.len(), "Finalizing upload session");
        let response = self
            .http
            .post(self.url("finalize-upload"))
            .json(&req)
            .send()
            .await?;
        json_body(response).await
    }

    async fn analyze(&self, req: AnalyzeRequest) -> Result<AnalyzeResponse, ClientError> {
        tracing::info!(files = req.files.len(), folder = %req.folder, "Submitting analysis request");
        let response = self
            .http
            .post(self.url("analyze"))
            .json(&req)
            .send()
            .await?;
        json_body(response).await
    }
}
