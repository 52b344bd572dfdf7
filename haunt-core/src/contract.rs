//! # contract: data types and seams of the upload pipeline
//!
//! This module defines the plain data that flows through a run (file descriptors, chunk
//! descriptors, endpoint request/response bodies) and the two traits the pipeline is
//! parameterised over:
//!
//! - [`TransferClient`]: the remote endpoints (chunk transfer, finalize, analyze).
//! - [`Preprocessor`]: the content transform applied before transfer.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall`; the generated `MockTransferClient` and
//! `MockPreprocessor` are exported when the `test-export-mocks` feature is on (default),
//! so integration tests in other crates can drive the coordinator deterministically.
//!
//! ## Wire names
//! Request/response bodies carry the exact field names of the remote service
//! (`sessionId`, `saved_files`, `has_errors`, ...). Renaming them breaks compatibility.

use std::path::PathBuf;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProcessError;
use crate::status::FileError;

/// Boxed error returned by transport implementations.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// Where a file's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Read from disk when the file is preprocessed.
    Path(PathBuf),
    /// Already in memory.
    Memory(Vec<u8>),
}

/// A file selected for upload. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    /// Size of the original content in bytes.
    pub size: u64,
    pub content: FileContent,
    pub media_type: String,
}

impl FileDescriptor {
    pub fn from_path(
        name: impl Into<String>,
        size: u64,
        path: impl Into<PathBuf>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            content: FileContent::Path(path.into()),
            media_type: media_type.into(),
        }
    }

    pub fn from_bytes(
        name: impl Into<String>,
        bytes: Vec<u8>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            content: FileContent::Memory(bytes),
            media_type: media_type.into(),
        }
    }
}

/// Transformed content ready for transfer. Its length, not the original size, is what
/// the chunk plan and finalize refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedContent {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// One contiguous byte range of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub offset: u64,
    pub length: u64,
    pub total_size: u64,
}

impl ChunkDescriptor {
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// A single transfer request: either one chunk or the whole payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartUpload {
    pub session_id: Uuid,
    pub filename: String,
    pub chunk: ChunkDescriptor,
    /// Set when the payload is sent in one request, so the receiver does not reassemble.
    pub whole_file: bool,
    pub payload: Vec<u8>,
}

/// Acknowledgment for a transfer request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAck {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedFile {
    pub filename: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub files: Vec<FinalizedFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeResponse {
    #[serde(default)]
    pub message: String,
    /// Canonical server-side paths of the reassembled files.
    pub saved_files: Vec<String>,
    #[serde(default)]
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub files: Vec<String>,
    pub folder: String,
    pub prompt: String,
}

/// Raw analyze response. Every field is optional so the driver, not the decoder,
/// decides whether a body is malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub analyzed_files: Option<Vec<String>>,
    #[serde(default)]
    pub error_files: Option<Vec<FileError>>,
    #[serde(default)]
    pub has_errors: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The remote endpoints consumed by a run.
///
/// Implementations map any non-success status or transport failure to `Err`; the
/// pipeline never retries.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TransferClient: Send + Sync {
    /// Send one chunk, or the whole payload when `part.whole_file` is set.
    async fn send_part(&self, part: PartUpload) -> Result<TransferAck, ClientError>;

    /// Confirm that every file of the session has been received.
    async fn finalize(&self, req: FinalizeRequest) -> Result<FinalizeResponse, ClientError>;

    /// Request analysis of the finalized files.
    async fn analyze(&self, req: AnalyzeRequest) -> Result<AnalyzeResponse, ClientError>;
}

/// Content transform applied to each file before transfer.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Preprocessor: Send + Sync {
    async fn annotate(&self, file: &FileDescriptor) -> Result<AnnotatedContent, ProcessError>;
}
