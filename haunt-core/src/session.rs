//! High-level pipeline: orchestrates preprocess → transfer → finalize → analyze for one run.
//!
//! # Responsibilities
//! - Allocates a fresh [`Session`] per run (random UUID, never reused)
//! - Uploads files strictly one after another; chunks of one file never interleave with another's
//! - Fail-fast upload stage: the first failing file stops the run, later files are never
//!   attempted and finalize is not called
//! - Exactly one finalize call per run whose transfers all succeeded
//! - Tolerant analysis stage: a partial result is recorded, not escalated
//! - Aggregates everything into a [`StatusModel`], also emitted as the final [`PipelineEvent`]
//!
//! # Error Handling
//! Terminal errors are [`PipelineError`] values; [`SessionCoordinator::run`] folds them into
//! the returned status so callers always receive a status model.

use std::time::SystemTime;

use tracing::{error, info};
use uuid::Uuid;

use crate::analysis::AnalysisDriver;
use crate::config::TransferConfig;
use crate::contract::{FileDescriptor, FinalizeRequest, FinalizedFile, Preprocessor, TransferClient};
use crate::error::{PipelineError, TransferError};
use crate::progress::{FileKey, ProgressTracker};
use crate::status::{EventSink, PipelineEvent, StatusModel};
use crate::uploader::ChunkUploader;

/// Groups the files of one run.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub files: Vec<FileKey>,
    pub created_at: SystemTime,
}

impl Session {
    fn start(files: &[FileDescriptor]) -> Self {
        Self {
            id: Uuid::new_v4(),
            files: files
                .iter()
                .enumerate()
                .map(|(position, f)| FileKey {
                    position,
                    name: f.name.clone(),
                    size: f.size,
                })
                .collect(),
            created_at: SystemTime::now(),
        }
    }
}

/// One queued file of a run.
struct FileUploadTask<'f> {
    key: FileKey,
    file: &'f FileDescriptor,
}

pub struct SessionCoordinator<C, P> {
    client: C,
    preprocessor: P,
    config: TransferConfig,
    events: EventSink,
}

impl<C, P> SessionCoordinator<C, P>
where
    C: TransferClient,
    P: Preprocessor,
{
    pub fn new(client: C, preprocessor: P, config: TransferConfig) -> Self {
        Self {
            client,
            preprocessor,
            config,
            events: EventSink::none(),
        }
    }

    /// Attaches an observer for progress and stage events.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Runs the full pipeline over `files` and returns the aggregate status.
    pub async fn run(&self, files: &[FileDescriptor]) -> StatusModel {
        let mut progress = ProgressTracker::new();
        let status = match self.upload_all(files, &mut progress).await {
            Err(e) => StatusModel::failed(&e, false),
            Ok((saved_files, folder)) => self.analyze(&saved_files, &folder).await,
        };
        self.events.emit(PipelineEvent::Finished(status.clone()));
        status
    }

    /// Upload stage: transfers every file in order, then finalizes the session.
    /// Returns the canonical saved paths and folder reported by finalize.
    async fn upload_all(
        &self,
        files: &[FileDescriptor],
        progress: &mut ProgressTracker,
    ) -> Result<(Vec<String>, String), PipelineError> {
        if files.is_empty() {
            error!("[SESSION][ERROR] Run started without files");
            return Err(PipelineError::Selection);
        }

        let session = Session::start(files);
        info!(session_id = %session.id, files = files.len(), "[SESSION] Starting upload session");
        self.events.emit(PipelineEvent::SessionStarted {
            session_id: session.id,
            files: files.len(),
        });

        let tasks: Vec<FileUploadTask<'_>> = session
            .files
            .iter()
            .cloned()
            .zip(files)
            .map(|(key, file)| FileUploadTask { key, file })
            .collect();
        for task in &tasks {
            progress.register(task.key.clone());
        }

        let uploader = ChunkUploader::new(&self.client, self.config);
        let mut finalized = Vec::with_capacity(tasks.len());
        for task in &tasks {
            let content = self.preprocessor.annotate(task.file).await.map_err(|e| {
                error!(file = %task.key.name, error = %e, "[SESSION][ERROR] Preprocessing failed");
                TransferError {
                    filename: task.key.name.clone(),
                    offset: 0,
                    cause: Box::new(e),
                }
            })?;

            uploader
                .send(session.id, &task.key, &content, progress, &self.events)
                .await
                .map_err(|e| {
                    error!(session_id = %session.id, error = %e, "[SESSION][ERROR] Aborting run after failed transfer");
                    e
                })?;

            finalized.push(FinalizedFile {
                filename: task.key.name.clone(),
                size: content.bytes.len() as u64,
            });
        }

        info!(session_id = %session.id, "[SESSION] All files transferred, finalizing");
        let response = self
            .client
            .finalize(FinalizeRequest {
                session_id: session.id,
                files: finalized,
            })
            .await
            .map_err(|e| {
                error!(session_id = %session.id, error = %e, "[SESSION][ERROR] Finalize failed");
                PipelineError::Finalize(e.to_string())
            })?;

        info!(
            session_id = %session.id,
            saved = response.saved_files.len(),
            folder = %response.folder,
            message = %response.message,
            "[SESSION] Session finalized"
        );
        self.events.emit(PipelineEvent::Finalized {
            saved_files: response.saved_files.clone(),
            folder: response.folder.clone(),
        });
        Ok((response.saved_files, response.folder))
    }

    /// Analysis stage. Uploads are already complete, so the status keeps `uploaded=true`
    /// even on total failure.
    async fn analyze(&self, saved_files: &[String], folder: &str) -> StatusModel {
        self.events.emit(PipelineEvent::AnalysisStarted {
            files: saved_files.len(),
        });
        let mut driver = AnalysisDriver::new(&self.client);
        match driver.analyze(saved_files, folder).await {
            Ok(outcome) => {
                let message = if outcome.is_partial() {
                    format!(
                        "Uploaded {} file(s); analysis failed for {} of them",
                        saved_files.len(),
                        outcome.errors.len()
                    )
                } else {
                    format!("Uploaded and analyzed {} file(s)", outcome.results.len())
                };
                StatusModel {
                    uploaded: true,
                    analyzed: true,
                    message,
                    results: outcome.results,
                    errors: outcome.errors,
                }
            }
            Err(reason) => StatusModel::failed(&PipelineError::Analysis(reason), true),
        }
    }
}
