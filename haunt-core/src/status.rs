//! Aggregate result of a run, as handed to the presentation layer.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::progress::FileKey;

/// A per-file failure, either from transfer or from the analysis stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub filename: String,
    pub error: String,
}

/// Externally observable outcome of one run. Created fresh per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusModel {
    pub uploaded: bool,
    pub analyzed: bool,
    pub message: String,
    /// Filenames the analysis stage reported as successfully analyzed.
    pub results: Vec<String>,
    pub errors: Vec<FileError>,
}

impl StatusModel {
    /// Status for a run that stopped on a terminal error.
    pub fn failed(err: &PipelineError, uploaded: bool) -> Self {
        let errors = match err {
            PipelineError::Transfer(t) => vec![FileError {
                filename: t.filename.clone(),
                error: t.cause.to_string(),
            }],
            _ => Vec::new(),
        };
        Self {
            uploaded,
            analyzed: false,
            message: err.to_string(),
            results: Vec::new(),
            errors,
        }
    }

    /// True when both stages completed, including a partial analysis.
    pub fn is_success(&self) -> bool {
        self.uploaded && self.analyzed
    }
}

/// Notifications emitted while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    SessionStarted { session_id: Uuid, files: usize },
    Progress { file: FileKey, percent: u8 },
    Finalized { saved_files: Vec<String>, folder: String },
    AnalysisStarted { files: usize },
    Finished(StatusModel),
}

/// Optional observer of [`PipelineEvent`]s. A dropped receiver is not an error.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<PipelineEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<PipelineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
