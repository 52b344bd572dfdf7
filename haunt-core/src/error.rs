use thiserror::Error;

use crate::contract::ClientError;

/// Failure transmitting one file. Carries the file, the offset of the failing request
/// and the underlying cause.
#[derive(Error, Debug)]
#[error("transfer of {filename} failed at offset {offset}: {cause}")]
pub struct TransferError {
    pub filename: String,
    pub offset: u64,
    #[source]
    pub cause: ClientError,
}

/// Failure preparing a file's content for transfer.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Other(String),
}

/// Terminal failures of a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no files selected")]
    Selection,

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("finalize failed: {0}")]
    Finalize(String),

    #[error("analysis failed: {0}")]
    Analysis(String),
}
