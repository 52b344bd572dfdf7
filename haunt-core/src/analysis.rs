//! # analysis: drive the analysis stage over a finalized session
//!
//! One request covers every saved file. The response is classified into:
//!
//! - total failure: transport error, non-success status, an `error` body, or a body that
//!   does not carry the expected fields. Returned as `Err`.
//! - partial failure: some files are listed in `error_files`. Returned as `Ok`; the failed
//!   files are recorded next to the successful ones. A partial result is not a run failure.
//! - full success: every file analyzed, no errors.
//!
//! The stage never retries.

use tracing::{error, info, warn};

use crate::contract::{AnalyzeRequest, AnalyzeResponse, TransferClient};
use crate::progress::ProgressTracker;
use crate::status::FileError;

/// Review instruction sent with every analysis request.
pub const ANALYSIS_INSTRUCTION: &str = "Analyze these code files thoroughly for sensitive information and security vulnerabilities. \
Report security issues with their line numbers, hardcoded credentials such as API keys, passwords and tokens, \
and any other sensitive data such as personal information or internal endpoints. \
Then suggest improvements to code quality and performance.";

/// Result of a classified analysis response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    /// Filenames analyzed successfully.
    pub results: Vec<String>,
    /// Files the service failed to analyze.
    pub errors: Vec<FileError>,
}

impl AnalysisOutcome {
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Per-file view: one entry per analyzed or failed file.
    pub fn per_file(&self) -> Vec<AnalysisResult> {
        let ok = self.results.iter().map(|f| AnalysisResult {
            filename: f.clone(),
            outcome: FileOutcome::Success,
        });
        let failed = self.errors.iter().map(|e| AnalysisResult {
            filename: e.filename.clone(),
            outcome: FileOutcome::Error(e.error.clone()),
        });
        ok.chain(failed).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Success,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub filename: String,
    pub outcome: FileOutcome,
}

pub struct AnalysisDriver<'a, C: TransferClient + ?Sized> {
    client: &'a C,
    progress: ProgressTracker<String>,
}

impl<'a, C: TransferClient + ?Sized> AnalysisDriver<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            progress: ProgressTracker::new(),
        }
    }

    /// Analysis progress per saved path: 0 while the request is outstanding, 100 once
    /// the response has been classified.
    pub fn progress(&self) -> &ProgressTracker<String> {
        &self.progress
    }

    /// Sends one analysis request for `saved_files` in `folder` and classifies the reply.
    /// The error string describes a total failure.
    pub async fn analyze(
        &mut self,
        saved_files: &[String],
        folder: &str,
    ) -> Result<AnalysisOutcome, String> {
        for path in saved_files {
            self.progress.register(path.clone());
        }
        info!(files = saved_files.len(), folder, "[ANALYZE] Requesting analysis");

        let req = AnalyzeRequest {
            files: saved_files.to_vec(),
            folder: folder.to_string(),
            prompt: ANALYSIS_INSTRUCTION.to_string(),
        };
        let response = self.client.analyze(req).await.map_err(|e| {
            error!(error = %e, "[ANALYZE][ERROR] Analysis request failed");
            e.to_string()
        })?;

        let outcome = classify(response).map_err(|reason| {
            error!(reason = %reason, "[ANALYZE][ERROR] Analysis response rejected");
            reason
        })?;

        for path in saved_files {
            self.progress.advance(path, 100);
        }
        if outcome.is_partial() {
            for e in &outcome.errors {
                warn!(file = %e.filename, error = %e.error, "[ANALYZE] File analysis failed");
            }
            info!(
                analyzed = outcome.results.len(),
                failed = outcome.errors.len(),
                "[ANALYZE] Analysis completed with errors"
            );
        } else {
            info!(analyzed = outcome.results.len(), "[ANALYZE] Analysis completed");
        }
        Ok(outcome)
    }
}

/// Classifies a decoded analyze response. `Err` means total failure.
pub fn classify(response: AnalyzeResponse) -> Result<AnalysisOutcome, String> {
    if let Some(err) = response.error {
        return Err(err);
    }
    let results = response
        .analyzed_files
        .ok_or_else(|| "malformed analysis response: missing analyzed_files".to_string())?;
    let errors = response.error_files.unwrap_or_default();
    if response.has_errors == Some(true) && errors.is_empty() {
        return Err("malformed analysis response: has_errors set without error_files".to_string());
    }
    Ok(AnalysisOutcome { results, errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockTransferClient;

    fn file_error(filename: &str, error: &str) -> FileError {
        FileError {
            filename: filename.into(),
            error: error.into(),
        }
    }

    #[test]
    fn full_success() {
        let outcome = classify(AnalyzeResponse {
            analyzed_files: Some(vec!["a.py".into(), "b.py".into()]),
            error_files: Some(vec![]),
            has_errors: Some(false),
            error: None,
        })
        .unwrap();
        assert_eq!(outcome.results, vec!["a.py", "b.py"]);
        assert!(!outcome.is_partial());
    }

    #[test]
    fn partial_failure_is_not_an_error() {
        let outcome = classify(AnalyzeResponse {
            analyzed_files: Some(vec!["a.py".into()]),
            error_files: Some(vec![file_error("b.py", "timeout")]),
            has_errors: Some(true),
            error: None,
        })
        .unwrap();
        assert!(outcome.is_partial());
        assert_eq!(outcome.results, vec!["a.py"]);
        assert_eq!(outcome.errors, vec![file_error("b.py", "timeout")]);
        assert_eq!(
            outcome.per_file()[1],
            AnalysisResult {
                filename: "b.py".into(),
                outcome: FileOutcome::Error("timeout".into())
            }
        );
    }

    #[test]
    fn error_body_is_total_failure() {
        let err = classify(AnalyzeResponse {
            error: Some("model unavailable".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, "model unavailable");
    }

    #[test]
    fn missing_fields_are_malformed() {
        assert!(classify(AnalyzeResponse::default()).is_err());
        assert!(classify(AnalyzeResponse {
            analyzed_files: Some(vec![]),
            has_errors: Some(true),
            ..Default::default()
        })
        .is_err());
    }

    #[tokio::test]
    async fn sends_paths_folder_and_instruction_once() {
        let mut client = MockTransferClient::new();
        client
            .expect_analyze()
            .times(1)
            .withf(|req| {
                req.files == vec!["/srv/s1/files/a.py".to_string()]
                    && req.folder == "/srv/s1"
                    && req.prompt == ANALYSIS_INSTRUCTION
            })
            .returning(|_| {
                Ok(AnalyzeResponse {
                    analyzed_files: Some(vec!["a.py".into()]),
                    error_files: None,
                    has_errors: Some(false),
                    error: None,
                })
            });

        let mut driver = AnalysisDriver::new(&client);
        let saved = vec!["/srv/s1/files/a.py".to_string()];
        let outcome = driver.analyze(&saved, "/srv/s1").await.unwrap();
        assert_eq!(outcome.results, vec!["a.py"]);
        assert!(driver.progress().is_complete(&saved[0]));
    }

    #[tokio::test]
    async fn transport_failure_leaves_progress_at_zero() {
        let mut client = MockTransferClient::new();
        client
            .expect_analyze()
            .times(1)
            .returning(|_| Err("HTTP 502".into()));

        let mut driver = AnalysisDriver::new(&client);
        let saved = vec!["x.js".to_string(), "y.js".to_string()];
        let err = driver.analyze(&saved, "f").await.unwrap_err();
        assert_eq!(err, "HTTP 502");
        assert_eq!(driver.progress().len(), 2);
        assert!(driver.progress().iter().all(|(_, p)| p == 0));
    }
}
