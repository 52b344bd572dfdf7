use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::contract::{AnnotatedContent, FileContent, FileDescriptor, Preprocessor};
use crate::error::ProcessError;

/// Separator between the line number and the original line.
pub const LINE_SEPARATOR: &str = ": ";

/// Prefixes every line of textual content with its 1-based line number, so analysis
/// findings can refer back to exact lines.
///
/// Content that is not valid UTF-8 is passed through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineNumberAnnotator;

impl LineNumberAnnotator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Preprocessor for LineNumberAnnotator {
    async fn annotate(&self, file: &FileDescriptor) -> Result<AnnotatedContent, ProcessError> {
        let raw = read_content(file).await?;
        let bytes = match String::from_utf8(raw) {
            Ok(text) => {
                let numbered = number_lines(&text);
                info!(
                    filename = %file.name,
                    lines = text.lines().count(),
                    "Added line numbers to file"
                );
                numbered.into_bytes()
            }
            Err(e) => {
                warn!(filename = %file.name, error = %e.utf8_error(), "Content is not UTF-8 text, sending unchanged");
                e.into_bytes()
            }
        };
        Ok(AnnotatedContent {
            bytes,
            media_type: file.media_type.clone(),
        })
    }
}

/// Materializes the full content of a file.
async fn read_content(file: &FileDescriptor) -> Result<Vec<u8>, ProcessError> {
    match &file.content {
        FileContent::Memory(bytes) => Ok(bytes.clone()),
        FileContent::Path(path) => {
            debug!(path = %path.display(), "Reading file content");
            tokio::fs::read(path).await.map_err(|e| {
                error!(error = ?e, path = %path.display(), "Failed to read file content");
                ProcessError::Io {
                    path: path.display().to_string(),
                    source: e,
                }
            })
        }
    }
}

/// Numbers each line right-aligned to width 4, keeping the original line endings.
pub fn number_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8 + 8);
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        out.push_str(&format!("{:>4}{}{}", idx + 1, LINE_SEPARATOR, line));
    }
    out
}
