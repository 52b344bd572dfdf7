use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use tracing::{debug, info};

/// Default chunk length: 10 MiB.
pub const DEFAULT_CHUNK_SIZE: NonZeroU64 = match NonZeroU64::new(10 * 1024 * 1024) {
    Some(size) => size,
    None => panic!("chunk size must be non-zero"),
};

/// Transfer tuning. `chunk_size` is both the whole-file threshold and the length of each
/// chunk when a payload is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    pub chunk_size: NonZeroU64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TransferConfig {
    pub fn new(chunk_size: NonZeroU64) -> Self {
        Self { chunk_size }
    }

    pub fn trace_loaded(&self) {
        info!(chunk_size = self.chunk_size.get(), "Loaded TransferConfig");
        debug!(?self, "TransferConfig loaded (full debug)");
    }
}

/// Formats a byte count as B/KB/MB/GB with two decimals, for log output.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match bytes {
        b if b >= GB => format!("{:.2} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.2} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.2} KB", b as f64 / KB as f64),
        b => format!("{b} B"),
    }
}
