//! Per-file completion tracking.
//!
//! Entries only move forward: an update lower than the stored value is ignored, and values
//! are clamped to 100. The tracker is owned by the coordinator and passed by `&mut` to the
//! active transfer, so there is a single writer at any time.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use tracing::debug;

/// Stable identity of a file within one run. Position disambiguates files that share a
/// name and size.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileKey {
    pub position: usize,
    pub name: String,
    pub size: u64,
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} ({} bytes)", self.position, self.name, self.size)
    }
}

/// Percent complete after `acknowledged_end` of `total` bytes have been acknowledged.
/// An empty payload is complete once acknowledged.
pub fn percent_of(acknowledged_end: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = acknowledged_end.min(total) as u128;
    (done * 100 / total as u128) as u8
}

#[derive(Debug, Clone)]
pub struct ProgressTracker<K = FileKey> {
    entries: HashMap<K, u8>,
}

impl<K> Default for ProgressTracker<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K> ProgressTracker<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry at 0 unless one already exists.
    pub fn register(&mut self, key: K) {
        self.entries.entry(key).or_insert(0);
    }

    /// Moves the entry forward to `percent` and returns the stored value.
    pub fn advance(&mut self, key: &K, percent: u8) -> u8 {
        let percent = percent.min(100);
        let entry = self.entries.entry(key.clone()).or_insert(0);
        if percent < *entry {
            debug!(key = ?key, current = *entry, ignored = percent, "Ignoring regressing progress update");
        } else {
            *entry = percent;
        }
        *entry
    }

    pub fn get(&self, key: &K) -> Option<u8> {
        self.entries.get(key).copied()
    }

    pub fn is_complete(&self, key: &K) -> bool {
        self.get(key) == Some(100)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u8)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }
}
