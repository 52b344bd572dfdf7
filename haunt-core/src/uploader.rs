//! # uploader: transmit one payload, whole or in ordered chunks
//!
//! A payload no larger than the configured chunk size is sent in a single request flagged
//! as whole-file. Larger payloads are split into fixed-size chunks sent one at a time in
//! increasing offset order, so the receiver can append without reordering.
//!
//! Progress is recorded in the caller's [`ProgressTracker`] after each acknowledgment and
//! reaches 100 only when the last request is acknowledged. Any failure stops the file
//! immediately with a [`TransferError`]; there is no retry.

use std::num::NonZeroU64;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{format_size, TransferConfig};
use crate::contract::{AnnotatedContent, ChunkDescriptor, PartUpload, TransferAck, TransferClient};
use crate::error::TransferError;
use crate::progress::{percent_of, FileKey, ProgressTracker};
use crate::status::{EventSink, PipelineEvent};

/// Splits `total` bytes into the ranges that will be sent.
///
/// A payload of at most `chunk_size` bytes (including an empty one) yields a single range
/// starting at 0. Otherwise ranges are `chunk_size` long except possibly the last, and
/// together cover `[0, total)` exactly once.
pub fn plan_chunks(total: u64, chunk_size: NonZeroU64) -> Vec<ChunkDescriptor> {
    let chunk_size = chunk_size.get();
    if total <= chunk_size {
        return vec![ChunkDescriptor {
            offset: 0,
            length: total,
            total_size: total,
        }];
    }
    let mut chunks = Vec::with_capacity(total.div_ceil(chunk_size) as usize);
    let mut offset = 0;
    while offset < total {
        let length = chunk_size.min(total - offset);
        chunks.push(ChunkDescriptor {
            offset,
            length,
            total_size: total,
        });
        offset += length;
    }
    chunks
}

pub struct ChunkUploader<'a, C: TransferClient + ?Sized> {
    client: &'a C,
    config: TransferConfig,
}

impl<'a, C: TransferClient + ?Sized> ChunkUploader<'a, C> {
    pub fn new(client: &'a C, config: TransferConfig) -> Self {
        Self { client, config }
    }

    /// Sends `content` for the file identified by `key`, returning the last acknowledgment.
    pub async fn send(
        &self,
        session_id: Uuid,
        key: &FileKey,
        content: &AnnotatedContent,
        tracker: &mut ProgressTracker,
        events: &EventSink,
    ) -> Result<TransferAck, TransferError> {
        let total = content.bytes.len() as u64;
        let plan = plan_chunks(total, self.config.chunk_size);
        let whole_file = plan.len() == 1;
        tracker.register(key.clone());

        if whole_file {
            info!(file = %key.name, size = %format_size(total), "[TRANSFER] Sending file whole");
        } else {
            info!(
                file = %key.name,
                size = %format_size(total),
                chunks = plan.len(),
                "[TRANSFER] Sending file in chunks"
            );
        }

        let mut last_ack = TransferAck::default();
        for chunk in plan {
            let start = chunk.offset as usize;
            let end = chunk.end() as usize;
            let part = PartUpload {
                session_id,
                filename: key.name.clone(),
                chunk,
                whole_file,
                payload: content.bytes[start..end].to_vec(),
            };

            last_ack = self.client.send_part(part).await.map_err(|e| {
                error!(file = %key.name, offset = chunk.offset, error = %e, "[TRANSFER][ERROR] Request failed");
                TransferError {
                    filename: key.name.clone(),
                    offset: chunk.offset,
                    cause: e,
                }
            })?;

            let percent = tracker.advance(key, percent_of(chunk.end(), total));
            debug!(
                file = %key.name,
                offset = chunk.offset,
                length = chunk.length,
                percent,
                "[TRANSFER] Chunk acknowledged"
            );
            events.emit(PipelineEvent::Progress {
                file: key.clone(),
                percent,
            });
        }

        info!(file = %key.name, "[TRANSFER] File transfer complete");
        Ok(last_ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockTransferClient;
    use std::sync::{Arc, Mutex};

    const MB: u64 = 1024 * 1024;

    fn size(n: u64) -> NonZeroU64 {
        NonZeroU64::new(n).unwrap()
    }

    fn key(name: &str, size: u64) -> FileKey {
        FileKey {
            position: 0,
            name: name.to_string(),
            size,
        }
    }

    fn content(len: usize) -> AnnotatedContent {
        AnnotatedContent {
            bytes: (0..len).map(|i| (i % 251) as u8).collect(),
            media_type: "text/plain".into(),
        }
    }

    /// Mock that records every request it receives.
    fn recording_client() -> (MockTransferClient, Arc<Mutex<Vec<PartUpload>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut client = MockTransferClient::new();
        client.expect_send_part().returning(move |part| {
            sink.lock().unwrap().push(part);
            Ok(TransferAck {
                message: "ok".into(),
            })
        });
        (client, seen)
    }

    #[test]
    fn plan_covers_payload_exactly() {
        for (total, chunk) in [(25u64, 10u64), (30, 10), (31, 10), (1, 1), (1000, 7)] {
            let plan = plan_chunks(total, size(chunk));
            let mut expected_offset = 0;
            for c in &plan {
                assert_eq!(c.offset, expected_offset, "total={total} chunk={chunk}");
                assert!(c.length > 0 && c.length <= chunk);
                assert!(c.end() <= total);
                assert_eq!(c.total_size, total);
                expected_offset = c.end();
            }
            assert_eq!(expected_offset, total);
        }
    }

    #[test]
    fn plan_for_small_or_empty_payload_is_single_range() {
        assert_eq!(
            plan_chunks(0, size(10)),
            vec![ChunkDescriptor {
                offset: 0,
                length: 0,
                total_size: 0
            }]
        );
        assert_eq!(plan_chunks(10, size(10)).len(), 1);
        assert_eq!(plan_chunks(11, size(10)).len(), 2);
    }

    #[tokio::test]
    async fn small_file_is_sent_once_flagged_whole() {
        let (client, seen) = recording_client();
        let uploader = ChunkUploader::new(&client, TransferConfig::new(size(64)));
        let mut tracker = ProgressTracker::new();
        let k = key("a.py", 40);
        let session = Uuid::new_v4();

        uploader
            .send(session, &k, &content(40), &mut tracker, &EventSink::none())
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].whole_file);
        assert_eq!(seen[0].chunk.offset, 0);
        assert_eq!(seen[0].chunk.total_size, 40);
        assert_eq!(seen[0].session_id, session);
        assert_eq!(seen[0].filename, "a.py");
        assert_eq!(tracker.get(&k), Some(100));
    }

    #[tokio::test]
    async fn twenty_five_megabytes_split_into_three_chunks() {
        let (client, seen) = recording_client();
        let uploader = ChunkUploader::new(&client, TransferConfig::new(size(10 * MB)));
        let mut tracker = ProgressTracker::new();
        let k = key("big.js", 25 * MB);
        let payload = content((25 * MB) as usize);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        uploader
            .send(Uuid::new_v4(), &k, &payload, &mut tracker, &EventSink::new(tx))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let lengths: Vec<u64> = seen.iter().map(|p| p.chunk.length).collect();
        assert_eq!(lengths, vec![10 * MB, 10 * MB, 5 * MB]);
        assert!(seen.iter().all(|p| !p.whole_file));
        let offsets: Vec<u64> = seen.iter().map(|p| p.chunk.offset).collect();
        assert_eq!(offsets, vec![0, 10 * MB, 20 * MB]);

        let mut reassembled = Vec::new();
        for p in seen.iter() {
            reassembled.extend_from_slice(&p.payload);
        }
        assert!(reassembled == payload.bytes);

        let mut readings = Vec::new();
        while let Ok(PipelineEvent::Progress { percent, .. }) = rx.try_recv() {
            readings.push(percent);
        }
        assert_eq!(readings, vec![40, 80, 100]);
    }

    #[tokio::test]
    async fn progress_reaches_100_only_on_last_chunk() {
        let (client, _seen) = recording_client();
        let uploader = ChunkUploader::new(&client, TransferConfig::new(size(3)));
        let mut tracker = ProgressTracker::new();
        let k = key("c.ts", 10);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        uploader
            .send(Uuid::new_v4(), &k, &content(10), &mut tracker, &EventSink::new(tx))
            .await
            .unwrap();

        let mut readings = Vec::new();
        while let Ok(PipelineEvent::Progress { percent, .. }) = rx.try_recv() {
            readings.push(percent);
        }
        assert_eq!(readings, vec![30, 60, 90, 100]);
        assert!(readings.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(readings.iter().filter(|p| **p == 100).count(), 1);
    }

    #[tokio::test]
    async fn failure_reports_failing_offset_and_stops() {
        let mut client = MockTransferClient::new();
        let calls = Arc::new(Mutex::new(0usize));
        let counter = calls.clone();
        client.expect_send_part().returning(move |part| {
            *counter.lock().unwrap() += 1;
            if part.chunk.offset == 20 {
                Err("HTTP 500".into())
            } else {
                Ok(TransferAck::default())
            }
        });
        let uploader = ChunkUploader::new(&client, TransferConfig::new(size(10)));
        let mut tracker = ProgressTracker::new();
        let k = key("d.php", 45);

        let err = uploader
            .send(Uuid::new_v4(), &k, &content(45), &mut tracker, &EventSink::none())
            .await
            .unwrap_err();

        assert_eq!(err.filename, "d.php");
        assert_eq!(err.offset, 20);
        assert_eq!(err.cause.to_string(), "HTTP 500");
        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(tracker.get(&k), Some(44));
        assert!(!tracker.is_complete(&k));
    }
}
