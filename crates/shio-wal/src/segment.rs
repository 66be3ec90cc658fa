//! Segment lifecycle: tail ownership, rotation, retention.
//!
//! The [`SegmentManager`] is the single owner of the tail segment. All
//! mutation of the tail (appends into the write buffer, flushes, rotation)
//! goes through one async mutex, which serializes the producer's appends
//! against the durability worker's syncs.

use crate::config::WalConfig;
use crate::error::{Error, Result};
use crate::filename::SegmentName;
use crate::frame;
use crate::recovery::RecoveredTail;
use crate::worker::Signal;
use bytes::BytesMut;
use shio_observe::{Meter, WalEvent};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;

/// A decoded segment file present on disk.
#[derive(Debug, Clone)]
pub(crate) struct SegmentFile {
    pub name: SegmentName,
    pub path: PathBuf,
}

/// Lists the segment files under `root` that carry `prefix`, sorted by
/// numeric segment id.
pub(crate) async fn list_segments(root: &Path, prefix: &str) -> Result<Vec<SegmentFile>> {
    let dotted = format!("{prefix}.");
    let mut segments = Vec::new();

    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !file_name.starts_with(&dotted) {
            continue;
        }
        segments.push(SegmentFile {
            name: SegmentName::parse(file_name)?,
            path: entry.path(),
        });
    }

    segments.sort_by_key(|s| s.name.segment_id);
    Ok(segments)
}

/// Mutable tail state. `file` is `None` once the log is closed.
struct Tail {
    file: Option<File>,
    buffer: BytesMut,
    segment_id: u64,
    segment_size: u64,
    next_offset: u64,
    segment_count: usize,
}

impl Tail {
    async fn flush(&mut self) -> Result<()> {
        let file = self.file.as_mut().ok_or(Error::Closed)?;
        if !self.buffer.is_empty() {
            file.write_all(&self.buffer).await?;
            self.buffer.clear();
        }
        Ok(())
    }

    async fn sync(&mut self) -> Result<()> {
        self.flush().await?;
        self.file.as_mut().ok_or(Error::Closed)?.sync_all().await?;
        Ok(())
    }
}

pub(crate) struct SegmentManager {
    config: WalConfig,
    tail: Mutex<Tail>,
    /// Mirror of `Tail::next_offset` so `offset()` never takes the lock.
    next_offset: AtomicU64,
    /// Signal channel to the durability worker. Taken on close so the
    /// worker sees end-of-stream and exits.
    signals: parking_lot::Mutex<Option<UnboundedSender<Signal>>>,
    /// First error the worker hit while syncing in the background. The next
    /// `append`/`sync` call takes and returns it.
    worker_error: parking_lot::Mutex<Option<Error>>,
    meter: Arc<dyn Meter>,
}

impl SegmentManager {
    pub(crate) fn new(
        config: WalConfig,
        recovered: RecoveredTail,
        signals: UnboundedSender<Signal>,
        meter: Arc<dyn Meter>,
    ) -> Self {
        Self {
            config,
            next_offset: AtomicU64::new(recovered.next_offset),
            tail: Mutex::new(Tail {
                file: Some(recovered.file),
                buffer: BytesMut::new(),
                segment_id: recovered.segment_id,
                segment_size: recovered.segment_size,
                next_offset: recovered.next_offset,
                segment_count: recovered.segment_count,
            }),
            signals: parking_lot::Mutex::new(Some(signals)),
            worker_error: parking_lot::Mutex::new(None),
            meter,
        }
    }

    pub(crate) fn max_sync_size(&self) -> u64 {
        self.config.max_sync_size
    }

    /// Appends one record to the tail buffer, rotating first if the framed
    /// record would push the segment past `max_log_size`.
    ///
    /// Returns the logical offset assigned to the record. No fsync happens
    /// on this path; durability comes from the worker or an explicit
    /// [`sync`](Self::sync).
    pub(crate) async fn append(&self, payload: &[u8]) -> Result<u64> {
        if payload.len() > frame::MAX_PAYLOAD {
            return Err(Error::RecordTooLarge { len: payload.len() });
        }
        self.take_worker_error()?;

        let mut tail = self.tail.lock().await;
        if tail.file.is_none() {
            return Err(Error::Closed);
        }

        let framed = frame::framed_len(payload.len());
        if tail.segment_size + framed > self.config.max_log_size {
            self.rotate(&mut tail).await?;
        }

        frame::encode_into(&mut tail.buffer, payload)?;
        self.signal(Signal::Appended(framed));
        tail.segment_size += framed;

        let offset = tail.next_offset;
        tail.next_offset += 1;
        self.next_offset.store(tail.next_offset, Ordering::Release);
        Ok(offset)
    }

    /// Seals the current tail and opens the next segment.
    ///
    /// Pending bytes are flushed and fsynced into the sealed segment before
    /// the worker's accumulator is reset, so the reset only clears bytes
    /// that are already durable.
    async fn rotate(&self, tail: &mut Tail) -> Result<()> {
        tail.sync().await?;
        self.signal(Signal::RotationReset);

        let name = SegmentName::new(tail.segment_id + 1, tail.next_offset);
        let path = self.config.root.join(name.file_name(&self.config.file_name));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        // Assigning drops (closes) the sealed file handle.
        tail.file = Some(file);
        tail.segment_id = name.segment_id;
        tail.segment_size = 0;
        tail.segment_count += 1;

        tracing::debug!(
            segment_id = name.segment_id,
            start_offset = name.start_offset,
            "rotated tail segment"
        );
        self.meter.emit(WalEvent::SegmentRoll {
            segment_id: name.segment_id,
            start_offset: name.start_offset,
        });

        if tail.segment_count > self.config.max_num_segments {
            self.trim_oldest(tail).await?;
        }
        Ok(())
    }

    /// Unlinks the segment with the lowest id.
    async fn trim_oldest(&self, tail: &mut Tail) -> Result<()> {
        let segments = list_segments(&self.config.root, &self.config.file_name).await?;
        let Some(oldest) = segments.first() else {
            return Ok(());
        };
        tokio::fs::remove_file(&oldest.path).await?;
        tail.segment_count -= 1;

        tracing::debug!(
            segment_id = oldest.name.segment_id,
            start_offset = oldest.name.start_offset,
            "retention deleted oldest segment"
        );
        self.meter.emit(WalEvent::SegmentGc {
            segment_id: oldest.name.segment_id,
        });
        Ok(())
    }

    /// Flushes the write buffer to the OS without fsync.
    pub(crate) async fn flush(&self) -> Result<()> {
        self.take_worker_error()?;
        self.tail.lock().await.flush().await
    }

    /// Flushes the write buffer and fsyncs the tail file.
    pub(crate) async fn sync(&self) -> Result<()> {
        self.take_worker_error()?;
        let mut tail = self.tail.lock().await;
        let start = Instant::now();
        tail.sync().await?;
        self.meter.emit(WalEvent::Fsync {
            micros: start.elapsed().as_micros() as u64,
        });
        Ok(())
    }

    /// Sync path for the durability worker: a closed log is not an error
    /// here, and the latched-error slot is left alone for the producer.
    pub(crate) async fn sync_from_worker(&self) -> Result<()> {
        let mut tail = self.tail.lock().await;
        if tail.file.is_none() {
            return Ok(());
        }
        let start = Instant::now();
        tail.sync().await?;
        self.meter.emit(WalEvent::Fsync {
            micros: start.elapsed().as_micros() as u64,
        });
        Ok(())
    }

    /// Next logical offset to be assigned.
    pub(crate) fn offset(&self) -> u64 {
        self.next_offset.load(Ordering::Acquire)
    }

    /// Flushes, fsyncs, closes the tail, and signals the worker to stop.
    /// Idempotent: closing a closed log is a no-op.
    pub(crate) async fn close(&self) -> Result<()> {
        let mut tail = self.tail.lock().await;
        if tail.file.is_none() {
            return Ok(());
        }
        tail.sync().await?;
        tail.file = None;
        self.signals.lock().take();
        Ok(())
    }

    /// Closes the tail without a final flush and unlinks the whole log
    /// directory.
    pub(crate) async fn close_and_remove(&self) -> Result<()> {
        {
            let mut tail = self.tail.lock().await;
            tail.file = None;
            self.signals.lock().take();
        }
        tokio::fs::remove_dir_all(&self.config.root).await?;
        Ok(())
    }

    pub(crate) fn latch_worker_error(&self, err: Error) {
        let mut slot = self.worker_error.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn take_worker_error(&self) -> Result<()> {
        match self.worker_error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn signal(&self, signal: Signal) {
        if let Some(tx) = self.signals.lock().as_ref() {
            let _ = tx.send(signal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_segments_sorts_numerically() {
        let dir = TempDir::new().unwrap();
        // Create out of creation-order and with mixed decimal widths.
        for (id, start) in [(10u64, 400u64), (2, 80), (9, 360)] {
            let name = SegmentName::new(id, start).file_name("wal");
            tokio::fs::write(dir.path().join(name), b"").await.unwrap();
        }
        // Unrelated files are ignored.
        tokio::fs::write(dir.path().join("other.txt"), b"")
            .await
            .unwrap();

        let segments = list_segments(dir.path(), "wal").await.unwrap();
        let ids: Vec<u64> = segments.iter().map(|s| s.name.segment_id).collect();
        assert_eq!(ids, vec![2, 9, 10]);
    }

    #[tokio::test]
    async fn test_list_segments_rejects_undecodable_names() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("wal.junk"), b"").await.unwrap();

        let err = list_segments(dir.path(), "wal").await.unwrap_err();
        assert!(matches!(err, Error::MalformedName(_)));
    }
}
