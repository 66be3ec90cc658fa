//! High-level WAL (Write-Ahead Log) API.
//!
//! Provides a simple interface for append-only logging with automatic
//! recovery, segment rotation, bounded retention, and background
//! durability.

use crate::config::WalConfig;
use crate::error::Result;
use crate::reader;
use crate::recovery::{self, RecoveryInfo};
use crate::segment::SegmentManager;
use crate::worker;
use bytes::Bytes;
use shio_observe::{Meter, NoopMeter};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Append-only log with automatic recovery and rotation.
///
/// One producer task appends; a background worker makes the buffered bytes
/// durable on size- and time-based triggers. Replay reads serve any
/// still-retained logical offset forward to the tail.
///
/// # Example
///
/// ```no_run
/// use shio_wal::{Wal, WalConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = WalConfig::new("./data/wal", "wal");
///     let (wal, recovery_info) = Wal::open(config).await?;
///
///     println!("recovered up to offset {}", recovery_info.next_offset);
///
///     wal.append(b"hello world").await?;
///     wal.sync().await?;
///
///     let records = wal.read(0).await?;
///     assert_eq!(&records[0][..], b"hello world");
///
///     wal.close().await?;
///     Ok(())
/// }
/// ```
pub struct Wal {
    manager: Arc<SegmentManager>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
    config: WalConfig,
}

impl Wal {
    /// Opens a log, performing recovery if `root` already holds segments.
    pub async fn open(config: WalConfig) -> Result<(Self, RecoveryInfo)> {
        Self::open_with_meter(config, Arc::new(NoopMeter)).await
    }

    /// Opens a log with a custom observability meter.
    pub async fn open_with_meter(
        config: WalConfig,
        meter: Arc<dyn Meter>,
    ) -> Result<(Self, RecoveryInfo)> {
        config.validate()?;

        let (recovered, info) = recovery::recover(&config, &meter).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Arc::new(SegmentManager::new(config.clone(), recovered, tx, meter));
        let worker = worker::spawn(Arc::downgrade(&manager), rx);

        Ok((
            Self {
                manager,
                worker: parking_lot::Mutex::new(Some(worker)),
                config,
            },
            info,
        ))
    }

    /// Appends one record, returning the logical offset it was assigned.
    ///
    /// The record is buffered; it becomes durable on the next size- or
    /// time-triggered background fsync, or on an explicit [`sync`](Self::sync).
    pub async fn append(&self, payload: &[u8]) -> Result<u64> {
        self.manager.append(payload).await
    }

    /// Reads every record from `from_offset` forward, in offset order.
    ///
    /// Records buffered but not yet flushed are not visible. An offset below
    /// the earliest retained segment replays from the earliest record still
    /// on disk; `read(offset())` returns an empty vector.
    pub async fn read(&self, from_offset: u64) -> Result<Vec<Bytes>> {
        reader::read(&self.config, from_offset).await
    }

    /// Flushes buffered records to the OS without fsync.
    pub async fn flush(&self) -> Result<()> {
        self.manager.flush().await
    }

    /// Flushes buffered records and fsyncs the tail file.
    ///
    /// When this returns, every previously appended record is durable.
    pub async fn sync(&self) -> Result<()> {
        self.manager.sync().await
    }

    /// Next logical offset to be assigned — the count of records ever
    /// accepted into the log.
    pub fn offset(&self) -> u64 {
        self.manager.offset()
    }

    /// Returns the log configuration.
    pub fn config(&self) -> &WalConfig {
        &self.config
    }

    /// Flushes, fsyncs, closes the tail file, and stops the worker.
    ///
    /// Idempotent. Appends and syncs after close fail with
    /// [`Error::Closed`](crate::Error::Closed).
    pub async fn close(&self) -> Result<()> {
        self.manager.close().await?;
        self.join_worker().await;
        Ok(())
    }

    /// Closes the tail file and unlinks the whole log directory.
    pub async fn close_and_remove(&self) -> Result<()> {
        self.manager.close_and_remove().await?;
        self.join_worker().await;
        Ok(())
    }

    async fn join_worker(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
