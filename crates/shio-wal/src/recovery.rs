//! Recovery: rebuild logical offset from on-disk state when a log opens.
//!
//! The file names carry each segment's `(segment_id, start_offset)`; the
//! tail's record count is rebuilt by scanning its frames. A partial frame at
//! the end of the tail is a crash marker: it is cut off so the next append
//! lands on a clean frame boundary.

use crate::config::WalConfig;
use crate::error::{Error, Result};
use crate::filename::SegmentName;
use crate::frame::{self, Frame};
use crate::segment::list_segments;
use shio_observe::{Meter, WalEvent};
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::BufReader;

/// What recovery found on disk.
#[derive(Debug, Clone)]
pub struct RecoveryInfo {
    /// Segment files present when the log opened.
    pub segments_on_disk: usize,
    /// Intact frames counted in the tail segment.
    pub tail_records: u64,
    /// Next logical offset to be assigned.
    pub next_offset: u64,
    /// Bytes of partial trailing frame cut off the tail (0 when clean).
    pub truncated_bytes: u64,
}

/// Tail state handed to the segment manager.
#[derive(Debug)]
pub(crate) struct RecoveredTail {
    pub file: File,
    pub segment_id: u64,
    pub segment_size: u64,
    pub next_offset: u64,
    pub segment_count: usize,
}

pub(crate) async fn recover(
    config: &WalConfig,
    meter: &Arc<dyn Meter>,
) -> Result<(RecoveredTail, RecoveryInfo)> {
    ensure_root(config).await?;

    let segments = list_segments(&config.root, &config.file_name).await?;
    let Some(tail) = segments.last() else {
        return fresh_log(config).await;
    };

    let (records, clean_len, disk_len) = scan_tail(&tail.path).await?;
    let truncated_bytes = disk_len - clean_len;
    if truncated_bytes > 0 {
        let file = OpenOptions::new().write(true).open(&tail.path).await?;
        file.set_len(clean_len).await?;
        file.sync_all().await?;
        tracing::warn!(
            segment_id = tail.name.segment_id,
            truncated_bytes,
            "cut partial frame off the tail segment"
        );
        meter.emit(WalEvent::TailTruncated {
            bytes: truncated_bytes,
        });
    }

    let next_offset = tail.name.start_offset + records;
    tracing::debug!(
        segments = segments.len(),
        segment_id = tail.name.segment_id,
        tail_records = records,
        next_offset,
        "recovered log"
    );

    let file = OpenOptions::new().append(true).open(&tail.path).await?;
    Ok((
        RecoveredTail {
            file,
            segment_id: tail.name.segment_id,
            segment_size: clean_len,
            next_offset,
            segment_count: segments.len(),
        },
        RecoveryInfo {
            segments_on_disk: segments.len(),
            tail_records: records,
            next_offset,
            truncated_bytes,
        },
    ))
}

/// Creates `root` if missing; rejects a non-directory.
async fn ensure_root(config: &WalConfig) -> Result<()> {
    match tokio::fs::metadata(&config.root).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::NotADirectory(config.root.clone())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tokio::fs::create_dir_all(&config.root).await?;
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Populates an empty root with segment 0 at offset 0.
async fn fresh_log(config: &WalConfig) -> Result<(RecoveredTail, RecoveryInfo)> {
    let name = SegmentName::new(0, 0);
    let path = config.root.join(name.file_name(&config.file_name));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;

    Ok((
        RecoveredTail {
            file,
            segment_id: 0,
            segment_size: 0,
            next_offset: 0,
            segment_count: 1,
        },
        RecoveryInfo {
            segments_on_disk: 0,
            tail_records: 0,
            next_offset: 0,
            truncated_bytes: 0,
        },
    ))
}

/// Counts intact frames in the tail. Returns `(records, clean_len,
/// disk_len)`; `clean_len` is the byte length of the intact prefix.
async fn scan_tail(path: &std::path::Path) -> Result<(u64, u64, u64)> {
    let file = File::open(path).await?;
    let disk_len = file.metadata().await?.len();
    let mut reader = BufReader::new(file);

    let mut records = 0u64;
    let mut clean_len = 0u64;
    loop {
        match frame::read_frame(&mut reader).await? {
            Frame::Complete(payload) => {
                records += 1;
                clean_len += frame::framed_len(payload.len());
            }
            Frame::Eof | Frame::Truncated => break,
        }
    }
    Ok((records, clean_len, disk_len))
}
