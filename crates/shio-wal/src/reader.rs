//! Offset-addressed replay reads spanning segments.

use crate::config::WalConfig;
use crate::error::{Error, Result};
use crate::frame::{self, Frame};
use crate::segment::{list_segments, SegmentFile};
use bytes::Bytes;
use std::path::Path;
use tokio::fs::File;
use tokio::io::BufReader;

/// Buffered frame reader over one segment file.
pub(crate) struct SegmentReader {
    reader: BufReader<File>,
}

impl SegmentReader {
    pub(crate) async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            reader: BufReader::new(file),
        })
    }

    pub(crate) async fn next_frame(&mut self) -> Result<Frame> {
        frame::read_frame(&mut self.reader).await
    }
}

/// Reads every record from `from_offset` forward to the tail.
///
/// The covering segment is the last one whose `start_offset` is at or below
/// `from_offset`; earlier records inside it are decoded and discarded. When
/// `from_offset` predates the earliest surviving segment (its segment was
/// retention-deleted), the replay silently begins at the earliest record
/// still on disk.
pub(crate) async fn read(config: &WalConfig, from_offset: u64) -> Result<Vec<Bytes>> {
    let segments = list_segments(&config.root, &config.file_name).await?;
    let Some(covering) = covering_segment(&segments, from_offset) else {
        return Ok(Vec::new());
    };

    let to_skip = from_offset.saturating_sub(segments[covering].name.start_offset);
    let last = segments.len() - 1;
    let mut payloads = Vec::new();

    for (index, segment) in segments.iter().enumerate().skip(covering) {
        let is_last = index == last;
        let mut reader = SegmentReader::open(&segment.path).await?;

        if index == covering {
            for _ in 0..to_skip {
                match reader.next_frame().await? {
                    Frame::Complete(_) => {}
                    // Requested offset is past the end of the log.
                    Frame::Eof => return Ok(Vec::new()),
                    Frame::Truncated if is_last => return Ok(Vec::new()),
                    Frame::Truncated => return Err(corrupt(segment)),
                }
            }
        }

        loop {
            match reader.next_frame().await? {
                Frame::Complete(payload) => payloads.push(payload),
                Frame::Eof => break,
                // A partial frame at the very end of the log marks where a
                // crash cut it off; anywhere else it is corruption.
                Frame::Truncated if is_last => break,
                Frame::Truncated => return Err(corrupt(segment)),
            }
        }
    }

    Ok(payloads)
}

fn covering_segment(segments: &[SegmentFile], from_offset: u64) -> Option<usize> {
    if segments.is_empty() {
        return None;
    }
    Some(
        segments
            .iter()
            .rposition(|s| s.name.start_offset <= from_offset)
            .unwrap_or(0),
    )
}

fn corrupt(segment: &SegmentFile) -> Error {
    Error::Corrupt {
        segment: segment.path.display().to_string(),
        detail: "partial frame before the end of the log".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::SegmentName;
    use std::path::PathBuf;

    fn segment(id: u64, start: u64) -> SegmentFile {
        SegmentFile {
            name: SegmentName::new(id, start),
            path: PathBuf::new(),
        }
    }

    #[test]
    fn test_covering_segment_picks_last_at_or_below() {
        let segments = vec![segment(0, 0), segment(1, 4), segment(2, 8)];
        assert_eq!(covering_segment(&segments, 0), Some(0));
        assert_eq!(covering_segment(&segments, 3), Some(0));
        assert_eq!(covering_segment(&segments, 4), Some(1));
        assert_eq!(covering_segment(&segments, 7), Some(1));
        assert_eq!(covering_segment(&segments, 100), Some(2));
    }

    #[test]
    fn test_covering_segment_below_earliest_serves_earliest() {
        let segments = vec![segment(3, 12), segment(4, 16)];
        assert_eq!(covering_segment(&segments, 2), Some(0));
    }

    #[test]
    fn test_covering_segment_empty() {
        assert_eq!(covering_segment(&[], 0), None);
    }
}
