//! Segment file name codec.
//!
//! Segment files are named `<prefix>.<segment_id>.<start_offset>.log`. The
//! codec is pure; it performs no I/O. Parsing splits off the final three
//! dot-delimited components from the right, so prefixes may themselves
//! contain dots.

use crate::error::{Error, Result};

/// Extension shared by all segment files.
pub const SEGMENT_SUFFIX: &str = "log";

/// The `(segment_id, start_offset)` pair a segment file name carries.
///
/// Ordering is by `segment_id` then `start_offset` — numeric, never
/// lexicographic, so ids of different decimal widths sort correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentName {
    pub segment_id: u64,
    pub start_offset: u64,
}

impl SegmentName {
    pub fn new(segment_id: u64, start_offset: u64) -> Self {
        Self {
            segment_id,
            start_offset,
        }
    }

    /// Renders the file name for this segment under `prefix`.
    pub fn file_name(&self, prefix: &str) -> String {
        format!(
            "{}.{}.{}.{}",
            prefix, self.segment_id, self.start_offset, SEGMENT_SUFFIX
        )
    }

    /// Parses a segment file name back into its numeric fields.
    pub fn parse(file_name: &str) -> Result<Self> {
        let malformed = || Error::MalformedName(file_name.to_string());

        let mut parts = file_name.rsplitn(4, '.');
        let suffix = parts.next().ok_or_else(malformed)?;
        let start_offset = parts.next().ok_or_else(malformed)?;
        let segment_id = parts.next().ok_or_else(malformed)?;
        let prefix = parts.next().ok_or_else(malformed)?;

        if suffix != SEGMENT_SUFFIX || prefix.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            segment_id: segment_id.parse().map_err(|_| malformed())?,
            start_offset: start_offset.parse().map_err(|_| malformed())?,
        })
    }
}
