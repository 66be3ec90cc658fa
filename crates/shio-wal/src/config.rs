//! Log configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Byte cap per segment before rotation (5 MiB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
/// Retention cap on the number of segment files.
pub const DEFAULT_MAX_NUM_SEGMENTS: usize = 10;
/// Buffered bytes that trigger a background fsync.
pub const DEFAULT_MAX_SYNC_SIZE: u64 = 1024;

/// Configuration for a [`Wal`](crate::Wal).
///
/// `root` and `file_name` have no meaningful defaults; [`WalConfig::new`]
/// fills in the numeric defaults around them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalConfig {
    /// Directory holding the segment files. Created on first open.
    pub root: PathBuf,
    /// Segment file name prefix within `root`.
    pub file_name: String,
    /// Byte cap per segment; the tail rotates before a write would push it
    /// past this size.
    pub max_log_size: u64,
    /// Retention cap; the oldest segment is deleted once the segment count
    /// exceeds this.
    pub max_num_segments: usize,
    /// Buffered bytes that trigger a background fsync.
    pub max_sync_size: u64,
}

impl WalConfig {
    /// Creates a configuration with default sizing policies.
    pub fn new(root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            file_name: file_name.into(),
            max_log_size: DEFAULT_MAX_LOG_SIZE,
            max_num_segments: DEFAULT_MAX_NUM_SEGMENTS,
            max_sync_size: DEFAULT_MAX_SYNC_SIZE,
        }
    }

    /// Validates the configuration, returning an error if invalid.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("root must not be empty".to_string()));
        }
        if self.file_name.is_empty() {
            return Err(Error::InvalidConfig(
                "file_name must not be empty".to_string(),
            ));
        }
        if self.max_log_size == 0 {
            return Err(Error::InvalidConfig(
                "max_log_size must be greater than 0".to_string(),
            ));
        }
        if self.max_num_segments == 0 {
            return Err(Error::InvalidConfig(
                "max_num_segments must be greater than 0".to_string(),
            ));
        }
        if self.max_sync_size == 0 {
            return Err(Error::InvalidConfig(
                "max_sync_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
