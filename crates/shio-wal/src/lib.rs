//! Append-only write-ahead log with recovery, rotation, and retention.
//!
//! Implements a durable segmented WAL with:
//! - Length-prefixed record framing (4-byte little-endian length + payload)
//! - Logical offsets carried in segment file names, no sidecar index
//! - Automatic tail rotation at a configurable segment size
//! - Bounded retention that deletes the oldest segment past a cap
//! - A background durability worker with size- and time-based fsync
//! - Crash recovery with partial-tail truncation
//! - Observability via shio-observe
//!
//! # Example
//!
//! ```no_run
//! use shio_wal::{Wal, WalConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WalConfig::new("./data/wal", "wal");
//!     let (wal, recovery_info) = Wal::open(config).await?;
//!
//!     println!("recovered {} tail records", recovery_info.tail_records);
//!
//!     let offset = wal.append(b"payload").await?;
//!     wal.sync().await?;
//!
//!     let records = wal.read(offset).await?;
//!     assert_eq!(&records[0][..], b"payload");
//!
//!     wal.close().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod filename;
pub mod frame;
mod reader;
pub mod recovery;
mod segment;
pub mod wal;
mod worker;

pub use config::WalConfig;
pub use error::{Error, Result};
pub use filename::SegmentName;
pub use recovery::RecoveryInfo;
pub use wal::Wal;
