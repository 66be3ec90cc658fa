//! On-disk record framing.
//!
//! A frame is a 4-byte little-endian payload length followed by exactly that
//! many payload bytes. There is no header, footer, checksum, or magic. A
//! partial frame can therefore only appear at the end of a file, where it
//! marks the point a crash cut the log off.

use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Width of the length prefix.
pub const LEN_PREFIX: usize = 4;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD: usize = u32::MAX as usize;

/// On-disk size of a frame carrying `payload_len` bytes.
pub fn framed_len(payload_len: usize) -> u64 {
    LEN_PREFIX as u64 + payload_len as u64
}

/// Appends one frame to `buf`. Returns the framed length.
pub fn encode_into(buf: &mut BytesMut, payload: &[u8]) -> Result<u64> {
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::RecordTooLarge { len: payload.len() });
    }
    buf.reserve(LEN_PREFIX + payload.len());
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(payload);
    Ok(framed_len(payload.len()))
}

/// Outcome of pulling one frame off a reader.
#[derive(Debug)]
pub enum Frame {
    /// A complete frame.
    Complete(Bytes),
    /// Clean end of file on a frame boundary.
    Eof,
    /// The file ends inside the length prefix or inside the payload.
    Truncated,
}

/// Reads the next frame from `reader`.
///
/// The caller decides what [`Frame::Truncated`] means: at the tail of the
/// log it is a crash marker, anywhere else it is corruption.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame> {
    let mut len_buf = [0u8; LEN_PREFIX];
    match fill_or_eof(reader, &mut len_buf).await? {
        Fill::Full => {}
        Fill::Empty => return Ok(Frame::Eof),
        Fill::Partial => return Ok(Frame::Truncated),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    match fill_or_eof(reader, &mut payload).await? {
        Fill::Full => Ok(Frame::Complete(Bytes::from(payload))),
        Fill::Empty | Fill::Partial => Ok(Frame::Truncated),
    }
}

enum Fill {
    Full,
    Empty,
    Partial,
}

async fn fill_or_eof<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<Fill> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Ok(if filled == 0 { Fill::Empty } else { Fill::Partial });
        }
        filled += n;
    }
    Ok(Fill::Full)
}
