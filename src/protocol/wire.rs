//! Byte layout of a frame on a stream transport.
//!
//! ```text
//! [4 bytes] body length   (little-endian u32)
//! [4 bytes] command code  (little-endian u32)
//! [8 bytes] correlation id (little-endian u64)
//! [N bytes] body
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::Frame;
use crate::{CorrelationId, Result, RpcError};

/// Size of the fixed frame header.
pub const HEADER_LEN: usize = 16;

/// Encode a frame, header and body, into one buffer.
pub fn encode_frame(frame: &Frame) -> Result<Bytes> {
    // ---
    let len = u32::try_from(frame.body.len()).map_err(|_| RpcError::FrameTooLarge {
        len: frame.body.len(),
        max: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + frame.body.len());
    buf.put_u32_le(len);
    buf.put_u32_le(frame.cmd);
    buf.put_u64_le(frame.seq.get());
    buf.put_slice(&frame.body);
    Ok(buf.freeze())
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    // ---
    let encoded = encode_frame(frame)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame.
///
/// Returns `Ok(None)` when the stream ends cleanly before a new header.
/// A stream that ends part way through a frame is an error.
pub async fn read_frame<R>(reader: &mut R, max_body_len: usize) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    // ---
    let mut header = [0u8; HEADER_LEN];

    let first = reader.read(&mut header).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[first..]).await?;

    let mut head = &header[..];
    let len = head.get_u32_le() as usize;
    let cmd = head.get_u32_le();
    let seq = CorrelationId::new(head.get_u64_le());

    if len > max_body_len {
        return Err(RpcError::FrameTooLarge {
            len,
            max: max_body_len,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    Ok(Some(Frame::new(cmd, seq, body)))
}
