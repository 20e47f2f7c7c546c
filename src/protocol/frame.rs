use bytes::{BufMut, Bytes, BytesMut};

use crate::{CorrelationId, Result, RpcError};

/// Keepalive ping. Carries no correlation id and is ignored on receipt.
pub const CMD_PING: u32 = 0x0100_0001;

/// Named-method call. Replies to every call come back on this code as well.
pub const CMD_RPC_METHOD: u32 = 0x0100_0002;

/// RPC failure reply; the body is the error message.
pub const CMD_RPC_ERROR: u32 = 0x0100_0003;

/// Longest method name that fits the one byte length trailer.
pub const MAX_METHOD_NAME_LEN: usize = u8::MAX as usize;

/// True for codes the RPC core interprets itself.
pub fn is_reserved(cmd: u32) -> bool {
    matches!(cmd, CMD_PING | CMD_RPC_METHOD | CMD_RPC_ERROR)
}

/// One unit of traffic on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    // ---
    /// Selects how `body` is interpreted.
    pub cmd: u32,

    /// Correlation id; [`CorrelationId::NONE`] on frames outside a call.
    pub seq: CorrelationId,

    /// Opaque payload.
    pub body: Bytes,
}

impl Frame {
    pub fn new(cmd: u32, seq: CorrelationId, body: impl Into<Bytes>) -> Self {
        Self {
            cmd,
            seq,
            body: body.into(),
        }
    }

    /// A keepalive frame.
    pub fn ping() -> Self {
        Self::new(CMD_PING, CorrelationId::NONE, Bytes::new())
    }

    /// Success reply to the call identified by `seq`.
    pub fn reply(seq: CorrelationId, body: impl Into<Bytes>) -> Self {
        Self::new(CMD_RPC_METHOD, seq, body)
    }

    /// Error reply to the call identified by `seq`.
    pub fn error_reply(seq: CorrelationId, message: &str) -> Self {
        Self::new(CMD_RPC_ERROR, seq, Bytes::copy_from_slice(message.as_bytes()))
    }
}

/// Append `method` and its one byte length to an encoded request body.
///
/// The resulting layout is `payload | name bytes | len(name)`, so a peer can
/// peel the name off the end without knowing the payload format.
pub fn append_method(payload: &[u8], method: &str) -> Result<Bytes> {
    // ---
    let name = method.as_bytes();
    if name.len() > MAX_METHOD_NAME_LEN {
        return Err(RpcError::MethodNameTooLong(name.len()));
    }

    let mut buf = BytesMut::with_capacity(payload.len() + name.len() + 1);
    buf.put_slice(payload);
    buf.put_slice(name);
    buf.put_u8(name.len() as u8);
    Ok(buf.freeze())
}

/// Split a named-method body into `(payload, method)`.
///
/// Returns `None` when the trailer is missing, longer than the body, or not
/// valid UTF-8.
pub fn split_method(body: &Bytes) -> Option<(Bytes, String)> {
    // ---
    let (&len, rest) = body.split_last()?;
    let len = len as usize;
    if len > rest.len() {
        return None;
    }

    let split = rest.len() - len;
    let name = std::str::from_utf8(&rest[split..]).ok()?.to_owned();
    Some((body.slice(..split), name))
}
