//! Payload codecs.
//!
//! A codec turns typed request and response values into frame bodies and
//! back. The client never inspects a body beyond what the codec returns.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Result, RpcError};

/// Converts typed values to and from frame bodies.
///
/// Errors are reported as [`RpcError::Codec`] and passed to the caller
/// unchanged.
pub trait Codec: Send + Sync + 'static {
    /// Encode a value into a body.
    fn marshal<T>(&self, value: &T) -> Result<Bytes>
    where
        T: Serialize + ?Sized;

    /// Decode a body into a value.
    fn unmarshal<T>(&self, body: &[u8]) -> Result<T>
    where
        T: DeserializeOwned;
}

/// JSON codec backed by `serde_json`. This is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn marshal<T>(&self, value: &T) -> Result<Bytes>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(RpcError::codec)
    }

    fn unmarshal<T>(&self, body: &[u8]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(body).map_err(RpcError::codec)
    }
}
