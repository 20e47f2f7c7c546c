//! Request/response correlation for RPC calls multiplexed over a single
//! persistent connection.
//!
//! Many calls can be in flight on one connection at once. Each gets a unique
//! correlation id; the reply carrying that id is routed back to the call that
//! sent it. Calls can be bounded by a timeout, and when the connection dies
//! every waiting call is released with [`RpcError::ClientDisconnected`]
//! exactly once.
//!
//! The connection itself sits behind the [`Transport`] trait. Two transports
//! ship with the crate: TCP ([`create_tcp_transport`]) and an in-process pair
//! ([`create_memory_pair`]) used for testing.

use std::sync::{Mutex, MutexGuard};

// Import all sub modules once...
mod macros;

mod client;
mod codec;
mod correlation;
mod domain;
mod error;
mod rpc_config;
mod transport;

pub mod protocol;

pub(crate) use macros::{log_debug, log_error, log_info, log_trace, log_warn};

// Re-export main types
pub use client::RpcClient;
pub use codec::{Codec, JsonCodec};
pub use correlation::{CorrelationId, SequenceGenerator};
pub use error::{CodecError, Result, RpcError};
pub use rpc_config::{
    //
    RpcConfig,
    DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_KEEPALIVE_INTERVAL,
    DEFAULT_MAX_BODY_LEN,
    DEFAULT_SEND_QUEUE_SIZE,
};

pub use protocol::{Frame, CMD_PING, CMD_RPC_ERROR, CMD_RPC_METHOD};

pub use transport::{create_memory_pair, create_tcp_transport};

// --- public re-exports
pub use domain::{
    //
    InboundHandle,
    Transport,
    TransportBase,
    TransportPtr,
};

/// Acquire a mutex guard, ignoring poisoning.
///
/// None of the crate's critical sections run user code, and each leaves its
/// state consistent at every step, so a poisoned lock still holds valid data.
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
