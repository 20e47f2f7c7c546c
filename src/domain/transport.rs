// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! A transport is one persistent, ordered, bidirectional connection carrying
//! [`Frame`]s. It owns the bounded outbound queue and produces exactly one
//! inbound stream. Correlation, timeouts and shutdown bookkeeping are layered
//! on top by [`RpcClient`](crate::RpcClient).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{lock_ignore_poison, Frame, Result, RpcError};

/// State shared by every transport implementation.
///
/// Concrete transports embed this as a field named `base` and return it from
/// [`Transport::base`], which lets the trait provide the common methods.
pub struct TransportBase {
    /// Identifier used in log lines.
    pub transport_id: String,

    inbound: Mutex<Option<mpsc::Receiver<Frame>>>,
}

impl TransportBase {
    /// Create the base for a transport whose inbound frames arrive on `inbox`.
    pub fn new(transport_id: impl Into<String>, inbox: mpsc::Receiver<Frame>) -> Self {
        Self {
            transport_id: transport_id.into(),
            inbound: Mutex::new(Some(inbox)),
        }
    }

    fn take_inbound(&self) -> Result<InboundHandle> {
        // ---
        lock_ignore_poison(&self.inbound)
            .take()
            .map(|inbox| InboundHandle { inbox })
            .ok_or_else(|| {
                RpcError::Transport(format!(
                    "{}: inbound stream already taken",
                    self.transport_id
                ))
            })
    }
}

/// The single stream of inbound frames of a connection.
///
/// The stream ends (`recv()` returns `None`) once the connection has closed
/// and every frame received before that has been delivered. That end of
/// stream is the connection's close event; it happens exactly once.
pub struct InboundHandle {
    // ---
    /// Frames in arrival order.
    pub inbox: mpsc::Receiver<Frame>,
}

/// A persistent connection carrying frames.
///
/// Implementations must ensure that:
/// - `send()` waits while the outbound queue is full and never grows it;
/// - `send()` fails with [`RpcError::ClientDisconnected`] once closed;
/// - `close()` is idempotent and ends the inbound stream.
#[async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Shared base state.
    fn base(&self) -> &TransportBase;

    /// Identifier used in log lines.
    fn transport_id(&self) -> &str {
        &self.base().transport_id
    }

    /// Take the inbound stream. Only the first call succeeds.
    fn take_inbound(&self) -> Result<InboundHandle> {
        self.base().take_inbound()
    }

    /// Hand a frame to the outbound queue, waiting for capacity.
    async fn send(&self, frame: Frame) -> Result<()>;

    /// Close the connection.
    async fn close(&self) -> Result<()>;
}

/// Shared transport pointer.
///
/// Clones share the one underlying connection.
pub type TransportPtr = Arc<dyn Transport>;
