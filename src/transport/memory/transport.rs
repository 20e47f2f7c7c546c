// src/transport/memory/transport.rs

//! In-memory connection pair.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::{
    // ---
    lock_ignore_poison,
    log_debug,
    Frame,
    Result,
    RpcConfig,
    RpcError,
    Transport,
    TransportBase,
    TransportPtr,
};

/// Outbound halves of both directions, shared by the two ends so that
/// closing one end closes the connection for both.
struct Link {
    // ---
    senders: [Mutex<Option<mpsc::Sender<Frame>>>; 2],

    /// Flipped to `true` on close; wakes senders parked on a full queue.
    closed: watch::Sender<bool>,
}

impl Link {
    fn sender(&self, side: usize) -> Option<mpsc::Sender<Frame>> {
        lock_ignore_poison(&self.senders[side]).clone()
    }

    fn shut(&self) -> bool {
        // ---
        let mut closed_any = false;
        for slot in &self.senders {
            closed_any |= lock_ignore_poison(slot).take().is_some();
        }
        self.closed.send_replace(true);
        closed_any
    }
}

/// One end of an in-memory connection.
struct MemoryTransport {
    // ---
    base: TransportBase,
    link: Arc<Link>,
    side: usize,
}

#[async_trait]
impl Transport for MemoryTransport {
    // ---
    fn base(&self) -> &TransportBase {
        &self.base
    }

    /// Queue a frame for the other end.
    ///
    /// A send waiting for queue space fails as soon as either end closes.
    async fn send(&self, frame: Frame) -> Result<()> {
        // ---
        // subscribe before looking up the sender so a close in between is seen
        let mut closed = self.link.closed.subscribe();
        let tx = self
            .link
            .sender(self.side)
            .ok_or(RpcError::ClientDisconnected)?;

        tokio::select! {
            sent = tx.send(frame) => sent.map_err(|_| RpcError::ClientDisconnected),
            _ = closed.changed() => Err(RpcError::ClientDisconnected),
        }
    }

    /// Close both directions.
    async fn close(&self) -> Result<()> {
        // ---
        if self.link.shut() {
            log_debug!("{}: memory connection closed", self.transport_id());
        }
        Ok(())
    }
}

/// Create a connected pair of in-memory transports.
///
/// The first end is named after `config.transport_id`, the second gets a
/// `-peer` suffix. Both use `config.send_queue_size` as queue capacity.
///
/// # Errors
///
/// Currently infallible; always returns `Ok`.
pub fn create_memory_pair(config: &RpcConfig) -> Result<(TransportPtr, TransportPtr)> {
    // ---
    let capacity = config.send_queue_size.max(1);

    // index 0 carries frames sent by the first end
    let (tx_0, rx_0) = mpsc::channel(capacity);
    let (tx_1, rx_1) = mpsc::channel(capacity);

    let (closed, _) = watch::channel(false);
    let link = Arc::new(Link {
        senders: [Mutex::new(Some(tx_0)), Mutex::new(Some(tx_1))],
        closed,
    });

    let local = MemoryTransport {
        base: TransportBase::new(config.transport_id.clone(), rx_1),
        link: link.clone(),
        side: 0,
    };
    let remote = MemoryTransport {
        base: TransportBase::new(format!("{}-peer", config.transport_id), rx_0),
        link,
        side: 1,
    };

    log_debug!("{}: memory pair created", config.transport_id);

    Ok((Arc::new(local), Arc::new(remote)))
}
