// tests/common/mod.rs

//! Shared helpers: a scripted peer on the far end of a memory connection.

#![allow(dead_code)]

use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use mux_rpc::protocol::split_method;
use mux_rpc::{
    //
    create_memory_pair,
    CorrelationId,
    Frame,
    InboundHandle,
    RpcClient,
    RpcConfig,
    Transport,
    TransportPtr,
    CMD_RPC_METHOD,
};

/// How long a peer waits for the client's next frame before failing the test.
pub const PEER_WAIT: Duration = Duration::from_secs(2);

/// The far end of a client connection, driven by the test itself.
pub struct Peer {
    // ---
    pub transport: TransportPtr,
    inbound: InboundHandle,
}

impl Peer {
    pub fn new(transport: TransportPtr) -> Self {
        // ---
        let inbound = transport.take_inbound().expect("peer inbound already taken");
        Self { transport, inbound }
    }

    /// Next frame from the client; panics if none arrives in time.
    pub async fn recv(&mut self) -> Frame {
        // ---
        timeout(PEER_WAIT, self.inbound.inbox.recv())
            .await
            .expect("timed out waiting for a frame from the client")
            .expect("connection closed while waiting for a frame")
    }

    /// Next frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.inbound.inbox.try_recv().ok()
    }

    pub async fn reply(&self, seq: CorrelationId, body: impl Into<Bytes>) {
        // ---
        self.transport
            .send(Frame::reply(seq, body))
            .await
            .expect("peer reply failed");
    }

    pub async fn reply_error(&self, seq: CorrelationId, message: &str) {
        // ---
        self.transport
            .send(Frame::error_reply(seq, message))
            .await
            .expect("peer error reply failed");
    }

    pub async fn send(&self, frame: Frame) {
        self.transport.send(frame).await.expect("peer send failed");
    }

    pub async fn close(&self) {
        self.transport.close().await.expect("peer close failed");
    }

    /// Answer every call by echoing its payload, stripping the method
    /// trailer from named-method calls. Runs until the connection closes.
    pub fn spawn_echo(mut self) -> JoinHandle<()> {
        // ---
        tokio::spawn(async move {
            while let Some(frame) = self.inbound.inbox.recv().await {
                let body = if frame.cmd == CMD_RPC_METHOD {
                    match split_method(&frame.body) {
                        Some((payload, _method)) => payload,
                        None => {
                            let _ = self
                                .transport
                                .send(Frame::error_reply(frame.seq, "malformed method call"))
                                .await;
                            continue;
                        }
                    }
                } else {
                    frame.body.clone()
                };

                if self.transport.send(Frame::reply(frame.seq, body)).await.is_err() {
                    break;
                }
            }
        })
    }
}

/// A client on a fresh memory connection, plus the peer end.
pub fn client_pair(id: &str) -> (RpcClient, Peer) {
    client_pair_with(RpcConfig::memory(id))
}

pub fn client_pair_with(config: RpcConfig) -> (RpcClient, Peer) {
    // ---
    let (local, remote) = create_memory_pair(&config).expect("memory pair");
    let client = RpcClient::with_transport(local, &config).expect("client");
    (client, Peer::new(remote))
}

/// Poll `cond` every few milliseconds until it holds or `PEER_WAIT` passes.
pub async fn wait_until<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    // ---
    timeout(PEER_WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

mod imp {
    use std::sync::Once;

    static INIT: Once = Once::new();

    pub fn init() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }
}

pub fn init_logging() {
    imp::init();
}
