// src/transport/tcp/transport.rs

//! TCP connection with a bounded send queue.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time;

use crate::protocol::{read_frame, write_frame};
use crate::{
    // ---
    lock_ignore_poison,
    log_debug,
    log_info,
    log_warn,
    Frame,
    Result,
    RpcConfig,
    RpcError,
    Transport,
    TransportBase,
    TransportPtr,
};

struct TcpTransport {
    // ---
    base: TransportBase,

    /// Producer side of the send queue; `None` once closed.
    outbound: Mutex<Option<mpsc::Sender<Frame>>>,

    /// Flipped to `true` exactly when the connection starts shutting down.
    closing: Arc<watch::Sender<bool>>,
}

#[async_trait]
impl Transport for TcpTransport {
    // ---
    fn base(&self) -> &TransportBase {
        &self.base
    }

    async fn send(&self, frame: Frame) -> Result<()> {
        // ---
        let tx = lock_ignore_poison(&self.outbound)
            .clone()
            .ok_or(RpcError::ClientDisconnected)?;

        tx.send(frame)
            .await
            .map_err(|_| RpcError::ClientDisconnected)
    }

    async fn close(&self) -> Result<()> {
        // ---
        let was_open = lock_ignore_poison(&self.outbound).take().is_some();
        self.closing.send_replace(true);

        if was_open {
            log_info!("{}: closing tcp connection", self.transport_id());
        }
        Ok(())
    }
}

/// Connect to `config.addr` and start the reader and writer tasks.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// - `RpcError::Transport` if `addr` is missing or the connect times out
/// - `RpcError::Io` if the connect itself fails
pub async fn create_tcp_transport(config: &RpcConfig) -> Result<TransportPtr> {
    // ---
    let addr = config
        .addr
        .as_deref()
        .ok_or_else(|| RpcError::Transport("tcp transport requires an address".into()))?;

    let stream = time::timeout(config.connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| RpcError::Transport(format!("connect to {addr} timed out")))??;
    stream.set_nodelay(true)?;

    log_info!("{}: connected to {addr}", config.transport_id);

    let (read_half, write_half) = stream.into_split();

    let capacity = config.send_queue_size.max(1);
    let (out_tx, out_rx) = mpsc::channel(capacity);
    let (in_tx, in_rx) = mpsc::channel(capacity);
    let (closing, _) = watch::channel(false);
    let closing = Arc::new(closing);

    // subscribe before spawning so a close() that races task start-up is seen
    tokio::spawn(write_loop(
        config.transport_id.clone(),
        write_half,
        out_rx,
        closing.clone(),
        closing.subscribe(),
    ));
    tokio::spawn(read_loop(
        config.transport_id.clone(),
        read_half,
        in_tx,
        config.max_body_len,
        closing.clone(),
        closing.subscribe(),
    ));

    Ok(Arc::new(TcpTransport {
        base: TransportBase::new(config.transport_id.clone(), in_rx),
        outbound: Mutex::new(Some(out_tx)),
        closing,
    }))
}

async fn write_loop(
    transport_id: String,
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::Receiver<Frame>,
    closing: Arc<watch::Sender<bool>>,
    mut closed: watch::Receiver<bool>,
) {
    // ---

    loop {
        tokio::select! {
            next = queue.recv() => match next {
                Some(frame) => {
                    if let Err(_err) = write_frame(&mut writer, &frame).await {
                        log_warn!("{transport_id}: write failed: {_err}");
                        break;
                    }
                }
                None => break,
            },
            _ = closed.changed() => break,
        }
    }

    closing.send_replace(true);
    let _ = writer.shutdown().await;
    log_debug!("{transport_id}: writer stopped");
}

async fn read_loop(
    transport_id: String,
    mut reader: OwnedReadHalf,
    inbox: mpsc::Sender<Frame>,
    max_body_len: usize,
    closing: Arc<watch::Sender<bool>>,
    mut closed: watch::Receiver<bool>,
) {
    // ---

    loop {
        tokio::select! {
            read = read_frame(&mut reader, max_body_len) => match read {
                Ok(Some(frame)) => {
                    if inbox.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    log_debug!("{transport_id}: peer closed the connection");
                    break;
                }
                Err(_err) => {
                    log_warn!("{transport_id}: read failed: {_err}");
                    break;
                }
            },
            _ = closed.changed() => break,
        }
    }

    closing.send_replace(true);
    log_debug!("{transport_id}: reader stopped");
    // dropping `inbox` here ends the inbound stream
}
