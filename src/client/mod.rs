// src/client/mod.rs
//! RPC client implementation.
//!
//! This module contains [`RpcClient`], which runs many concurrent calls over
//! one transport and matches each reply to the call that sent it.
//!
//! # Architecture
//!
//! Each call takes a fresh correlation id, registers a one-shot channel in
//! the session table and hands its frame to the transport's send queue. A
//! background receive loop reads every inbound frame and either resolves the
//! waiting call (success or error reply), ignores it (keepalive), or passes
//! it to a handler registered for its command code.
//!
//! When the inbound stream ends the client stops running: the session table
//! is drained and every waiting call wakes with
//! [`RpcError::ClientDisconnected`].
//!
//! # Concurrency
//!
//! The session table and the running flag share one mutex. It is held only
//! for map operations, never across an `.await`. Correlation ids come from
//! an atomic counter and need no lock.
//!
//! # Timeouts
//!
//! A timeout only stops the caller from waiting. The frame may still reach
//! the peer, and a late reply finds no session and is dropped with a debug
//! log line.

mod handler;
mod lifecycle;
mod session;

use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot::{self, error::RecvError};
use tokio::time::{self, MissedTickBehavior};

use crate::protocol::{append_method, is_reserved, CMD_PING, CMD_RPC_ERROR, CMD_RPC_METHOD};
use crate::{
    // ---
    create_tcp_transport,
    lock_ignore_poison,
    log_debug,
    log_info,
    log_trace,
    Codec,
    CorrelationId,
    Frame,
    InboundHandle,
    JsonCodec,
    Result,
    RpcConfig,
    RpcError,
    SequenceGenerator,
    Transport,
    TransportPtr,
};

use handler::{wrap_handler, HandlerRegistry};
use lifecycle::{run_hook, CloseHooks};
use session::{Reply, SessionTable};

/// RPC client multiplexing calls over a single connection.
///
/// Cheap to clone (internally `Arc`-backed); clones share the connection,
/// the session table and the correlation id sequence.
///
/// # Example
///
/// ```no_run
/// use mux_rpc::{RpcClient, RpcConfig};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct EchoRequest { text: String }
///
/// #[derive(Deserialize)]
/// struct EchoResponse { text: String }
///
/// # async fn example() -> mux_rpc::Result<()> {
/// let client = RpcClient::connect(&RpcConfig::tcp("127.0.0.1:7000", "echo-client")).await?;
///
/// let rsp: EchoResponse = client
///     .call("Echo", &EchoRequest { text: "hi".into() }, Duration::from_secs(1))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct RpcClient<C: Codec = JsonCodec> {
    inner: Arc<Inner<C>>,
}

impl<C: Codec> Clone for RpcClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<C> {
    // ---
    transport: TransportPtr,
    codec: C,
    seq: SequenceGenerator,
    table: Mutex<SessionTable>,
    handlers: HandlerRegistry,
    close_hooks: Mutex<CloseHooks>,
}

/// Removes the call's session when the call ends, however it ends.
///
/// This includes the caller dropping the call future part way through.
struct SessionGuard<'a> {
    table: &'a Mutex<SessionTable>,
    id: CorrelationId,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        lock_ignore_poison(self.table).remove(self.id);
    }
}

impl RpcClient<JsonCodec> {
    // ---
    /// Connect over TCP to `config.addr` using the JSON codec.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Transport` or `RpcError::Io` if the connection
    /// cannot be established.
    pub async fn connect(config: &RpcConfig) -> Result<Self> {
        // ---
        let transport = create_tcp_transport(config).await?;
        Self::with_transport(transport, config)
    }

    /// Create a client on an existing transport using the JSON codec.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Transport` if the transport's inbound stream was
    /// already taken by someone else.
    pub fn with_transport(transport: TransportPtr, config: &RpcConfig) -> Result<Self> {
        Self::with_codec(transport, JsonCodec, config)
    }
}

impl<C: Codec> RpcClient<C> {
    // ---
    /// Create a client on an existing transport with a custom codec.
    ///
    /// Spawns the receive loop, and the keepalive task when
    /// `config.keepalive_interval` is set.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Transport` if the transport's inbound stream was
    /// already taken.
    pub fn with_codec(transport: TransportPtr, codec: C, config: &RpcConfig) -> Result<Self> {
        // ---
        let inbound = transport.take_inbound()?;

        let inner = Arc::new(Inner {
            transport,
            codec,
            seq: SequenceGenerator::new(),
            table: Mutex::new(SessionTable::new()),
            handlers: HandlerRegistry::default(),
            close_hooks: Mutex::new(CloseHooks::default()),
        });

        spawn_receive_loop(Arc::downgrade(&inner), inbound);

        if let Some(interval) = config.keepalive_interval.filter(|d| !d.is_zero()) {
            spawn_keepalive(Arc::downgrade(&inner), interval);
        }

        log_debug!("{}: rpc client started", inner.transport.transport_id());

        Ok(Self { inner })
    }

    /// The payload codec.
    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    /// The underlying connection.
    pub fn transport(&self) -> &TransportPtr {
        &self.inner.transport
    }

    /// Identifier of the underlying connection, as used in log lines.
    pub fn transport_id(&self) -> &str {
        self.inner.transport.transport_id()
    }

    /// True until the connection closes.
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Number of calls currently waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        lock_ignore_poison(&self.inner.table).len()
    }

    /// Send `body` under `cmd` and wait for the reply body.
    ///
    /// Waits without limit, both for room in the send queue and for the
    /// reply. Use [`call_raw_with_timeout`](Self::call_raw_with_timeout) to
    /// bound either wait.
    ///
    /// # Errors
    ///
    /// - `RpcError::ReservedCommand` if `cmd` is reserved
    /// - `RpcError::ClientDisconnected` if the client is not running or
    ///   stops before the reply arrives
    /// - `RpcError::Remote` if the peer answered with an error
    pub async fn call_raw(&self, cmd: u32, body: Bytes) -> Result<Bytes> {
        // ---
        ensure_app_command(cmd)?;
        self.dispatch(cmd, body, None).await
    }

    /// Like [`call_raw`](Self::call_raw), bounded by `timeout`.
    ///
    /// The timeout applies to the send-queue hand-off and, separately, to
    /// the wait for the reply.
    ///
    /// # Errors
    ///
    /// As for `call_raw`, plus `RpcError::CallTimeout`.
    pub async fn call_raw_with_timeout(
        &self,
        cmd: u32,
        body: Bytes,
        timeout: Duration,
    ) -> Result<Bytes> {
        // ---
        ensure_app_command(cmd)?;
        self.dispatch(cmd, body, Some(timeout)).await
    }

    /// Marshal `req`, send it under `cmd`, and unmarshal the reply.
    ///
    /// # Errors
    ///
    /// As for [`call_raw`](Self::call_raw), plus `RpcError::Codec`.
    pub async fn call_cmd<Req, Resp>(&self, cmd: u32, req: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        // ---
        ensure_app_command(cmd)?;
        let body = self.inner.codec.marshal(req)?;
        let reply = self.dispatch(cmd, body, None).await?;
        self.inner.codec.unmarshal(&reply)
    }

    /// Like [`call_cmd`](Self::call_cmd), bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// As for `call_cmd`, plus `RpcError::CallTimeout`.
    pub async fn call_cmd_with_timeout<Req, Resp>(
        &self,
        cmd: u32,
        req: &Req,
        timeout: Duration,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        // ---
        ensure_app_command(cmd)?;
        let body = self.inner.codec.marshal(req)?;
        let reply = self.dispatch(cmd, body, Some(timeout)).await?;
        self.inner.codec.unmarshal(&reply)
    }

    /// Call a named method.
    ///
    /// The method name and its one byte length are appended to the
    /// marshaled request, and the frame goes out under
    /// [`CMD_RPC_METHOD`](crate::CMD_RPC_METHOD).
    ///
    /// # Errors
    ///
    /// - `RpcError::MethodNameTooLong` if `method` exceeds 255 bytes
    /// - `RpcError::Codec`, `RpcError::CallTimeout`,
    ///   `RpcError::ClientDisconnected`, `RpcError::Remote`
    pub async fn call<Req, Resp>(&self, method: &str, req: &Req, timeout: Duration) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        // ---
        let payload = self.inner.codec.marshal(req)?;
        let body = append_method(&payload, method)?;
        let reply = self.dispatch(CMD_RPC_METHOD, body, Some(timeout)).await?;
        self.inner.codec.unmarshal(&reply)
    }

    /// Like [`call_cmd`](Self::call_cmd) for commands whose reply carries
    /// nothing the caller needs. The reply body is discarded unread.
    ///
    /// # Errors
    ///
    /// As for `call_cmd`; `RpcError::Codec` only for the request.
    pub async fn call_cmd_no_reply<Req>(&self, cmd: u32, req: &Req) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        // ---
        ensure_app_command(cmd)?;
        let body = self.inner.codec.marshal(req)?;
        self.dispatch(cmd, body, None).await.map(drop)
    }

    /// Like [`call_cmd_no_reply`](Self::call_cmd_no_reply), bounded by
    /// `timeout`.
    pub async fn call_cmd_no_reply_with_timeout<Req>(
        &self,
        cmd: u32,
        req: &Req,
        timeout: Duration,
    ) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        // ---
        ensure_app_command(cmd)?;
        let body = self.inner.codec.marshal(req)?;
        self.dispatch(cmd, body, Some(timeout)).await.map(drop)
    }

    /// Call a named method and discard the reply body.
    ///
    /// For methods that answer with an empty body, which no codec can decode
    /// into a value. Remote errors are still reported.
    ///
    /// # Errors
    ///
    /// As for [`call`](Self::call).
    pub async fn call_no_reply<Req>(&self, method: &str, req: &Req, timeout: Duration) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        // ---
        let payload = self.inner.codec.marshal(req)?;
        let body = append_method(&payload, method)?;
        self.dispatch(CMD_RPC_METHOD, body, Some(timeout))
            .await
            .map(drop)
    }

    /// Register an async handler for inbound frames carrying `cmd`.
    ///
    /// Replaces any handler already registered for `cmd`. Handlers run on
    /// the receive loop one frame at a time; a panicking handler is logged
    /// and does not stop the loop.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::ReservedCommand` for reserved codes.
    pub fn handle<F, Fut>(&self, cmd: u32, handler: F) -> Result<()>
    where
        F: Fn(TransportPtr, Frame) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.handlers.insert(cmd, wrap_handler(handler))
    }

    /// Unregister the handler for `cmd`. Returns `false` if there was none.
    pub fn remove_handler(&self, cmd: u32) -> bool {
        self.inner.handlers.remove(cmd)
    }

    /// Run `hook` once when the client shuts down.
    ///
    /// Hooks are keyed by `name`; registering the same name again replaces
    /// the earlier hook. If the client has already shut down the hook runs
    /// immediately.
    pub fn on_close<F>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // ---
        let name = name.into();
        let late = lock_ignore_poison(&self.inner.close_hooks).register(name.clone(), Box::new(hook));

        if let Some(hook) = late {
            run_hook(self.transport_id(), &name, hook);
        }
    }

    /// Close the connection and release every waiting call.
    ///
    /// Safe to call more than once and from several clones.
    pub async fn close(&self) -> Result<()> {
        // ---
        let closed = self.inner.transport.close().await;
        self.inner.shutdown("closed by caller");
        closed
    }

    async fn dispatch(&self, cmd: u32, body: Bytes, timeout: Option<Duration>) -> Result<Bytes> {
        // ---
        let inner = &*self.inner;
        let (id, mut done) = lock_ignore_poison(&inner.table).open(&inner.seq, cmd)?;
        let _session = SessionGuard {
            table: &inner.table,
            id,
        };

        log_trace!(
            "{}: call cmd {cmd:#x} seq {id} ({} bytes)",
            inner.transport.transport_id(),
            body.len()
        );

        // shutdown closes `done`, which also releases a call still waiting
        // for room in the send queue
        let hand_off = hand_off_or_release(
            inner.transport.send(Frame::new(cmd, id, body)),
            &mut done,
        );
        let early = match timeout {
            Some(limit) => time::timeout(limit, hand_off).await.map_err(|_| {
                log_debug!(
                    "{}: send queue hand-off timed out, cmd {cmd:#x} seq {id}",
                    inner.transport.transport_id()
                );
                RpcError::CallTimeout
            })??,
            None => hand_off.await?,
        };
        if let Some(reply) = early {
            return settle(reply);
        }

        let reply = match timeout {
            Some(limit) => time::timeout(limit, done).await.map_err(|_| {
                log_debug!(
                    "{}: reply wait timed out, cmd {cmd:#x} seq {id}",
                    inner.transport.transport_id()
                );
                RpcError::CallTimeout
            })?,
            None => done.await,
        };

        settle(reply)
    }
}

impl<C: Codec> Inner<C> {
    // ---
    fn is_running(&self) -> bool {
        lock_ignore_poison(&self.table).is_running()
    }

    /// Classify one inbound frame and act on it.
    async fn route(&self, frame: Frame) {
        // ---
        match frame.cmd {
            CMD_PING => {
                log_trace!("{}: ping received", self.transport.transport_id());
            }
            CMD_RPC_METHOD => {
                self.resolve(frame.cmd, frame.seq, Ok(frame.body));
            }
            CMD_RPC_ERROR => {
                let message = String::from_utf8_lossy(&frame.body).into_owned();
                self.resolve(frame.cmd, frame.seq, Err(RpcError::Remote(message)));
            }
            _ => {
                self.handlers
                    .dispatch(self.transport.clone(), frame)
                    .await;
            }
        }
    }

    fn resolve(&self, cmd: u32, id: CorrelationId, reply: Reply) {
        // ---
        let call = lock_ignore_poison(&self.table).take(id);

        match call {
            Some(call) => {
                let call_cmd = call.cmd();
                let age = call.age();
                if !call.resolve(reply) {
                    log_debug!(
                        "{}: caller of cmd {call_cmd:#x} seq {id} gone before reply ({age:?})",
                        self.transport.transport_id()
                    );
                }
            }
            None => {
                log_debug!(
                    "{}: no rpc session waiting for reply, cmd {cmd:#x} seq {id}",
                    self.transport.transport_id()
                );
            }
        }
    }

    /// Stop running and release every pending call. Only the first call
    /// does anything.
    fn shutdown(&self, reason: &str) {
        // ---
        let Some(drained) = lock_ignore_poison(&self.table).drain_all() else {
            return;
        };

        let transport_id = self.transport.transport_id();
        log_info!(
            "{transport_id}: rpc client stopped ({reason}), releasing {} pending calls",
            drained.len()
        );

        for (id, call) in drained {
            log_trace!(
                "{transport_id}: releasing cmd {:#x} seq {id} after {:?}",
                call.cmd(),
                call.age()
            );
            // dropping the record closes its channel
            drop(call);
        }

        let hooks = lock_ignore_poison(&self.close_hooks).take_all();
        for (name, hook) in hooks {
            run_hook(transport_id, &name, hook);
        }
    }
}

/// Wait for the hand-off, unless the call is settled first.
///
/// Returns `Some` when `done` fired before the frame was queued.
async fn hand_off_or_release<F>(
    hand_off: F,
    done: &mut oneshot::Receiver<Reply>,
) -> Result<Option<std::result::Result<Reply, RecvError>>>
where
    F: Future<Output = Result<()>>,
{
    // ---
    tokio::select! {
        sent = hand_off => sent.map(|()| None),
        early = done => Ok(Some(early)),
    }
}

/// A closed channel means shutdown released the call.
fn settle(reply: std::result::Result<Reply, RecvError>) -> Result<Bytes> {
    reply.map_err(|_| RpcError::ClientDisconnected)?
}

fn ensure_app_command(cmd: u32) -> Result<()> {
    if is_reserved(cmd) {
        return Err(RpcError::ReservedCommand(cmd));
    }
    Ok(())
}

/// Drive the router until the inbound stream ends, then shut down.
fn spawn_receive_loop<C: Codec>(inner: Weak<Inner<C>>, mut inbound: InboundHandle) {
    // ---
    tokio::spawn(async move {
        // ---
        while let Some(frame) = inbound.inbox.recv().await {
            match inner.upgrade() {
                Some(inner) => inner.route(frame).await,
                None => {
                    log_debug!("rpc client dropped, receive loop exiting");
                    return;
                }
            }
        }

        if let Some(inner) = inner.upgrade() {
            log_debug!("{}: inbound stream ended", inner.transport.transport_id());
            inner.shutdown("connection closed");
        }
    });
}

/// Send a ping every `interval` while the client runs.
fn spawn_keepalive<C: Codec>(inner: Weak<Inner<C>>, interval: Duration) {
    // ---
    tokio::spawn(async move {
        // ---
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let transport = match inner.upgrade() {
                Some(inner) if inner.is_running() => inner.transport.clone(),
                _ => break,
            };

            if let Err(_err) = transport.send(Frame::ping()).await {
                log_debug!("{}: keepalive stopped: {_err}", transport.transport_id());
                break;
            }
        }
    });
}
