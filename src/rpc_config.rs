//! Client and transport configuration.
//!
//! One struct covers both the in-memory and the TCP transport. Fields that
//! only make sense for TCP are ignored by the memory transport.

use std::time::Duration;

/// Default capacity of the outbound frame queue.
pub const DEFAULT_SEND_QUEUE_SIZE: usize = 1024;

/// Default upper bound on an inbound frame body.
pub const DEFAULT_MAX_BODY_LEN: usize = 4 * 1024 * 1024;

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default keepalive interval for TCP clients.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    // ---
    /// Peer address (`host:port`). Required by the TCP transport.
    pub addr: Option<String>,

    /// Identifier of this connection, used in log lines.
    pub transport_id: String,

    /// Capacity of the outbound frame queue.
    ///
    /// When the queue is full, callers wait in the hand-off step. The timed
    /// call variants bound that wait; the plain variants do not.
    pub send_queue_size: usize,

    /// Largest inbound frame body accepted before the connection is dropped.
    pub max_body_len: usize,

    /// How long to wait for the TCP connection to be established.
    pub connect_timeout: Duration,

    /// Interval between keepalive pings, or `None` to send none.
    pub keepalive_interval: Option<Duration>,
}

impl RpcConfig {
    /// Configuration for a TCP connection to `addr`.
    pub fn tcp(addr: impl Into<String>, transport_id: impl Into<String>) -> Self {
        Self {
            addr: Some(addr.into()),
            transport_id: transport_id.into(),
            send_queue_size: DEFAULT_SEND_QUEUE_SIZE,
            max_body_len: DEFAULT_MAX_BODY_LEN,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            keepalive_interval: Some(DEFAULT_KEEPALIVE_INTERVAL),
        }
    }

    /// Configuration for an in-process memory connection (no keepalive).
    pub fn memory(transport_id: impl Into<String>) -> Self {
        Self {
            addr: None,
            transport_id: transport_id.into(),
            send_queue_size: DEFAULT_SEND_QUEUE_SIZE,
            max_body_len: DEFAULT_MAX_BODY_LEN,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            keepalive_interval: None,
        }
    }

    /// Set the outbound queue capacity. Zero is raised to one.
    pub fn with_send_queue_size(mut self, size: usize) -> Self {
        self.send_queue_size = size.max(1);
        self
    }

    /// Set the inbound body limit.
    pub fn with_max_body_len(mut self, len: usize) -> Self {
        self.max_body_len = len;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set or clear the keepalive interval.
    pub fn with_keepalive(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval;
        self
    }
}
