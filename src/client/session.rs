use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::{CorrelationId, Result, RpcError, SequenceGenerator};

/// What a waiting call eventually receives: the reply body or the remote
/// error. A closed channel (no value) means the client shut down.
pub(super) type Reply = Result<Bytes>;

/// Bookkeeping for one outstanding call.
///
/// Resolved at most once: either [`resolve`](Self::resolve) sends a reply,
/// or the record is dropped, which closes the channel.
pub(super) struct PendingCall {
    // ---
    done: oneshot::Sender<Reply>,
    cmd: u32,
    started: Instant,
}

impl PendingCall {
    /// Deliver the reply. Never blocks.
    ///
    /// Returns `false` if the caller already stopped waiting.
    pub fn resolve(self, reply: Reply) -> bool {
        self.done.send(reply).is_ok()
    }

    pub fn cmd(&self) -> u32 {
        self.cmd
    }

    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Correlation id → pending call, plus the running flag.
///
/// Always used behind the client's mutex. A record is present exactly while
/// its call is outstanding and unresolved; once `running` is false no record
/// can be added again.
pub(super) struct SessionTable {
    // ---
    running: bool,
    sessions: HashMap<CorrelationId, PendingCall>,
}

impl SessionTable {
    // ---
    pub fn new() -> Self {
        // ---
        Self {
            running: true,
            sessions: HashMap::new(),
        }
    }

    /// Allocate an id and register a pending call for it.
    ///
    /// The running check, the id allocation and the insert happen under the
    /// same lock, so a call either registers before shutdown (and is then
    /// released by it) or is rejected.
    pub fn open(
        &mut self,
        seq: &SequenceGenerator,
        cmd: u32,
    ) -> Result<(CorrelationId, oneshot::Receiver<Reply>)> {
        // ---
        if !self.running {
            return Err(RpcError::ClientDisconnected);
        }

        let id = seq.next();
        let (done, rx) = oneshot::channel();
        let call = PendingCall {
            done,
            cmd,
            started: Instant::now(),
        };

        let previous = self.sessions.insert(id, call);
        debug_assert!(previous.is_none(), "correlation id {id} reused");

        Ok((id, rx))
    }

    /// Remove and return the record for `id` so the caller can resolve it.
    pub fn take(&mut self, id: CorrelationId) -> Option<PendingCall> {
        self.sessions.remove(&id)
    }

    /// Remove the record for `id`. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: CorrelationId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Stop accepting calls and hand back every pending record.
    ///
    /// Returns `None` if the table was already drained.
    pub fn drain_all(&mut self) -> Option<Vec<(CorrelationId, PendingCall)>> {
        // ---
        if !self.running {
            return None;
        }
        self.running = false;
        Some(self.sessions.drain().collect())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
