use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Correlation identifier matching a reply frame to the call that sent it.
///
/// Carried in the `seq` field of every [`Frame`](crate::Frame). The value `0`
/// is never handed out by a [`SequenceGenerator`]; it is used for frames
/// that expect no reply, such as keepalive pings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// The id used on frames that are not part of a call.
    pub const NONE: CorrelationId = CorrelationId(0);

    /// Wrap a raw wire value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw wire value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for CorrelationId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-client source of correlation ids.
///
/// Lock-free: ids are taken with a single atomic increment, so it is safe to
/// call from any number of tasks at once. Values start at 1, strictly
/// increase and are never reused for the lifetime of the generator.
#[derive(Debug)]
pub struct SequenceGenerator {
    // ---
    last: AtomicU64,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Take the next id.
    pub fn next(&self) -> CorrelationId {
        // ---
        CorrelationId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// The most recently issued id, or [`CorrelationId::NONE`] if none yet.
    pub fn last(&self) -> CorrelationId {
        CorrelationId(self.last.load(Ordering::Relaxed))
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}
