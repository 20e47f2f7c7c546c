// src/transport/memory/mod.rs

//! In-memory transport implementation.
//!
//! Two connected in-process ends that behave like the two sides of a socket:
//! frames sent on one end arrive, in order, on the other end's inbound
//! stream. It is the reference for transport semantics and the transport
//! used by the crate's own tests.
//!
//! ## Reference Semantics
//!
//! - Each direction has its own bounded queue of `send_queue_size` frames;
//!   `send()` waits while that queue is full.
//! - Closing either end closes the whole connection: both inbound streams
//!   end after draining, and later sends fail with `ClientDisconnected`.
//! - Nothing is dropped or reordered.
//!
//! ## Non-Goals
//!
//! No simulation of latency, partial writes or network failure.

mod transport;

pub use transport::create_memory_pair;
