//! Transport implementations.
//!
//! Concrete implementations of the domain-level `Transport` trait, exposed
//! only through constructor functions. Client code must not depend on
//! transport-specific types.

mod memory;
mod tcp;

pub use memory::create_memory_pair;
pub use tcp::create_tcp_transport;
