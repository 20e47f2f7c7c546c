//! Domain layer public interface.
//!
//! The RPC client talks to its connection only through the abstractions in
//! this module. Concrete connections live under `src/transport/`.

mod transport;

pub use transport::{
    //
    InboundHandle,
    Transport,
    TransportBase,
    TransportPtr,
};
