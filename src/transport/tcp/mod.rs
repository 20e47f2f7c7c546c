// src/transport/tcp/mod.rs

//! TCP transport.
//!
//! One `TcpStream` per transport, framed with the layout in
//! [`protocol`](crate::protocol). A writer task drains the bounded outbound
//! queue and a reader task feeds the inbound stream. When either side fails,
//! or `close()` is called, both tasks stop and the inbound stream ends.

mod transport;

pub use transport::create_tcp_transport;
