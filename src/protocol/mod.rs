//! Frame types, reserved command codes and the byte layout used on the wire.
//!
//! The RPC core only looks at three fields of a frame: the command code, the
//! correlation id and the body. Everything else about the connection is the
//! transport's business.
mod frame;
mod wire;

pub use frame::{
    //
    append_method,
    is_reserved,
    split_method,
    Frame,
    CMD_PING,
    CMD_RPC_ERROR,
    CMD_RPC_METHOD,
    MAX_METHOD_NAME_LEN,
};
pub use wire::{encode_frame, read_frame, write_frame, HEADER_LEN};
