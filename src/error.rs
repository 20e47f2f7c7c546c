use thiserror::Error;

/// Boxed error produced by a payload [`Codec`](crate::Codec).
pub type CodecError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by RPC calls and transports.
///
/// Nothing in this crate retries on any of these; the decision belongs to
/// the caller.
#[derive(Error, Debug)]
pub enum RpcError {
    // ---
    /// The client is no longer running, or it shut down while the call was
    /// waiting for its reply.
    #[error("rpc client is disconnected")]
    ClientDisconnected,

    /// Either the outbound hand-off or the reply wait exceeded the deadline.
    #[error("rpc call timed out")]
    CallTimeout,

    /// Marshal or unmarshal of a payload failed. The codec's own error is
    /// kept as the source.
    #[error("codec error: {0}")]
    Codec(#[source] CodecError),

    /// The peer answered with the RPC error command code.
    #[error("remote error: {0}")]
    Remote(String),

    /// Method names are carried with a one byte length trailer.
    #[error("method name is {0} bytes long, the limit is 255")]
    MethodNameTooLong(usize),

    /// The command code is reserved for the RPC machinery itself.
    #[error("command code {0:#010x} is reserved")]
    ReservedCommand(u32),

    /// A frame body exceeded the configured maximum.
    #[error("frame body of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// Transport level failure that is not a plain disconnect.
    #[error("transport error: {0}")]
    Transport(String),

    /// Socket I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// Wrap any codec failure.
    pub fn codec<E>(err: E) -> Self
    where
        E: Into<CodecError>,
    {
        RpcError::Codec(err.into())
    }

    /// True for the two errors a caller typically handles by giving up on
    /// the connection or the call rather than inspecting the payload.
    pub fn is_disconnect_or_timeout(&self) -> bool {
        matches!(self, RpcError::ClientDisconnected | RpcError::CallTimeout)
    }
}

/// Result type alias for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;
