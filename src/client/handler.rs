use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures::FutureExt;

use crate::protocol::is_reserved;
use crate::{
    // ---
    lock_ignore_poison,
    log_debug,
    log_error,
    Frame,
    Result,
    RpcError,
    Transport,
    TransportPtr,
};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Type-erased async handler for one command code.
///
/// Receives the connection the frame arrived on, so it can answer on it.
pub(super) type BoxedHandler = Arc<dyn Fn(TransportPtr, Frame) -> BoxFuture + Send + Sync>;

/// Wrap a typed handler closure into a [`BoxedHandler`].
pub(super) fn wrap_handler<F, Fut>(handler: F) -> BoxedHandler
where
    F: Fn(TransportPtr, Frame) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    // ---
    Arc::new(move |transport, frame| Box::pin(handler(transport, frame)) as BoxFuture)
}

/// Handlers for inbound frames that are not RPC traffic.
#[derive(Default)]
pub(super) struct HandlerRegistry {
    // ---
    handlers: Mutex<HashMap<u32, BoxedHandler>>,
}

impl HandlerRegistry {
    /// Register `handler` for `cmd`, replacing any previous one.
    pub fn insert(&self, cmd: u32, handler: BoxedHandler) -> Result<()> {
        // ---
        if is_reserved(cmd) {
            return Err(RpcError::ReservedCommand(cmd));
        }
        lock_ignore_poison(&self.handlers).insert(cmd, handler);
        Ok(())
    }

    pub fn remove(&self, cmd: u32) -> bool {
        lock_ignore_poison(&self.handlers).remove(&cmd).is_some()
    }

    /// Run the handler registered for `frame.cmd`.
    ///
    /// A panic inside the handler is caught and logged; it never reaches the
    /// caller. Returns `false` if no handler is registered.
    pub async fn dispatch(&self, transport: TransportPtr, frame: Frame) -> bool {
        // ---
        let cmd = frame.cmd;
        let handler = lock_ignore_poison(&self.handlers).get(&cmd).cloned();

        let Some(handler) = handler else {
            log_debug!(
                "{}: no handler for cmd {cmd:#x}, frame dropped",
                transport.transport_id()
            );
            return false;
        };

        let transport_id = transport.transport_id().to_owned();

        // the closure call sits inside the guarded future so a panic while
        // building the future is caught as well
        let outcome = AssertUnwindSafe(async move { handler(transport, frame).await })
            .catch_unwind()
            .await;

        if let Err(panic) = outcome {
            log_error!(
                "{transport_id}: handler for cmd {cmd:#x} panicked: {}",
                panic_message(panic.as_ref())
            );
        }
        true
    }
}

pub(super) fn panic_message(panic: &(dyn Any + Send)) -> String {
    // ---
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
