use std::panic::{catch_unwind, AssertUnwindSafe};

use super::handler::panic_message;
use crate::log_error;

/// Callback run once when the client shuts down.
pub(super) type CloseHook = Box<dyn FnOnce() + Send + 'static>;

/// Named close hooks, fired at most once.
#[derive(Default)]
pub(super) struct CloseHooks {
    // ---
    fired: bool,
    hooks: Vec<(String, CloseHook)>,
}

impl CloseHooks {
    /// Store `hook` under `name`, replacing a hook with the same name.
    ///
    /// If the hooks already fired, the hook is handed back so the caller can
    /// run it right away.
    pub fn register(&mut self, name: String, hook: CloseHook) -> Option<CloseHook> {
        // ---
        if self.fired {
            return Some(hook);
        }
        self.hooks.retain(|(existing, _)| *existing != name);
        self.hooks.push((name, hook));
        None
    }

    /// Take every hook and mark the set as fired.
    pub fn take_all(&mut self) -> Vec<(String, CloseHook)> {
        self.fired = true;
        std::mem::take(&mut self.hooks)
    }
}

/// Run one hook; a panic is logged and swallowed.
pub(super) fn run_hook(transport_id: &str, name: &str, hook: CloseHook) {
    // ---
    if let Err(panic) = catch_unwind(AssertUnwindSafe(hook)) {
        log_error!(
            "{transport_id}: close hook {name:?} panicked: {}",
            panic_message(panic.as_ref())
        );
    }
}
