//! Injected structured-logging sink.
//!
//! Components never log through the process-global subscriber directly.
//! Each one is handed an [`EngineLog`] at construction and emits its
//! `tracing` events inside [`EngineLog::scope`], which routes them to the
//! dispatcher captured in the handle.

use std::fmt;
use tracing::Dispatch;

/// Handle to the `tracing` dispatcher a component logs into.
#[derive(Clone)]
pub struct EngineLog {
    dispatch: Dispatch,
}

impl EngineLog {
    /// Log into an explicit dispatcher.
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Capture whichever dispatcher is active on this thread right now.
    pub fn current() -> Self {
        Self {
            dispatch: tracing::dispatcher::get_default(Dispatch::clone),
        }
    }

    /// Discard every event.
    pub fn silent() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// Run `f` with this handle's dispatcher as the thread default.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl Default for EngineLog {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Debug for EngineLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineLog").finish_non_exhaustive()
    }
}
