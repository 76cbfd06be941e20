use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CaptureHost, RejectionHandler, StackTraceHandler, UncaughtEvent, UncaughtHandler};
use crate::{args::Arg, error::HostError, item::ErrorValue};

/// A host whose hooks fire only when asked to.
///
/// Every installed handler is kept, so several notifiers can share one
/// `ManualHost`; each `fire_*` call reaches all of them in installation order.
///
/// ```
/// use std::sync::Arc;
///
/// use serde_json::json;
/// use tattle::{ManualHost, Notifier, UncaughtEvent};
///
/// let host = Arc::new(ManualHost::new());
/// let notifier = Notifier::builder()
///     .options(json!({"captureUncaught": true}))
///     .host(host.clone())
///     .build();
///
/// host.fire_uncaught(UncaughtEvent::new("TypeError: x is undefined"));
/// assert!(notifier.is_capturing_uncaught());
/// ```
#[derive(Default)]
pub struct ManualHost {
    uncaught: Mutex<Vec<UncaughtHandler>>,
    rejection: Mutex<Vec<RejectionHandler>>,
    stack_trace: Mutex<Vec<StackTraceHandler>>,
}

impl core::fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ManualHost")
            .field("uncaught", &lock(&self.uncaught).len())
            .field("rejection", &lock(&self.rejection).len())
            .field("stack_trace", &lock(&self.stack_trace).len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ManualHost {
    /// Creates a host with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports an uncaught exception to every handler.
    pub fn fire_uncaught(&self, event: UncaughtEvent) {
        let handlers = lock(&self.uncaught).clone();
        for handler in handlers {
            handler(event.clone());
        }
    }

    /// Reports an unhandled rejection to every handler.
    pub fn fire_rejection(&self, reason: impl Into<Arg>) {
        let reason = reason.into();
        let handlers = lock(&self.rejection).clone();
        for handler in handlers {
            handler(reason.clone());
        }
    }

    /// Reports that a stack trace is being prepared for `thrown`.
    pub fn fire_stack_trace(&self, thrown: &ErrorValue) {
        let handlers = lock(&self.stack_trace).clone();
        for handler in handlers {
            handler(thrown);
        }
    }

    /// Number of installed uncaught-exception handlers.
    pub fn uncaught_handlers(&self) -> usize {
        lock(&self.uncaught).len()
    }
}

impl CaptureHost for ManualHost {
    fn install_uncaught(&self, handler: UncaughtHandler) -> Result<(), HostError> {
        lock(&self.uncaught).push(handler);
        Ok(())
    }

    fn install_rejection(&self, handler: RejectionHandler) -> Result<(), HostError> {
        lock(&self.rejection).push(handler);
        Ok(())
    }

    fn install_stack_trace(&self, handler: StackTraceHandler) -> Result<(), HostError> {
        lock(&self.stack_trace).push(handler);
        Ok(())
    }
}
