//! The hooks a host environment exposes to capture errors.
//!
//! A [`CaptureHost`] lets a notifier install handlers for uncaught exceptions,
//! unhandled rejections and, where the host can offer it, a side channel that
//! fires whenever the host prepares a stack trace for a thrown value.
//!
//! Two hosts ship with the crate:
//!
//! - [`PanicHost`] captures panics through [`std::panic::set_hook`] and
//!   exposes [`PanicHost::reject`] for async runtimes to report failed tasks.
//! - [`ManualHost`] fires each hook on request, for embedding in custom
//!   runtimes and for tests.

mod manual;
mod panic;

use std::sync::Arc;

pub use self::{
    manual::ManualHost,
    panic::{PANIC_ERROR_NAME, PanicHost},
};
use crate::{
    args::Arg,
    error::HostError,
    item::{ErrorValue, Location},
};

/// An uncaught exception as reported by the host.
#[derive(Debug, Clone)]
pub struct UncaughtEvent {
    /// The message the host reported.
    pub message: String,
    /// Where the exception was raised, if known.
    pub location: Option<Location>,
    /// The exception itself, if the host handed it over.
    pub error: Option<ErrorValue>,
}

impl UncaughtEvent {
    /// An event carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            error: None,
        }
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the exception object.
    #[must_use]
    pub fn with_error(mut self, error: ErrorValue) -> Self {
        self.error = Some(error);
        self
    }
}

/// Handler for uncaught exceptions.
pub type UncaughtHandler = Arc<dyn Fn(UncaughtEvent) + Send + Sync>;
/// Handler for unhandled rejections; receives the rejection reason.
pub type RejectionHandler = Arc<dyn Fn(Arg) + Send + Sync>;
/// Handler for the stack-trace side channel; receives the thrown value.
pub type StackTraceHandler = Arc<dyn Fn(&ErrorValue) + Send + Sync>;

/// Hooks offered by the host environment.
///
/// Hooks are installed at most once per notifier and never removed; a
/// notifier that stops capturing ignores further events instead.
pub trait CaptureHost: 'static + Send + Sync {
    /// Installs the uncaught-exception handler.
    fn install_uncaught(&self, handler: UncaughtHandler) -> Result<(), HostError>;

    /// Installs the unhandled-rejection handler.
    fn install_rejection(&self, handler: RejectionHandler) -> Result<(), HostError>;

    /// Installs the stack-trace handler.
    ///
    /// Hosts that cannot observe thrown values out of band keep the default,
    /// which reports [`HostError::Unsupported`].
    fn install_stack_trace(&self, handler: StackTraceHandler) -> Result<(), HostError> {
        let _ = handler;
        Err(HostError::Unsupported)
    }
}
