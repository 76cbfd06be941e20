use std::{
    panic::{self, PanicHookInfo},
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
};

use super::{CaptureHost, RejectionHandler, UncaughtEvent, UncaughtHandler};
use crate::{
    args::Arg,
    error::HostError,
    item::{ErrorValue, Location},
};

/// Class name given to errors built from panics.
pub const PANIC_ERROR_NAME: &str = "Panic";

/// A host that captures panics.
///
/// The first uncaught handler installed sets a panic hook that runs every
/// handler installed on this host, in installation order, and then whatever
/// panic hook was set before. Several notifiers can therefore share one
/// `PanicHost`; each of them sees every panic.
///
/// Rejections have no standard source in Rust, so async runtimes report failed
/// tasks through [`PanicHost::reject`].
///
/// Panics raised by pipeline steps while a panic is being reported abort the
/// process, as any panic inside a panic hook does.
#[derive(Default)]
pub struct PanicHost {
    hook_installed: OnceLock<()>,
    uncaught: Arc<Mutex<Vec<UncaughtHandler>>>,
    rejection: Mutex<Vec<RejectionHandler>>,
}

impl core::fmt::Debug for PanicHost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PanicHost")
            .field("hook_installed", &self.hook_installed.get().is_some())
            .field("uncaught", &lock(&self.uncaught).len())
            .field("rejection", &lock(&self.rejection).len())
            .finish()
    }
}

impl PanicHost {
    /// Creates a host with nothing installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports a failed asynchronous task.
    pub fn reject(&self, reason: impl Into<Arg>) {
        let reason = reason.into();
        let handlers = lock(&self.rejection).clone();
        for handler in handlers {
            handler(reason.clone());
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds the event for a panic.
fn panic_event(info: &PanicHookInfo<'_>) -> UncaughtEvent {
    let payload = info.payload();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Box<dyn Any>".to_owned());
    let location = info
        .location()
        .map(|l| Location::new(l.file().to_owned(), l.line(), l.column()));

    let error = ErrorValue::from_message(PANIC_ERROR_NAME, message.clone())
        .with_location(location.clone());
    #[cfg(feature = "backtrace")]
    let error = error.with_stack(stack_fingerprint());

    UncaughtEvent {
        message,
        location,
        error: Some(error),
    }
}

/// Unresolved instruction pointers of the current stack, one per line.
///
/// Symbols are not resolved: the stack only serves to tell otherwise
/// identical panics apart.
#[cfg(feature = "backtrace")]
fn stack_fingerprint() -> String {
    const MAX_FRAMES: usize = 64;

    let mut frames = Vec::new();
    backtrace::trace(|frame| {
        frames.push(format!("{:p}", frame.ip()));
        frames.len() < MAX_FRAMES
    });
    frames.join("\n")
}

impl CaptureHost for PanicHost {
    fn install_uncaught(&self, handler: UncaughtHandler) -> Result<(), HostError> {
        lock(&self.uncaught).push(handler);
        if self.hook_installed.set(()).is_err() {
            return Ok(());
        }

        let handlers = self.uncaught.clone();
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let event = panic_event(info);
            let current = lock(&handlers).clone();
            for handler in current {
                handler(event.clone());
            }
            previous(info);
        }));
        tracing::debug!(target: "tattle::host", "panic hook installed");
        Ok(())
    }

    fn install_rejection(&self, handler: RejectionHandler) -> Result<(), HostError> {
        lock(&self.rejection).push(handler);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_stack_trace_hook_is_unsupported() {
        let host = PanicHost::new();
        assert_eq!(
            host.install_stack_trace(Arc::new(|_: &ErrorValue| {})),
            Err(HostError::Unsupported)
        );
    }

    #[test]
    fn test_handlers_accumulate() {
        let host = PanicHost::new();
        for _ in 0..2 {
            assert_eq!(host.install_uncaught(Arc::new(|_: UncaughtEvent| {})), Ok(()));
        }
        assert_eq!(lock(&host.uncaught).len(), 2);
        assert!(host.hook_installed.get().is_some());
    }

    #[test]
    fn test_reject_reaches_handlers() {
        let host = PanicHost::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        host.install_rejection(Arc::new(move |reason: Arg| lock(&sink).push(reason.to_value())))
            .unwrap();
        host.reject("task failed");
        assert_eq!(*lock(&seen), [serde_json::json!("task failed")]);
    }
}
