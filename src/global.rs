//! Crate-level functions routed to the process-wide default notifier.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{
    args::Arg,
    notifier::{LogResult, Notifier},
    pipeline::{Predicate, Transform},
    registry::Registry,
    telemetry::TelemetryEvent,
    transport::Transport,
};

static REGISTRY: Registry = Registry::new();

/// The registry behind the crate-level functions.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Creates the default notifier, or reconfigures it if it already exists.
///
/// See [`Registry::init`].
pub fn init(options: Value, transport: Option<Arc<dyn Transport>>) -> Notifier {
    REGISTRY.init(options, transport)
}

/// The default notifier, if [`init`] has been called.
pub fn current() -> Option<Notifier> {
    REGISTRY.current()
}

/// Removes the default notifier and returns it.
pub fn reset() -> Option<Notifier> {
    REGISTRY.reset()
}

/// Applies options to the default notifier. Does nothing before [`init`].
pub fn configure(options: Value, payload_data: Option<&Map<String, Value>>) {
    REGISTRY.with_current(|notifier| notifier.configure(options, payload_data));
}

/// Records a telemetry event on the default notifier.
///
/// Returns `None` before [`init`].
pub fn capture_event(
    type_or_body: impl Into<Value>,
    body_or_level: impl Into<Value>,
    level: impl Into<Value>,
) -> Option<TelemetryEvent> {
    REGISTRY.with_current(|notifier| notifier.capture_event(type_or_body, body_or_level, level))
}

/// Appends a transform to the default notifier.
///
/// Returns `false`, dropping the step, before [`init`].
#[track_caller]
pub fn add_transform<T: Transform>(transform: T) -> bool {
    let Some(notifier) = REGISTRY.current() else {
        return false;
    };
    notifier.add_transform(transform);
    true
}

/// Appends a predicate to the default notifier.
///
/// Returns `false`, dropping the step, before [`init`].
#[track_caller]
pub fn add_predicate<P: Predicate>(predicate: P) -> bool {
    let Some(notifier) = REGISTRY.current() else {
        return false;
    };
    notifier.add_predicate(predicate);
    true
}

macro_rules! global_log_fns {
    ($($(#[$attr:meta])* $name:ident;)*) => {
        $(
            $(#[$attr])*
            ///
            /// Returns `None`, dropping the arguments, before [`init`].
            pub fn $name<I: IntoIterator<Item = Arg>>(args: I) -> Option<LogResult> {
                REGISTRY.with_current(|notifier| notifier.$name(args))
            }
        )*
    };
}

global_log_fns! {
    /// [`Notifier::log`] on the default notifier.
    log;
    /// [`Notifier::debug`] on the default notifier.
    debug;
    /// [`Notifier::info`] on the default notifier.
    info;
    /// [`Notifier::warn`] on the default notifier.
    warn;
    /// [`Notifier::warning`] on the default notifier.
    warning;
    /// [`Notifier::error`] on the default notifier.
    error;
    /// [`Notifier::critical`] on the default notifier.
    critical;
}
