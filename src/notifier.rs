//! One instance of the item pipeline.
//!
//! A [`Notifier`] owns its options, capture state, pipeline and telemetry
//! buffer, and forwards finished items to its [`Transport`]. Notifiers are
//! cheap to clone; clones share all state.
//!
//! Items reach the transport through three doors:
//!
//! - the logging methods ([`Notifier::log`], [`Notifier::error`], ...), which
//!   normalise their arguments with [`create_item`];
//! - [`Notifier::handle_uncaught`], fed by the host's uncaught-exception hook,
//!   which adds duplicate suppression and anonymous-error reconciliation;
//! - [`Notifier::handle_rejection`], fed by the host's rejection hook.
//!
//! All of them run the [pipeline](crate::pipeline) synchronously on the
//! calling thread.

use core::fmt;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    args::Arg,
    capture::{
        CaptureController, ReentrancyGuard,
        anonymous::{AnonymousResolver, Resolution},
        dedup::{DedupGuard, Fingerprint},
    },
    host::{CaptureHost, PanicHost, UncaughtEvent},
    item::{ErrorValue, Item},
    level::{Level, Method},
    normalize::create_item,
    options::Options,
    pipeline::{Context, Pipeline, Predicate, Transform},
    telemetry::{EventType, Telemeter, TelemetryEvent},
    transport::{TracingTransport, Transport},
};

/// Message of items built from a rejection without a reason.
pub const NULL_REJECTION_MESSAGE: &str = "unhandled rejection was null or undefined!";

/// How long an error-less uncaught report waits for its error object before
/// it is released by the next uncaught exception.
pub const ANONYMOUS_WAIT: Duration = Duration::from_secs(1);

/// What the logging methods return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LogResult {
    /// Identifier of the item that was built, whether or not it was
    /// delivered.
    pub uuid: Uuid,
}

/// A handle to one item pipeline.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tattle::{Notifier, args};
///
/// let notifier = Notifier::new(json!({"payload": {"environment": "staging"}}));
/// let result = notifier.error(args![std::io::Error::other("disk full"), "while saving"]);
/// assert_eq!(result.uuid.get_version_num(), 4);
/// ```
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

struct Inner {
    this: Weak<Inner>,
    state: Mutex<State>,
    pipeline: Pipeline,
    transport: Arc<dyn Transport>,
    host: Arc<dyn CaptureHost>,
}

struct State {
    options: Arc<Options>,
    controller: CaptureController,
    dedup: DedupGuard,
    anonymous: AnonymousResolver,
    telemeter: Telemeter,
}

/// Configures and creates a [`Notifier`].
#[derive(Default)]
pub struct NotifierBuilder {
    options: Value,
    payload_data: Option<Map<String, Value>>,
    transport: Option<Arc<dyn Transport>>,
    host: Option<Arc<dyn CaptureHost>>,
}

impl fmt::Debug for NotifierBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierBuilder")
            .field("options", &self.options)
            .field("payload_data", &self.payload_data)
            .field("custom_transport", &self.transport.is_some())
            .field("custom_host", &self.host.is_some())
            .finish()
    }
}

impl NotifierBuilder {
    /// Sets the initial options.
    pub fn options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    /// Sets extra payload data merged into `payload`.
    pub fn payload_data(mut self, payload_data: Map<String, Value>) -> Self {
        self.payload_data = Some(payload_data);
        self
    }

    /// Sets the transport. Defaults to [`TracingTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the capture host. Defaults to a new [`PanicHost`].
    pub fn host(mut self, host: Arc<dyn CaptureHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Creates the notifier.
    ///
    /// Capture switches are evaluated from the initial options before this
    /// returns, so no host event can observe a half-configured notifier.
    pub fn build(self) -> Notifier {
        let Self {
            options,
            payload_data,
            transport,
            host,
        } = self;

        let mut initial = Options::new(options);
        if let Some(data) = &payload_data {
            initial.configure(&Value::Object(Map::new()), Some(data));
        }
        let initial = Arc::new(initial);

        let inner = Arc::new_cyclic(|this| Inner {
            this: this.clone(),
            state: Mutex::new(State {
                telemeter: Telemeter::new(initial.max_telemetry_events()),
                options: initial.clone(),
                controller: CaptureController::new(),
                dedup: DedupGuard::new(),
                anonymous: AnonymousResolver::new(),
            }),
            pipeline: Pipeline::with_builtins(),
            transport: transport.unwrap_or_else(|| Arc::new(TracingTransport)),
            host: host.unwrap_or_else(|| Arc::new(PanicHost::new())),
        });

        inner.update_capture(&mut inner.lock(), &initial);
        inner.transport.configure(&initial, payload_data.as_ref());
        tracing::debug!(target: "tattle::notifier", "notifier created");

        Notifier { inner }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Notifier")
            .field("options", &state.options)
            .field("controller", &state.controller)
            .field("anonymous_pending", &state.anonymous.pending())
            .field("pipeline", &self.inner.pipeline)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    /// Creates a notifier with the default transport and host.
    pub fn new(options: Value) -> Self {
        Self::builder().options(options).build()
    }

    /// Starts building a notifier.
    pub fn builder() -> NotifierBuilder {
        NotifierBuilder::default()
    }

    /// Whether both handles refer to the same notifier.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Builds an item from `args` and sends it through `method`.
    pub fn send<I>(&self, method: Method, args: I) -> LogResult
    where
        I: IntoIterator<Item = Arg>,
    {
        let item = create_item(args);
        let uuid = item.uuid;
        self.inner.deliver(method, item);
        LogResult { uuid }
    }

    /// Sends at the configured `logLevel`.
    pub fn log<I: IntoIterator<Item = Arg>>(&self, args: I) -> LogResult {
        self.send(Method::Log, args)
    }

    /// Sends at [`Level::Debug`].
    pub fn debug<I: IntoIterator<Item = Arg>>(&self, args: I) -> LogResult {
        self.send(Method::Debug, args)
    }

    /// Sends at [`Level::Info`].
    pub fn info<I: IntoIterator<Item = Arg>>(&self, args: I) -> LogResult {
        self.send(Method::Info, args)
    }

    /// Sends at [`Level::Warning`].
    pub fn warn<I: IntoIterator<Item = Arg>>(&self, args: I) -> LogResult {
        self.send(Method::Warn, args)
    }

    /// Sends at [`Level::Warning`].
    pub fn warning<I: IntoIterator<Item = Arg>>(&self, args: I) -> LogResult {
        self.send(Method::Warning, args)
    }

    /// Sends at [`Level::Error`].
    pub fn error<I: IntoIterator<Item = Arg>>(&self, args: I) -> LogResult {
        self.send(Method::Error, args)
    }

    /// Sends at [`Level::Critical`].
    pub fn critical<I: IntoIterator<Item = Arg>>(&self, args: I) -> LogResult {
        self.send(Method::Critical, args)
    }

    /// Applies new options.
    ///
    /// The options are merged onto the current ones (see
    /// [`Options::configure`]), capture switches are re-evaluated, and the
    /// transport is handed the merged result. A capture switch turned off
    /// here ignores every event from the next one on.
    pub fn configure(&self, options: Value, payload_data: Option<&Map<String, Value>>) {
        let merged = {
            let mut state = self.inner.lock();
            let mut next = Options::clone(&state.options);
            next.configure(&options, payload_data);
            let next = Arc::new(next);

            state.options = next.clone();
            state.telemeter.set_capacity(next.max_telemetry_events());
            self.inner.update_capture(&mut state, &next);
            next
        };
        tracing::debug!(target: "tattle::notifier", options = %merged.to_value(), "configured");
        self.inner.transport.configure(&merged, payload_data);
    }

    /// The current options.
    pub fn options(&self) -> Arc<Options> {
        self.inner.lock().options.clone()
    }

    /// Records a telemetry event and returns it.
    ///
    /// See [`TelemetryEvent::from_args`] for how the arguments are read.
    pub fn capture_event(
        &self,
        type_or_body: impl Into<Value>,
        body_or_level: impl Into<Value>,
        level: impl Into<Value>,
    ) -> TelemetryEvent {
        let event = TelemetryEvent::from_args(type_or_body.into(), body_or_level.into(), level.into());
        self.inner.lock().telemeter.record(event.clone());
        event
    }

    /// The buffered telemetry events, oldest first.
    pub fn telemetry(&self) -> Vec<TelemetryEvent> {
        self.inner.lock().telemeter.copy_events()
    }

    /// Appends an enrichment step.
    #[track_caller]
    pub fn add_transform<T: Transform>(&self, transform: T) -> &Self {
        self.inner.pipeline.add_transform(transform);
        self
    }

    /// Appends a filtering step.
    #[track_caller]
    pub fn add_predicate<P: Predicate>(&self, predicate: P) -> &Self {
        self.inner.pipeline.add_predicate(predicate);
        self
    }

    /// Whether uncaught exceptions are currently captured.
    pub fn is_capturing_uncaught(&self) -> bool {
        self.inner.lock().controller.uncaught.is_active()
    }

    /// Whether unhandled rejections are currently captured.
    pub fn is_capturing_rejections(&self) -> bool {
        self.inner.lock().controller.rejections.is_active()
    }

    /// Whether error-less uncaught reports wait for a stack-trace candidate.
    pub fn is_inspecting_anonymous_errors(&self) -> bool {
        self.inner.lock().controller.stack_traces.is_active()
    }

    /// Processes an uncaught exception reported by the host.
    ///
    /// Does nothing while uncaught capture is inactive. A report identical to
    /// the previous one is suppressed when `ignoreDuplicateErrors` is set. A
    /// report with neither an error object nor a location waits for a
    /// stack-trace candidate when anonymous inspection is active.
    pub fn handle_uncaught(&self, event: UncaughtEvent) {
        let Some(_guard) = ReentrancyGuard::enter() else {
            tracing::trace!(target: "tattle::capture", "dropping uncaught exception raised while handling another");
            return;
        };
        self.inner.handle_uncaught(event);
    }

    /// Processes an unhandled rejection reported by the host.
    ///
    /// Does nothing while rejection capture is inactive.
    pub fn handle_rejection(&self, reason: impl Into<Arg>) {
        let Some(_guard) = ReentrancyGuard::enter() else {
            tracing::trace!(target: "tattle::capture", "dropping rejection raised while handling another");
            return;
        };
        self.inner.handle_rejection(reason.into());
    }

    /// Offers a thrown value seen by the host's stack-trace hook.
    pub fn on_anonymous_candidate(&self, candidate: &ErrorValue) {
        let Some(_guard) = ReentrancyGuard::enter() else {
            return;
        };
        self.inner.on_anonymous_candidate(candidate);
    }

    /// Records that `count` error-less reports are pending without queuing
    /// them; the next candidates become those reports.
    pub fn mark_anonymous_pending(&self, count: usize) {
        self.inner.lock().anonymous.announce(count);
    }

    /// Number of reports awaiting an error object.
    pub fn anonymous_errors_pending(&self) -> usize {
        self.inner.lock().anonymous.pending()
    }

    /// Delivers every pending error-less report as it is.
    ///
    /// Also runs when the last handle to the notifier is dropped.
    pub fn flush_anonymous(&self) {
        self.inner.flush_anonymous();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(target: "tattle::notifier", "recovering poisoned notifier state");
            PoisonError::into_inner(poisoned)
        })
    }

    fn update_capture(&self, state: &mut State, options: &Options) {
        let host = &*self.host;

        let this = self.this.clone();
        state.controller.uncaught.update(options.capture_uncaught(), || {
            host.install_uncaught(Arc::new(move |event: UncaughtEvent| {
                if let Some(inner) = this.upgrade()
                    && let Some(_guard) = ReentrancyGuard::enter()
                {
                    inner.handle_uncaught(event);
                }
            }))
        });

        let this = self.this.clone();
        state
            .controller
            .rejections
            .update(options.capture_unhandled_rejections(), || {
                host.install_rejection(Arc::new(move |reason: Arg| {
                    if let Some(inner) = this.upgrade()
                        && let Some(_guard) = ReentrancyGuard::enter()
                    {
                        inner.handle_rejection(reason);
                    }
                }))
            });

        let this = self.this.clone();
        let inspect = options.inspect_anonymous_errors() && options.capture_uncaught();
        state.controller.stack_traces.update(inspect, || {
            host.install_stack_trace(Arc::new(move |candidate: &ErrorValue| {
                if let Some(inner) = this.upgrade()
                    && let Some(_guard) = ReentrancyGuard::enter()
                {
                    inner.on_anonymous_candidate(candidate);
                }
            }))
        });
    }

    fn handle_uncaught(&self, event: UncaughtEvent) {
        let UncaughtEvent {
            message,
            location,
            error,
        } = event;
        let anonymous = error.is_none() && location.is_none();

        let (level, stale, item) = {
            let mut state = self.lock();
            if !state.controller.uncaught.is_active() {
                tracing::trace!(target: "tattle::capture", "uncaught capture inactive, ignoring event");
                return;
            }
            let level = state.options.uncaught_error_level();
            let ignore_duplicates = state.options.ignore_duplicate_errors();

            let mut args = vec![Arg::String(message)];
            args.extend(error.map(Arg::Error));
            let mut item = create_item(args);
            item.location = location;
            item.level = Some(level);
            item.diagnostic.is_uncaught = true;

            let stale = state.anonymous.drain_older_than(ANONYMOUS_WAIT);
            let suppress = state
                .dedup
                .should_suppress(Fingerprint::of_item(&item), ignore_duplicates);

            let item = if suppress {
                tracing::debug!(target: "tattle::capture", uuid = %item.uuid, "suppressing duplicate uncaught exception");
                None
            } else if anonymous && state.controller.stack_traces.is_active() {
                tracing::debug!(target: "tattle::capture", uuid = %item.uuid, "waiting for the error object of an anonymous report");
                state.anonymous.defer(item);
                None
            } else {
                Some(item)
            };
            (level, stale, item)
        };

        self.release(stale);
        if let Some(item) = item {
            self.deliver(Method::for_level(level), item);
        }
    }

    fn handle_rejection(&self, reason: Arg) {
        let level = {
            let state = self.lock();
            if !state.controller.rejections.is_active() {
                tracing::trace!(target: "tattle::capture", "rejection capture inactive, ignoring event");
                return;
            }
            state.options.uncaught_error_level()
        };

        let args = match reason {
            Arg::String(message) => vec![Arg::String(message)],
            Arg::Null | Arg::Callback(_) => vec![Arg::String(NULL_REJECTION_MESSAGE.to_owned())],
            Arg::Error(err) => vec![Arg::String(err.message()), Arg::Error(err)],
            other => vec![Arg::String(other.to_value().to_string()), other],
        };
        let mut item = create_item(args);
        item.level = Some(level);
        item.diagnostic.is_uncaught = true;

        self.deliver(Method::for_level(level), item);
    }

    fn on_anonymous_candidate(&self, candidate: &ErrorValue) {
        let (resolution, level) = {
            let mut state = self.lock();
            if !state.controller.stack_traces.is_active() {
                return;
            }
            (
                state.anonymous.resolve(candidate),
                state.options.uncaught_error_level(),
            )
        };

        let item = match resolution {
            Resolution::Idle => return,
            Resolution::Correlated(item) | Resolution::Released(item) => item,
            Resolution::Announced(err) => {
                let location = err.location().cloned();
                let mut item = create_item([Arg::String(err.message()), Arg::Error(err)]);
                item.location = location;
                item.level = Some(level);
                item.diagnostic.is_uncaught = true;
                item.diagnostic.is_anonymous = true;
                item
            }
        };
        self.deliver(Method::for_level(item.level.unwrap_or(level)), item);
    }

    fn flush_anonymous(&self) {
        let pending = self.lock().anonymous.drain();
        self.release(pending);
    }

    fn release(&self, items: Vec<Item>) {
        for item in items {
            let method = Method::for_level(item.level.unwrap_or(Level::Error));
            self.deliver(method, item);
        }
    }

    /// Runs the pipeline and hands the surviving item to the transport.
    fn deliver(&self, method: Method, item: Item) {
        let (options, telemetry) = {
            let state = self.lock();
            (state.options.clone(), state.telemeter.copy_events())
        };

        let cx = Context::new(method, &options, &telemetry);
        let Some(item) = self.pipeline.run(item, &cx) else {
            return;
        };

        if item.level.is_some_and(|level| level >= Level::Error) {
            let mut body = Map::new();
            let message = item
                .err
                .as_ref()
                .map(ErrorValue::message)
                .or_else(|| item.message.clone())
                .unwrap_or_default();
            body.insert("message".to_owned(), Value::String(message));
            body.insert("uuid".to_owned(), Value::String(item.uuid.to_string()));
            let level = item.level.unwrap_or(Level::Error);
            self.lock()
                .telemeter
                .record(TelemetryEvent::new(EventType::Error, level, body));
        }

        self.transport.send(method, item);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let pending = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .anonymous
            .drain();
        if !pending.is_empty() {
            tracing::debug!(target: "tattle::notifier", count = pending.len(), "flushing anonymous reports on drop");
            self.release(pending);
        }
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Notifier: Send, Sync, Clone);
    assert_impl_all!(Item: Send, Sync);
    assert_impl_all!(LogResult: Send, Sync, Copy);

    #[test]
    fn test_log_result_uuid() {
        let notifier = Notifier::new(Value::Null);
        let result = notifier.log(crate::args!["hello"]);
        let rendered = result.uuid.to_string();
        assert_eq!(rendered.split('-').count(), 5);
        assert_eq!(rendered.split('-').nth(2).map(|g| &g[..1]), Some("4"));
    }

    #[test]
    fn test_default_capture_is_off() {
        let notifier = Notifier::new(Value::Null);
        assert!(!notifier.is_capturing_uncaught());
        assert!(!notifier.is_capturing_rejections());
        assert!(!notifier.is_inspecting_anonymous_errors());
    }
}
