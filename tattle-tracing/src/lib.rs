#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    unused_doc_comments
)]

//! Tracing integration for tattle.
//!
//! This crate connects [`tracing`] to a tattle [`Notifier`] in two
//! directions:
//!
//! - [`TattleLayer`] records every `tracing` event as a `log` telemetry
//!   event, so items carry the trail of log lines that led up to them. It
//!   also captures span field values for the transform below.
//! - [`SpanTransform`] attaches the active span chain to each item under
//!   `custom.span`, innermost span first.
//!
//! # Quick Start
//!
//! ```
//! use serde_json::json;
//! use tattle_tracing::{SpanTransform, TattleLayer};
//! use tracing_subscriber::{Registry, layer::SubscriberExt};
//!
//! // 1. Set up tracing with TattleLayer
//! let subscriber = Registry::default()
//!     .with(TattleLayer::new()) // Records events and span fields
//!     .with(tracing_subscriber::fmt::layer()); // Your normal console output
//! tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");
//!
//! // 2. Attach spans to every item (optional)
//! let notifier = tattle::init(json!({}), None);
//! notifier.add_transform(SpanTransform::new());
//!
//! // 3. Use normally
//! #[tracing::instrument(fields(user_id = 42))]
//! fn example() {
//!     tracing::info!("loading profile");
//!     tattle::error(tattle::args!["profile missing"]);
//! }
//! example();
//! # tattle::reset();
//! ```
//!
//! The item sent by `example` carries `custom.span == ["example{user_id=42}"]`
//! and a `log` telemetry event with the body
//! `{"message": "loading profile", "target": ...}`.
//!
//! Events whose target starts with `tattle` are never recorded, so the
//! crate's own diagnostics do not feed back into the telemetry buffer.
//!
//! # Environment Variables
//!
//! - `TATTLE_TRACING` - Comma-separated options:
//!   - `errors` - Only attach spans to items at `error` level or above
//!   - `no-events` - Do not record `tracing` events as telemetry

use std::{fmt, sync::OnceLock};

use serde_json::{Map, Value};
use tattle::{
    Item, Level, Notifier,
    pipeline::{Context, Transform},
};
use tracing::{
    Span,
    field::{Field, Visit},
};
use tracing_subscriber::registry::LookupSpan;

/// Key under `custom` that [`SpanTransform`] writes to.
pub const SPAN_KEY: &str = "span";

/// Captured field values for a span.
#[derive(Clone, Default)]
struct CapturedFields(String);

impl fmt::Display for CapturedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Formats field values as space-separated `name=value` pairs.
struct FieldVisitor<'a> {
    output: &'a mut String,
}

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        use std::fmt::Write;
        if !self.output.is_empty() {
            let _ = write!(self.output, " ");
        }
        let _ = write!(self.output, "{}={:?}", field.name(), value);
    }
}

// Collects an event's fields into a telemetry body.
#[derive(Default)]
struct BodyVisitor {
    body: Map<String, Value>,
}

impl Visit for BodyVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.body.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.body.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.body.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.body.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.body.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.body
            .insert(field.name().to_owned(), Value::String(format!("{value:?}")));
    }
}

/// Maps a `tracing` level onto a tattle severity.
///
/// `TRACE` and `DEBUG` both map to [`Level::Debug`].
pub fn level_for(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::INFO => Level::Info,
        _ => Level::Debug,
    }
}

/// A tracing layer that feeds tattle.
///
/// Add this to your subscriber alongside your other layers. It captures span
/// field values for [`SpanTransform`] and, unless disabled, records each
/// event as a `log` telemetry event on a notifier.
///
/// # Examples
///
/// ```
/// use tattle_tracing::TattleLayer;
/// use tracing_subscriber::{Registry, layer::SubscriberExt};
///
/// let subscriber = Registry::default()
///     .with(TattleLayer::new())
///     .with(tracing_subscriber::fmt::layer());
///
/// tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");
/// ```
#[derive(Clone, Debug)]
pub struct TattleLayer {
    /// Whether events are recorded as telemetry.
    pub record_events: bool,
    notifier: Option<Notifier>,
}

impl TattleLayer {
    /// Creates a layer that records events on the default notifier.
    ///
    /// Respects the `no-events` option of the `TATTLE_TRACING` environment
    /// variable.
    pub fn new() -> Self {
        Self {
            record_events: !TattleTracingEnvOptions::get().no_events,
            notifier: None,
        }
    }

    /// Records events on `notifier` instead of the default notifier.
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    fn target_notifier(&self) -> Option<Notifier> {
        self.notifier.clone().or_else(tattle::current)
    }
}

impl Default for TattleLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> tracing_subscriber::Layer<S> for TattleLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut buf = String::new();
        attrs.record(&mut FieldVisitor { output: &mut buf });
        span.extensions_mut().insert(CapturedFields(buf));
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<CapturedFields>() {
            values.record(&mut FieldVisitor {
                output: &mut fields.0,
            });
        } else {
            let mut buf = String::new();
            values.record(&mut FieldVisitor { output: &mut buf });
            extensions.insert(CapturedFields(buf));
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        if !self.record_events {
            return;
        }
        let metadata = event.metadata();
        if metadata.target().starts_with("tattle") {
            return;
        }
        let Some(notifier) = self.target_notifier() else {
            return;
        };

        let mut visitor = BodyVisitor::default();
        event.record(&mut visitor);
        let mut body = visitor.body;
        body.insert("target".to_owned(), Value::from(metadata.target()));

        let level = level_for(metadata.level());
        notifier.capture_event("log", Value::Object(body), level.as_str());
    }
}

/// Transform that attaches the active span chain to items.
///
/// The chain is written to `custom.span` as an array of `name{fields}`
/// strings, innermost span first. Items that already have a `custom.span`
/// value, and items sent outside of any span, are left alone.
///
/// Spans are only visible when the current subscriber is a
/// [`tracing_subscriber::Registry`] with a [`TattleLayer`].
///
/// # Examples
///
/// Custom configuration:
///
/// ```
/// use tattle_tracing::SpanTransform;
///
/// let notifier = tattle::Notifier::new(serde_json::json!({}));
/// notifier.add_transform(SpanTransform { errors_only: true });
/// ```
#[derive(Copy, Clone, Debug)]
pub struct SpanTransform {
    /// Whether to attach spans only to items at `error` level or above.
    ///
    /// When `false`, every item gets the span chain.
    pub errors_only: bool,
}

#[derive(Debug)]
struct TattleTracingEnvOptions {
    errors_only: bool,
    no_events: bool,
}

impl TattleTracingEnvOptions {
    fn get() -> &'static Self {
        static TATTLE_TRACING_FLAGS: OnceLock<TattleTracingEnvOptions> = OnceLock::new();

        TATTLE_TRACING_FLAGS.get_or_init(|| {
            let mut errors_only = false;
            let mut no_events = false;

            if let Some(var) = std::env::var_os("TATTLE_TRACING") {
                for v in var.to_string_lossy().split(',') {
                    let v = v.trim();
                    if v.eq_ignore_ascii_case("errors") {
                        errors_only = true;
                    } else if v.eq_ignore_ascii_case("no-events") {
                        no_events = true;
                    }
                }
            }

            TattleTracingEnvOptions {
                errors_only,
                no_events,
            }
        })
    }
}

impl SpanTransform {
    /// Creates a new [`SpanTransform`] with default settings.
    ///
    /// Respects the `errors` option of the `TATTLE_TRACING` environment
    /// variable.
    pub fn new() -> Self {
        Self {
            errors_only: TattleTracingEnvOptions::get().errors_only,
        }
    }
}

impl Default for SpanTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for SpanTransform {
    fn apply(&self, item: &mut Item, _cx: &Context<'_>) {
        if self.errors_only && item.level.is_none_or(|level| level < Level::Error) {
            return;
        }
        if item.custom.contains_key(SPAN_KEY) {
            return;
        }
        let chain = span_chain(&Span::current());
        if !chain.is_empty() {
            item.custom.insert(
                SPAN_KEY.to_owned(),
                Value::Array(chain.into_iter().map(Value::String).collect()),
            );
        }
    }
}

/// Formats `span` and its ancestors as `name{fields}`, innermost first.
///
/// Returns an empty list for disabled spans, or when the subscriber is not a
/// [`tracing_subscriber::Registry`].
pub fn span_chain(span: &Span) -> Vec<String> {
    span.with_subscriber(|(span_id, dispatch)| {
        let Some(subscriber) = dispatch.downcast_ref::<tracing_subscriber::Registry>() else {
            return Vec::new();
        };
        let Some(span_ref) = subscriber.span(span_id) else {
            return Vec::new();
        };

        span_ref
            .scope()
            .map(|ancestor| {
                let extensions = ancestor.extensions();
                match extensions.get::<CapturedFields>() {
                    Some(fields) if !fields.0.is_empty() => {
                        format!("{}{{{fields}}}", ancestor.name())
                    }
                    _ => ancestor.name().to_owned(),
                }
            })
            .collect()
    })
    .unwrap_or_default()
}

/// The chain of the current span. See [`span_chain`].
pub fn current_span_chain() -> Vec<String> {
    span_chain(&Span::current())
}
