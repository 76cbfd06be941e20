//! End-to-end tests for the tattle item pipeline.
//!
//! Each test builds a [`Notifier`] around a [`RecordingTransport`] and, where
//! capture is involved, a [`ManualHost`], then checks what reached the
//! transport.
//!
//! ## Logging
//! - `test_logging_returns_v4_uuid`: every logging call returns a v4 uuid
//! - `test_logged_item_shape`: classification of errors, strings, objects and
//!   leftovers into the delivered item
//! - `test_missing_arguments`: null-only calls are still delivered
//! - `test_callback_invoked_by_transport`: the callback reaches the transport
//! - `test_logging_while_delivering`: calls made from a callback or from a
//!   transform running on an uncaught exception are delivered
//!
//! ## Configuration
//! - `test_configured_options_snapshot`: only caller keys, payload deep-merged
//! - `test_scrub_fields_union_and_overwrite`: list union vs. replacement
//! - `test_transport_sees_every_configure`: merged options and payload data
//!   are forwarded
//!
//! ## Capture
//! - `test_duplicate_uncaught_suppressed` / `test_duplicate_uncaught_allowed`
//! - `test_capture_uncaught_toggle`: off stops delivery, on resumes it, the
//!   hook is installed only once
//! - `test_rejections`: reason handling and the capture switch
//! - `test_announced_anonymous_error`: a counted-only pending report picks up
//!   the next thrown value
//! - `test_deferred_anonymous_error`: an opaque report waits for its error
//! - `test_anonymous_without_inspection`: reports flow through untouched
//!
//! ## Pipeline and telemetry
//! - `test_filters`: `enabled`, `reportLevel` and `ignoredMessages`
//! - `test_custom_steps`: caller transforms and predicates
//! - `test_capture_event_defaults`: invalid type and level fall back
//! - `test_error_items_recorded_as_telemetry`
//!
//! ## Facade
//! - `test_default_notifier_routing`: instance and crate-level calls, steps
//!   included, hit the same notifier

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use serde_json::{Map, Value, json};
use tattle::{
    Arg, Delivery, EventType, Item, Level, Location, MISSING_ARGUMENTS_MESSAGE, ManualHost,
    Method, NULL_REJECTION_MESSAGE, Notifier, Options, Transport, UncaughtEvent, args,
    pipeline::Context,
};

#[derive(Debug, thiserror::Error)]
#[error("connection reset")]
struct ConnectionReset;

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(Method, Item)>>,
    configured: Mutex<Vec<(Value, Option<Map<String, Value>>)>>,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<(Method, Item)> {
        self.sent.lock().unwrap().clone()
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn last(&self) -> Item {
        self.sent.lock().unwrap().last().unwrap().1.clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, method: Method, item: Item) {
        if let Some(callback) = &item.callback {
            callback.call(&Ok(item.uuid));
        }
        self.sent.lock().unwrap().push((method, item));
    }

    fn configure(&self, options: &Options, payload_data: Option<&Map<String, Value>>) {
        self.configured
            .lock()
            .unwrap()
            .push((options.to_value(), payload_data.cloned()));
    }
}

fn notifier(options: Value) -> (Notifier, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let notifier = Notifier::builder()
        .options(options)
        .transport(transport.clone())
        .build();
    (notifier, transport)
}

fn captured(options: Value) -> (Notifier, Arc<RecordingTransport>, Arc<ManualHost>) {
    let transport = Arc::new(RecordingTransport::default());
    let host = Arc::new(ManualHost::new());
    let notifier = Notifier::builder()
        .options(options)
        .transport(transport.clone())
        .host(host.clone())
        .build();
    (notifier, transport, host)
}

fn at_line(line: u32) -> Location {
    Location::new("app.js", line, 4)
}

#[test]
fn test_logging_returns_v4_uuid() {
    let (notifier, transport) = notifier(json!({}));
    let results = [
        notifier.log(args!["a"]),
        notifier.debug(args!["b"]),
        notifier.info(args!["c"]),
        notifier.warn(args!["d"]),
        notifier.warning(args!["e"]),
        notifier.error(args!["f"]),
        notifier.critical(args!["g"]),
    ];

    for result in results {
        let rendered = result.uuid.to_string();
        let groups: Vec<&str> = rendered.split('-').collect();
        assert_eq!(groups.len(), 5);
        assert!(groups[2].starts_with('4'));
    }

    let levels: Vec<_> = transport
        .sent()
        .into_iter()
        .map(|(method, item)| (method, item.level))
        .collect();
    assert_eq!(
        levels,
        vec![
            (Method::Log, Some(Level::Debug)),
            (Method::Debug, Some(Level::Debug)),
            (Method::Info, Some(Level::Info)),
            (Method::Warn, Some(Level::Warning)),
            (Method::Warning, Some(Level::Warning)),
            (Method::Error, Some(Level::Error)),
            (Method::Critical, Some(Level::Critical)),
        ]
    );
}

#[test]
fn test_logged_item_shape() {
    let (notifier, transport) = notifier(json!({"payload": {"environment": "staging"}}));
    let result = notifier.error(args![
        ConnectionReset,
        "syncing inbox",
        json!({"a": 1, "b": 2}),
        "second string",
        7_i64,
    ]);

    let item = transport.last();
    assert_eq!(item.uuid, result.uuid);
    assert_eq!(item.message.as_deref(), Some("syncing inbox"));
    assert_eq!(item.err.as_ref().map(|e| e.message()).as_deref(), Some("connection reset"));
    assert!(item.err.as_ref().unwrap().downcast_ref::<ConnectionReset>().is_some());
    assert_eq!(item.custom["a"], 1);
    assert_eq!(item.custom["b"], 2);
    assert_eq!(item.extra_args(), &[json!("second string"), json!(7)]);
    assert_eq!(item.environment.as_deref(), Some("staging"));
    let raw = item.diagnostic.raw_error.as_ref().unwrap();
    assert_eq!(raw.message, "connection reset");
}

#[test]
fn test_missing_arguments() {
    let (notifier, transport) = notifier(json!({}));
    notifier.log(args![]);
    notifier.log(args![Value::Null]);

    let messages: Vec<_> = transport
        .sent()
        .into_iter()
        .map(|(_, item)| item.message)
        .collect();
    assert_eq!(
        messages,
        vec![
            Some(MISSING_ARGUMENTS_MESSAGE.to_owned()),
            Some(MISSING_ARGUMENTS_MESSAGE.to_owned())
        ]
    );
}

#[test]
fn test_callback_invoked_by_transport() {
    let (notifier, transport) = notifier(json!({}));
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let result = notifier.error(args![
        ConnectionReset,
        "first",
        move |outcome: &Delivery| {
            assert!(outcome.is_ok());
            seen.fetch_add(1, Ordering::SeqCst);
        },
        "second",
    ]);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let item = transport.last();
    assert_eq!(item.uuid, result.uuid);
    assert_eq!(item.extra_args(), &[json!("second")]);
}

#[test]
fn test_logging_while_delivering() {
    let (audit, audit_sent) = notifier(json!({}));

    let (primary, primary_sent) = notifier(json!({}));
    let from_callback = audit.clone();
    primary.error(args!["first", move |_: &Delivery| {
        from_callback.info(args!["delivered follow-up"]);
    }]);
    assert_eq!(primary_sent.count(), 1);

    let (capturing, _, host) = captured(json!({"captureUncaught": true}));
    let from_transform = audit.clone();
    capturing.add_transform(move |item: &mut Item, _cx: &Context<'_>| {
        if item.diagnostic.is_uncaught {
            from_transform.warn(args!["uncaught seen"]);
        }
    });
    host.fire_uncaught(UncaughtEvent::new("boom").with_location(at_line(5)));

    let messages: Vec<_> = audit_sent
        .sent()
        .into_iter()
        .map(|(_, item)| item.message)
        .collect();
    assert_eq!(
        messages,
        [
            Some("delivered follow-up".to_owned()),
            Some("uncaught seen".to_owned())
        ]
    );
}

#[test]
fn test_configured_options_snapshot() {
    let (notifier, transport) = notifier(json!({
        "captureUncaught": true,
        "payload": {"environment": "production"},
    }));
    notifier.configure(json!({"payload": {"person": {"id": 1}}}), None);

    let options = notifier.options();
    assert_eq!(
        Value::Object(options.configured_options().clone()),
        json!({
            "captureUncaught": true,
            "payload": {"environment": "production", "person": {"id": 1}},
        })
    );
    assert!(!options.configured_options().contains_key("scrubFields"));
    assert!(options.get("scrubFields").is_some());

    notifier.info(args!["configured"]);
    let item = transport.last();
    let snapshot = item.diagnostic.configured_options.unwrap();
    assert_eq!(snapshot["payload"]["person"]["id"], 1);
}

#[test]
fn test_scrub_fields_union_and_overwrite() {
    let (notifier, _) = notifier(json!({}));
    assert!(notifier.options().scrub_fields().contains("password"));

    notifier.configure(json!({"scrubFields": ["foo"]}), None);
    let fields = notifier.options().scrub_fields();
    assert!(fields.contains("foo"));
    assert!(fields.contains("password"));

    notifier.configure(json!({"scrubFields": ["foo"], "overwriteScrubFields": true}), None);
    let fields = notifier.options().scrub_fields();
    assert_eq!(fields.into_iter().collect::<Vec<_>>(), vec!["foo".to_owned()]);
}

#[test]
fn test_transport_sees_every_configure() {
    let (notifier, transport) = notifier(json!({"accessToken": "abc"}));
    let mut data = Map::new();
    data.insert("environment".to_owned(), json!("from-data"));
    notifier.configure(json!({"payload": {"environment": "from-options"}}), Some(&data));

    let configured = transport.configured.lock().unwrap().clone();
    assert_eq!(configured.len(), 2);
    assert_eq!(configured[0].0["accessToken"], "abc");
    assert!(configured[0].1.is_none());

    let (options, payload_data) = &configured[1];
    assert_eq!(options["payload"]["environment"], "from-data");
    assert_eq!(payload_data.as_ref(), Some(&data));
    assert_eq!(notifier.options().environment(), Some("from-data"));
}

#[test]
fn test_duplicate_uncaught_suppressed() {
    let (_notifier, transport, host) = captured(json!({"captureUncaught": true}));

    let event = UncaughtEvent::new("TypeError: x is undefined").with_location(at_line(10));
    host.fire_uncaught(event.clone());
    host.fire_uncaught(event);
    assert_eq!(transport.count(), 1);

    let (method, item) = transport.sent().remove(0);
    assert_eq!(method, Method::Error);
    assert_eq!(item.level, Some(Level::Error));
    assert!(item.diagnostic.is_uncaught);
    assert_eq!(item.location, Some(at_line(10)));
    let raw = item.diagnostic.raw_error.unwrap();
    assert_eq!(raw.name, "TypeError");
    assert_eq!(raw.message, "x is undefined");

    // A different location is a different exception.
    host.fire_uncaught(UncaughtEvent::new("TypeError: x is undefined").with_location(at_line(11)));
    assert_eq!(transport.count(), 2);
}

#[test]
fn test_duplicate_uncaught_allowed() {
    let (_notifier, transport, host) =
        captured(json!({"captureUncaught": true, "ignoreDuplicateErrors": false}));

    let event = UncaughtEvent::new("TypeError: x is undefined").with_location(at_line(10));
    host.fire_uncaught(event.clone());
    host.fire_uncaught(event);
    assert_eq!(transport.count(), 2);
}

#[test]
fn test_capture_uncaught_toggle() {
    let (notifier, transport, host) = captured(json!({"captureUncaught": true}));
    assert!(notifier.is_capturing_uncaught());

    host.fire_uncaught(UncaughtEvent::new("first").with_location(at_line(1)));
    assert_eq!(transport.count(), 1);

    notifier.configure(json!({"captureUncaught": false}), None);
    assert!(!notifier.is_capturing_uncaught());
    host.fire_uncaught(UncaughtEvent::new("second").with_location(at_line(2)));
    assert_eq!(transport.count(), 1);

    notifier.configure(json!({"captureUncaught": true}), None);
    notifier.configure(json!({"captureUncaught": true}), None);
    assert!(notifier.is_capturing_uncaught());
    host.fire_uncaught(UncaughtEvent::new("third").with_location(at_line(3)));
    assert_eq!(transport.count(), 2);

    assert_eq!(host.uncaught_handlers(), 1);
}

#[test]
fn test_rejections() {
    let (notifier, transport, host) = captured(json!({"captureUnhandledRejections": true}));
    assert!(notifier.is_capturing_rejections());

    host.fire_rejection(Arg::Null);
    assert_eq!(transport.last().message.as_deref(), Some(NULL_REJECTION_MESSAGE));

    host.fire_rejection("quota exceeded");
    let item = transport.last();
    assert_eq!(item.message.as_deref(), Some("quota exceeded"));
    assert!(item.err.is_none());
    assert!(item.diagnostic.is_uncaught);

    host.fire_rejection(tattle::ErrorValue::new(ConnectionReset));
    let item = transport.last();
    assert_eq!(item.message.as_deref(), Some("connection reset"));
    assert!(item.err.is_some());
    assert_eq!(item.level, Some(Level::Error));
    assert_eq!(transport.count(), 3);

    notifier.configure(json!({"captureUnhandledRejections": false}), None);
    host.fire_rejection("ignored");
    assert_eq!(transport.count(), 3);
}

#[test]
fn test_announced_anonymous_error() {
    let (notifier, transport, host) =
        captured(json!({"captureUncaught": true, "inspectAnonymousErrors": true}));
    assert!(notifier.is_inspecting_anonymous_errors());

    // Nothing pending: candidates are ignored.
    host.fire_stack_trace(&tattle::ErrorValue::from_message("Error", "unrelated"));
    assert_eq!(transport.count(), 0);

    notifier.mark_anonymous_pending(1);
    assert_eq!(notifier.anonymous_errors_pending(), 1);
    host.fire_stack_trace(&tattle::ErrorValue::from_message("Error", "anon error"));

    assert_eq!(notifier.anonymous_errors_pending(), 0);
    let item = transport.last();
    assert!(item.diagnostic.is_anonymous);
    assert_eq!(item.err.unwrap().message(), "anon error");
}

#[test]
fn test_deferred_anonymous_error() {
    let (notifier, transport, host) =
        captured(json!({"captureUncaught": true, "inspectAnonymousErrors": true}));

    host.fire_uncaught(UncaughtEvent::new("Script error."));
    assert_eq!(transport.count(), 0);
    assert_eq!(notifier.anonymous_errors_pending(), 1);

    let thrown = tattle::ErrorValue::from_message("TypeError", "cannot read property 'id'");
    host.fire_stack_trace(&thrown);

    assert_eq!(notifier.anonymous_errors_pending(), 0);
    let item = transport.last();
    assert_eq!(item.message.as_deref(), Some("Script error."));
    assert!(item.diagnostic.is_anonymous);
    assert!(item.err.unwrap().ptr_eq(&thrown));
}

#[test]
fn test_anonymous_without_inspection() {
    let (notifier, transport, host) = captured(json!({"captureUncaught": true}));
    assert!(!notifier.is_inspecting_anonymous_errors());

    host.fire_uncaught(UncaughtEvent::new("Script error."));
    let item = transport.last();
    assert!(item.err.is_none());
    assert!(!item.diagnostic.is_anonymous);
}

#[test]
fn test_pending_anonymous_flushed() {
    let (notifier, transport, host) =
        captured(json!({"captureUncaught": true, "inspectAnonymousErrors": true}));

    host.fire_uncaught(UncaughtEvent::new("Script error."));
    assert_eq!(transport.count(), 0);

    notifier.flush_anonymous();
    assert_eq!(transport.count(), 1);
    assert!(transport.last().err.is_none());
}

#[test]
fn test_filters() {
    let (notifier, transport) = notifier(json!({
        "reportLevel": "warning",
        "ignoredMessages": ["^healthcheck"],
    }));

    notifier.info(args!["below report level"]);
    notifier.error(args!["healthcheck failed"]);
    notifier.error(args!["real failure"]);
    assert_eq!(transport.count(), 1);
    assert_eq!(transport.last().message.as_deref(), Some("real failure"));

    notifier.configure(json!({"enabled": false}), None);
    notifier.critical(args!["disabled"]);
    assert_eq!(transport.count(), 1);
}

#[test]
fn test_custom_steps() {
    let (notifier, transport) = notifier(json!({}));
    notifier
        .add_transform(|item: &mut Item, cx: &Context<'_>| {
            item.custom.insert("method".to_owned(), json!(cx.method.as_str()));
        })
        .add_predicate(|item: &Item, _cx: &Context<'_>| item.message.as_deref() != Some("drop me"));

    notifier.warn(args!["keep me"]);
    notifier.warn(args!["drop me"]);

    assert_eq!(transport.count(), 1);
    assert_eq!(transport.last().custom["method"], "warn");
}

#[test]
fn test_capture_event_defaults() {
    let (notifier, _) = notifier(json!({}));
    let event = notifier.capture_event("meaningless", json!({"foo": "bar"}), 23);
    assert_eq!(event.event_type, EventType::Manual);
    assert_eq!(event.level, Level::Info);
    assert_eq!(event.body["foo"], "bar");
    assert_eq!(notifier.telemetry(), vec![event]);
}

#[test]
fn test_error_items_recorded_as_telemetry() {
    let (notifier, transport) = notifier(json!({}));
    notifier.capture_event("navigation", json!({"to": "/checkout"}), Value::Null);
    let result = notifier.error(args!["payment failed"]);
    notifier.info(args!["after"]);

    let telemetry = notifier.telemetry();
    assert_eq!(telemetry.len(), 2);
    assert_eq!(telemetry[1].event_type, EventType::Error);
    assert_eq!(telemetry[1].body["uuid"], result.uuid.to_string());

    // Each item carries the trail recorded before it.
    let sent = transport.sent();
    assert_eq!(sent[0].1.telemetry.len(), 1);
    assert_eq!(sent[1].1.telemetry.len(), 2);
}

#[test]
fn test_default_notifier_routing() {
    tattle::reset();
    assert!(tattle::log(args!["before init"]).is_none());
    assert!(tattle::capture_event("log", json!({"m": 1}), "info").is_none());
    assert!(!tattle::add_transform(|_: &mut Item, _: &Context<'_>| {}));

    let transport = Arc::new(RecordingTransport::default());
    let as_dyn: Arc<dyn Transport> = transport.clone();
    let instance = tattle::init(json!({}), Some(as_dyn));

    instance.error(args!["from instance"]);
    let result = tattle::error(args!["from facade"]);
    assert!(result.is_some());
    assert_eq!(transport.count(), 2);

    assert!(tattle::add_transform(|item: &mut Item, _cx: &Context<'_>| {
        item.custom.insert("via".to_owned(), json!("facade"));
    }));
    assert!(tattle::add_predicate(|item: &Item, _cx: &Context<'_>| {
        item.message.as_deref() != Some("drop me")
    }));
    instance.info(args!["drop me"]);
    assert_eq!(transport.count(), 2);

    let again = tattle::init(json!({"payload": {"environment": "test"}}), None);
    assert!(again.ptr_eq(&instance));
    assert!(tattle::current().is_some_and(|current| current.ptr_eq(&instance)));
    tattle::warning(args!["after reinit"]);
    assert_eq!(transport.count(), 3);
    assert_eq!(transport.last().environment.as_deref(), Some("test"));
    assert_eq!(transport.last().custom["via"], "facade");

    tattle::configure(json!({"enabled": false}), None);
    tattle::critical(args!["disabled"]);
    assert_eq!(transport.count(), 3);

    let removed = tattle::reset().unwrap();
    assert!(removed.ptr_eq(&instance));
    assert!(tattle::info(args!["after reset"]).is_none());
}
