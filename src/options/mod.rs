//! Configuration store.
//!
//! [`Options`] holds the merged configuration (defaults, environment and every
//! configure call so far) together with the `_configuredOptions` snapshot of
//! what callers actually passed. Options are plain JSON so keys this crate
//! does not know about pass through untouched to the transport; the typed
//! accessors cover the keys the pipeline reads.
//!
//! ```
//! use serde_json::json;
//! use tattle::Options;
//!
//! let mut options = Options::new(json!({"scrubFields": ["foo"]}));
//! assert!(options.scrub_fields().contains("foo"));
//! assert!(options.scrub_fields().contains("password"));
//!
//! options.configure(&json!({"scrubFields": ["bar"], "overwriteScrubFields": true}), None);
//! assert_eq!(options.scrub_fields().len(), 1);
//! ```

mod env;
pub mod merge;

use indexmap::IndexSet;
use serde_json::{Map, Value, json};

use crate::level::Level;

/// Recognised option names.
pub mod keys {
    /// List of field names the scrubber removes.
    pub const SCRUB_FIELDS: &str = "scrubFields";
    /// Replace `scrubFields` instead of extending it.
    pub const OVERWRITE_SCRUB_FIELDS: &str = "overwriteScrubFields";
    /// Capture uncaught exceptions.
    pub const CAPTURE_UNCAUGHT: &str = "captureUncaught";
    /// Capture unhandled rejections.
    pub const CAPTURE_UNHANDLED_REJECTIONS: &str = "captureUnhandledRejections";
    /// Suppress an uncaught exception identical to the previous one.
    pub const IGNORE_DUPLICATE_ERRORS: &str = "ignoreDuplicateErrors";
    /// Reconcile error-less uncaught reports with stack-trace candidates.
    pub const INSPECT_ANONYMOUS_ERRORS: &str = "inspectAnonymousErrors";
    /// Payload data forwarded with every item.
    pub const PAYLOAD: &str = "payload";
    /// Master switch for delivery.
    pub const ENABLED: &str = "enabled";
    /// Project access token.
    pub const ACCESS_TOKEN: &str = "accessToken";
    /// Alternative spelling of [`ACCESS_TOKEN`].
    pub const ACCESS_TOKEN_ALIAS: &str = "access_token";
    /// Level of items captured from uncaught exceptions and rejections.
    pub const UNCAUGHT_ERROR_LEVEL: &str = "uncaughtErrorLevel";
    /// Level of items sent through plain `log`.
    pub const LOG_LEVEL: &str = "logLevel";
    /// Minimum level that gets delivered.
    pub const REPORT_LEVEL: &str = "reportLevel";
    /// Regex patterns for messages that are never delivered.
    pub const IGNORED_MESSAGES: &str = "ignoredMessages";
    /// Capacity of the telemetry buffer.
    pub const MAX_TELEMETRY_EVENTS: &str = "maxTelemetryEvents";
    /// The snapshot of caller-supplied options.
    pub const CONFIGURED_OPTIONS: &str = "_configuredOptions";
}

/// Field names scrubbed by default.
pub const DEFAULT_SCRUB_FIELDS: &[&str] = &[
    "pw",
    "pass",
    "passwd",
    "password",
    "secret",
    "confirm_password",
    "confirmPassword",
    "password_confirmation",
    "passwordConfirmation",
    "access_token",
    "accessToken",
    "secret_key",
    "secretKey",
    "secretToken",
    "cc-number",
    "card number",
    "cardnumber",
    "cardnum",
    "ccnum",
    "ccnumber",
    "cc num",
    "creditcardnumber",
    "credit card number",
    "cvc",
    "cvv2",
    "security code",
    "card verification",
    "expiration date",
    "expdate",
];

/// Default capacity of the telemetry buffer.
pub const DEFAULT_MAX_TELEMETRY_EVENTS: usize = 100;

/// Merged configuration plus the snapshot of caller-supplied options.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    values: Map<String, Value>,
    configured: Map<String, Value>,
}

impl Default for Options {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl Options {
    /// Builds options from defaults, the environment and `user`.
    ///
    /// `user` should be a JSON object; anything else is treated as empty.
    pub fn new(user: Value) -> Self {
        let mut values = Self::defaults();
        merge::merge_into(&mut values, &env::env_layer());

        let mut options = Self {
            values,
            configured: Map::new(),
        };
        options.configure(&user, None);
        options
    }

    /// The built-in defaults.
    pub fn defaults() -> Map<String, Value> {
        let defaults = json!({
            keys::SCRUB_FIELDS: DEFAULT_SCRUB_FIELDS,
            keys::CAPTURE_UNCAUGHT: false,
            keys::CAPTURE_UNHANDLED_REJECTIONS: false,
            keys::IGNORE_DUPLICATE_ERRORS: true,
            keys::INSPECT_ANONYMOUS_ERRORS: false,
            keys::ENABLED: true,
            keys::UNCAUGHT_ERROR_LEVEL: Level::Error.as_str(),
            keys::LOG_LEVEL: Level::Debug.as_str(),
            keys::REPORT_LEVEL: Level::Debug.as_str(),
            keys::IGNORED_MESSAGES: [],
            keys::MAX_TELEMETRY_EVENTS: DEFAULT_MAX_TELEMETRY_EVENTS,
            keys::PAYLOAD: {},
        });
        match defaults {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Applies a configure call.
    ///
    /// `user` is merged onto the stored options following the
    /// [merge table](merge). `payload_data`, if given, is merged into
    /// `payload` and wins over same-named keys in `user.payload`. The
    /// `_configuredOptions` snapshot takes every top-level key of this call,
    /// replacing earlier values except for `payload`, which is deep-merged.
    pub fn configure(&mut self, user: &Value, payload_data: Option<&Map<String, Value>>) {
        let mut incoming = match user {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        if let Some(data) = payload_data {
            let payload = incoming
                .entry(keys::PAYLOAD)
                .or_insert_with(|| Value::Object(Map::new()));
            merge::deep_merge(payload, &Value::Object(data.clone()));
        }

        merge::merge_into(&mut self.values, &incoming);

        for (key, value) in incoming {
            if key == keys::CONFIGURED_OPTIONS {
                continue;
            }
            match self.configured.get_mut(&key) {
                Some(existing) if key == keys::PAYLOAD => merge::deep_merge(existing, &value),
                _ => {
                    self.configured.insert(key, value);
                }
            }
        }
    }

    /// Looks up a raw option.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if key == keys::CONFIGURED_OPTIONS {
            return None;
        }
        self.values.get(key)
    }

    /// The merged options, without the snapshot.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Everything the caller passed to construction and configure calls.
    pub fn configured_options(&self) -> &Map<String, Value> {
        &self.configured
    }

    /// The merged options with the snapshot under `_configuredOptions`.
    pub fn to_value(&self) -> Value {
        let mut map = self.values.clone();
        map.insert(
            keys::CONFIGURED_OPTIONS.to_owned(),
            Value::Object(self.configured.clone()),
        );
        Value::Object(map)
    }

    fn flag(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(merge::is_truthy)
    }

    fn level(&self, key: &str, default: Level) -> Level {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }

    /// Scrubbed field names, without duplicates.
    pub fn scrub_fields(&self) -> IndexSet<String> {
        string_list(self.values.get(keys::SCRUB_FIELDS))
    }

    /// Whether uncaught exceptions are captured.
    pub fn capture_uncaught(&self) -> bool {
        self.flag(keys::CAPTURE_UNCAUGHT)
    }

    /// Whether unhandled rejections are captured.
    pub fn capture_unhandled_rejections(&self) -> bool {
        self.flag(keys::CAPTURE_UNHANDLED_REJECTIONS)
    }

    /// Whether repeated uncaught exceptions are suppressed.
    pub fn ignore_duplicate_errors(&self) -> bool {
        self.flag(keys::IGNORE_DUPLICATE_ERRORS)
    }

    /// Whether error-less uncaught reports wait for a stack-trace candidate.
    pub fn inspect_anonymous_errors(&self) -> bool {
        self.flag(keys::INSPECT_ANONYMOUS_ERRORS)
    }

    /// Whether delivery is enabled.
    pub fn enabled(&self) -> bool {
        self.flag(keys::ENABLED)
    }

    /// The access token, if configured.
    pub fn access_token(&self) -> Option<&str> {
        self.values.get(keys::ACCESS_TOKEN).and_then(Value::as_str)
    }

    /// Payload data forwarded with every item.
    pub fn payload(&self) -> Option<&Map<String, Value>> {
        self.values.get(keys::PAYLOAD).and_then(Value::as_object)
    }

    /// `payload.environment`, if set.
    pub fn environment(&self) -> Option<&str> {
        self.payload()?.get("environment")?.as_str()
    }

    /// Level of captured uncaught exceptions and rejections.
    pub fn uncaught_error_level(&self) -> Level {
        self.level(keys::UNCAUGHT_ERROR_LEVEL, Level::Error)
    }

    /// Level of items sent through plain `log`.
    pub fn log_level(&self) -> Level {
        self.level(keys::LOG_LEVEL, Level::Debug)
    }

    /// Minimum delivered level.
    pub fn report_level(&self) -> Level {
        self.level(keys::REPORT_LEVEL, Level::Debug)
    }

    /// Patterns of messages that are never delivered.
    pub fn ignored_messages(&self) -> IndexSet<String> {
        string_list(self.values.get(keys::IGNORED_MESSAGES))
    }

    /// Telemetry buffer capacity.
    pub fn max_telemetry_events(&self) -> usize {
        self.values
            .get(keys::MAX_TELEMETRY_EVENTS)
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_MAX_TELEMETRY_EVENTS)
    }
}

fn string_list(value: Option<&Value>) -> IndexSet<String> {
    value
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
