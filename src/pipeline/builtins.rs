//! Steps every notifier registers before any caller-supplied step.

use std::sync::{Mutex, OnceLock, PoisonError};

use hashbrown::HashMap;
use regex::Regex;

use super::Context;
use crate::{
    item::{Item, RawError},
    level::Level,
};

/// Class name recorded when none can be determined.
pub const UNKNOWN_ERROR_CLASS: &str = "(unknown)";

/// Defaults the item's level from the entry point and copies
/// `payload.environment` onto it.
pub fn add_base_info(item: &mut Item, cx: &Context<'_>) {
    if item.level.is_none() {
        item.level = Some(cx.method.level(cx.options.log_level()));
    }
    if item.environment.is_none() {
        item.environment = cx.options.environment().map(str::to_owned);
    }
}

/// Attaches the telemetry recorded so far.
pub fn add_telemetry(item: &mut Item, cx: &Context<'_>) {
    if item.telemetry.is_empty() {
        item.telemetry = cx.telemetry.to_vec();
    }
}

/// Records the caller-supplied options in the item's diagnostics.
pub fn add_configured_options(item: &mut Item, cx: &Context<'_>) {
    item.diagnostic.configured_options = Some(cx.options.configured_options().clone());
}

/// Fills in [`Diagnostic::raw_error`](crate::item::Diagnostic::raw_error).
///
/// With an error object its class and message are used as they are.
/// Otherwise the class is guessed from a `ClassName: message` prefix on the
/// item's message.
pub fn add_diagnostic_keys(item: &mut Item, _cx: &Context<'_>) {
    if item.diagnostic.raw_error.is_some() {
        return;
    }
    item.diagnostic.raw_error = match (&item.err, &item.message) {
        (Some(err), _) => Some(RawError {
            name: err.name().to_owned(),
            message: err.message(),
        }),
        (None, Some(message)) if item.diagnostic.is_uncaught => Some(guess_error_class(message)),
        (None, _) => None,
    };
}

/// Splits `"TypeError: x is undefined"` into class and message.
///
/// A leading `Uncaught ` is ignored. Messages without a class prefix get
/// [`UNKNOWN_ERROR_CLASS`].
pub fn guess_error_class(message: &str) -> RawError {
    static CLASS_PREFIX: OnceLock<Option<Regex>> = OnceLock::new();

    let pattern = CLASS_PREFIX.get_or_init(|| {
        Regex::new(r"(?s)^\s*(?:Uncaught\s+)?([A-Za-z_$][A-Za-z0-9_$.]*)\s*:\s*(.*)$").ok()
    });

    if let Some(captures) = pattern.as_ref().and_then(|re| re.captures(message)) {
        let name = captures.get(1).map_or("", |m| m.as_str());
        let rest = captures.get(2).map_or("", |m| m.as_str());
        return RawError {
            name: name.to_owned(),
            message: rest.to_owned(),
        };
    }

    RawError {
        name: UNKNOWN_ERROR_CLASS.to_owned(),
        message: message.to_owned(),
    }
}

/// Vetoes everything while `enabled` is false.
pub fn check_enabled(_item: &Item, cx: &Context<'_>) -> bool {
    cx.options.enabled()
}

/// Vetoes items below `reportLevel`.
pub fn check_level(item: &Item, cx: &Context<'_>) -> bool {
    item.level.unwrap_or(Level::Debug) >= cx.options.report_level()
}

/// Vetoes items whose message or error message matches one of
/// `ignoredMessages`. Invalid patterns are skipped.
pub fn check_ignored_messages(item: &Item, cx: &Context<'_>) -> bool {
    let patterns = cx.options.ignored_messages();
    if patterns.is_empty() {
        return true;
    }

    let err_message = item.err.as_ref().map(|err| err.message());
    let candidates: Vec<&str> = item
        .message
        .as_deref()
        .into_iter()
        .chain(err_message.as_deref())
        .collect();

    !patterns.iter().any(|pattern| {
        with_pattern(pattern, |re| candidates.iter().any(|c| re.is_match(c)))
    })
}

type PatternCache = HashMap<String, Option<Regex>, rustc_hash::FxBuildHasher>;

fn with_pattern(pattern: &str, f: impl FnOnce(&Regex) -> bool) -> bool {
    static CACHE: OnceLock<Mutex<PatternCache>> = OnceLock::new();

    let mut cache = CACHE
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    let compiled = cache.entry(pattern.to_owned()).or_insert_with(|| {
        Regex::new(pattern)
            .inspect_err(|error| {
                tracing::warn!(target: "tattle::pipeline", pattern, %error, "skipping invalid ignoredMessages pattern");
            })
            .ok()
    });

    compiled.as_ref().is_some_and(f)
}
