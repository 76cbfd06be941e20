//! Turning call-site arguments into an [`Item`].

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    args::Arg,
    item::{Diagnostic, EXTRA_ARGS_KEY, Item},
};

/// Message given to items built from no arguments, or only null ones.
pub const MISSING_ARGUMENTS_MESSAGE: &str = "Item sent with null or missing arguments.";

/// Normalises an ordered list of call-site arguments into an [`Item`].
///
/// A single left-to-right pass classifies each argument by kind:
///
/// - the first error becomes [`Item::err`], later ones are kept as extra
///   arguments;
/// - the first string becomes [`Item::message`], later ones are kept as extra
///   arguments;
/// - the last callback becomes [`Item::callback`], and callbacks are never kept
///   as extra arguments;
/// - objects are merged into [`Item::custom`], later keys overwriting earlier
///   ones;
/// - arrays, dates and scalars are appended to `custom.extraArgs` in arrival
///   order;
/// - nulls are skipped.
///
/// If nothing but nulls was passed, the message is
/// [`MISSING_ARGUMENTS_MESSAGE`].
///
/// Apart from the timestamp and uuid the result depends on `args` alone.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tattle::{args, create_item};
///
/// let item = create_item(args![
///     std::io::Error::other("Whoa"),
///     "first",
///     json!({"a": 1, "b": 2}),
///     "second",
/// ]);
/// assert_eq!(item.message.as_deref(), Some("first"));
/// assert_eq!(item.custom["a"], 1);
/// assert_eq!(item.extra_args(), [json!("second")]);
/// assert_eq!(item.uuid.get_version_num(), 4);
/// ```
pub fn create_item<I>(args: I) -> Item
where
    I: IntoIterator<Item = Arg>,
{
    let mut item = Item {
        message: None,
        err: None,
        custom: Map::new(),
        callback: None,
        timestamp: Utc::now().timestamp_millis(),
        uuid: Uuid::new_v4(),
        level: None,
        location: None,
        environment: None,
        telemetry: Vec::new(),
        diagnostic: Diagnostic::default(),
    };
    let mut extra_args = Vec::new();
    let mut saw_value = false;

    for arg in args {
        item.diagnostic.original_arg_types.push(arg.kind().as_str());
        saw_value |= !arg.is_null();

        match arg {
            Arg::Error(err) => {
                if item.err.is_none() {
                    item.err = Some(err);
                } else {
                    extra_args.push(Value::String(err.to_string()));
                }
            }
            Arg::String(s) => {
                if item.message.is_none() {
                    item.message = Some(s);
                } else {
                    extra_args.push(Value::String(s));
                }
            }
            Arg::Callback(callback) => item.callback = Some(callback),
            Arg::Object(map) => item.custom.extend(map),
            Arg::Null => {}
            other @ (Arg::Date(_) | Arg::Array(_) | Arg::Scalar(_)) => {
                extra_args.push(other.to_value());
            }
        }
    }

    if !saw_value {
        item.message = Some(MISSING_ARGUMENTS_MESSAGE.to_owned());
    }
    if !extra_args.is_empty() {
        item.custom
            .insert(EXTRA_ARGS_KEY.to_owned(), Value::Array(extra_args));
    }

    item
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use chrono::{DateTime, Utc};
    use serde_json::json;

    use super::*;
    use crate::item::{Delivery, ErrorValue};

    #[test]
    fn test_missing_arguments() {
        let empty = create_item(Vec::new());
        assert_eq!(empty.message.as_deref(), Some(MISSING_ARGUMENTS_MESSAGE));

        let nulls = create_item([Arg::Null, Arg::Null]);
        assert_eq!(nulls.message.as_deref(), Some(MISSING_ARGUMENTS_MESSAGE));
        assert!(nulls.custom.is_empty());
    }

    #[test]
    fn test_multiple_strings() {
        let item = create_item(args!["first", "second"]);
        assert_eq!(item.message.as_deref(), Some("first"));
        assert_eq!(item.extra_args(), [json!("second")]);
    }

    #[test]
    fn test_error_and_strings() {
        let err = ErrorValue::new(std::io::Error::other("Whoa"));
        let item = create_item(args![err.clone(), "first", "second"]);
        assert_eq!(item.err.as_ref(), Some(&err));
        assert_eq!(item.message.as_deref(), Some("first"));
        assert_eq!(item.extra_args(), [json!("second")]);
    }

    #[test]
    fn test_callback_is_not_an_extra_arg() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let item = create_item(args![
            std::io::Error::other("Whoa"),
            "first",
            move |_: &Delivery| flag.store(true, Ordering::SeqCst),
            "second",
        ]);
        assert_eq!(item.extra_args(), [json!("second")]);

        let callback = item.callback.expect("callback should be set");
        callback.call(&Ok(item.uuid));
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_last_callback_wins() {
        let first = crate::item::Callback::new(|_| {});
        let last = crate::item::Callback::new(|_| {});
        let item = create_item([Arg::Callback(first), Arg::Callback(last.clone())]);
        assert!(item.callback.is_some_and(|cb| cb.ptr_eq(&last)));
    }

    #[test]
    fn test_objects_merge_into_custom() {
        let item = create_item(args![
            "first",
            json!({"a": 1, "b": 2}),
            json!({"b": 3}),
            "second",
        ]);
        assert_eq!(item.custom["a"], 1);
        assert_eq!(item.custom["b"], 3);
        assert_eq!(item.extra_args(), [json!("second")]);
    }

    #[test]
    fn test_arrays_dates_and_numbers_are_extra_args() {
        let y2k = DateTime::<Utc>::from_timestamp(946_684_800, 0).unwrap();
        let item = create_item(args![
            "first",
            y2k,
            json!([1, 2, 3]),
            42_i64,
            json!({"a": 1}),
            "second",
        ]);
        assert_eq!(
            item.extra_args(),
            [
                json!(y2k.to_rfc3339()),
                json!([1, 2, 3]),
                json!(42),
                json!("second"),
            ]
        );
    }

    #[test]
    fn test_second_error_is_kept() {
        let item = create_item(args![
            std::io::Error::other("one"),
            std::io::Error::other("two"),
        ]);
        assert_eq!(item.err.as_ref().map(|e| e.message()).as_deref(), Some("one"));
        assert_eq!(item.extra_args(), [json!("Error: two")]);
    }

    #[test]
    fn test_timestamp_uuid_and_arg_types() {
        let before = Utc::now().timestamp_millis();
        let item = create_item(args!["msg", Arg::Null, 1.5_f64]);
        let after = Utc::now().timestamp_millis();

        assert!((before..=after).contains(&item.timestamp));
        let rendered = item.uuid.to_string();
        let groups: Vec<&str> = rendered.split('-').collect();
        assert_eq!(groups.len(), 5);
        assert!(groups[2].starts_with('4'));
        assert_eq!(
            item.diagnostic.original_arg_types,
            ["string", "null", "scalar"]
        );
    }
}
