//! Call-site arguments.
//!
//! Every logging entry point accepts an ordered list of [`Arg`]s. An `Arg` is
//! one of a closed set of kinds; the [normaliser](crate::create_item) decides
//! what each kind contributes to the resulting [`Item`](crate::Item).
//!
//! Most callers build argument lists with the [`args!`](crate::args!) macro,
//! which picks the right kind for each expression: closures taking a
//! [`&Delivery`](crate::Delivery) become callbacks, anything implementing
//! [`std::error::Error`] becomes an error, and everything else goes through
//! [`Into<Arg>`].
//!
//! ```
//! use serde_json::json;
//! use tattle::{Arg, ArgKind, args};
//!
//! let args = args![
//!     std::io::Error::other("connection reset"),
//!     "while syncing",
//!     json!({"user": 42}),
//!     7_u32,
//! ];
//! let kinds: Vec<ArgKind> = args.iter().map(Arg::kind).collect();
//! assert_eq!(
//!     kinds,
//!     [ArgKind::Error, ArgKind::String, ArgKind::Object, ArgKind::Scalar]
//! );
//! ```

use core::fmt;
use std::{borrow::Cow, time::SystemTime};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::item::{Callback, Delivery, ErrorValue};

/// A single untyped call-site argument.
#[derive(Debug, Clone)]
pub enum Arg {
    /// An exception-like value.
    Error(ErrorValue),
    /// A plain string.
    String(String),
    /// A function invoked once delivery resolves.
    Callback(Callback),
    /// A point in time.
    Date(DateTime<Utc>),
    /// A sequence of values.
    Array(Vec<Value>),
    /// A structured object whose keys merge into `custom`.
    Object(Map<String, Value>),
    /// Numbers, booleans and other scalars.
    Scalar(Value),
    /// Absent value.
    Null,
}

/// The kind of an [`Arg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// [`Arg::Error`].
    Error,
    /// [`Arg::String`].
    String,
    /// [`Arg::Callback`].
    Callback,
    /// [`Arg::Date`].
    Date,
    /// [`Arg::Array`].
    Array,
    /// [`Arg::Object`].
    Object,
    /// [`Arg::Scalar`].
    Scalar,
    /// [`Arg::Null`].
    Null,
}

impl ArgKind {
    /// Lowercase name recorded in diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            ArgKind::Error => "error",
            ArgKind::String => "string",
            ArgKind::Callback => "function",
            ArgKind::Date => "date",
            ArgKind::Array => "array",
            ArgKind::Object => "object",
            ArgKind::Scalar => "scalar",
            ArgKind::Null => "null",
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Arg {
    /// Wraps an error value.
    #[track_caller]
    pub fn error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Arg::Error(ErrorValue::new(error))
    }

    /// Wraps a delivery callback.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Delivery) + Send + Sync + 'static,
    {
        Arg::Callback(Callback::new(f))
    }

    /// This argument's kind.
    pub const fn kind(&self) -> ArgKind {
        match self {
            Arg::Error(_) => ArgKind::Error,
            Arg::String(_) => ArgKind::String,
            Arg::Callback(_) => ArgKind::Callback,
            Arg::Date(_) => ArgKind::Date,
            Arg::Array(_) => ArgKind::Array,
            Arg::Object(_) => ArgKind::Object,
            Arg::Scalar(_) => ArgKind::Scalar,
            Arg::Null => ArgKind::Null,
        }
    }

    /// Whether this is [`Arg::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Arg::Null)
    }

    /// JSON rendering used where the argument is stored as data.
    ///
    /// Callbacks have no data representation and render as `null`.
    pub fn to_value(&self) -> Value {
        match self {
            Arg::Error(err) => Value::String(err.to_string()),
            Arg::String(s) => Value::String(s.clone()),
            Arg::Callback(_) | Arg::Null => Value::Null,
            Arg::Date(date) => Value::String(date.to_rfc3339()),
            Arg::Array(values) => Value::Array(values.clone()),
            Arg::Object(map) => Value::Object(map.clone()),
            Arg::Scalar(value) => value.clone(),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Arg::Null,
            Value::String(s) => Arg::String(s),
            Value::Array(values) => Arg::Array(values),
            Value::Object(map) => Arg::Object(map),
            scalar @ (Value::Bool(_) | Value::Number(_)) => Arg::Scalar(scalar),
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::String(s.to_owned())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::String(s)
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::String(s.clone())
    }
}

impl From<Cow<'_, str>> for Arg {
    fn from(s: Cow<'_, str>) -> Self {
        Arg::String(s.into_owned())
    }
}

impl From<Map<String, Value>> for Arg {
    fn from(map: Map<String, Value>) -> Self {
        Arg::Object(map)
    }
}

impl From<Vec<Value>> for Arg {
    fn from(values: Vec<Value>) -> Self {
        Arg::Array(values)
    }
}

impl From<DateTime<Utc>> for Arg {
    fn from(date: DateTime<Utc>) -> Self {
        Arg::Date(date)
    }
}

impl From<SystemTime> for Arg {
    fn from(time: SystemTime) -> Self {
        Arg::Date(time.into())
    }
}

impl From<ErrorValue> for Arg {
    fn from(err: ErrorValue) -> Self {
        Arg::Error(err)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync + 'static>> for Arg {
    fn from(error: Box<dyn std::error::Error + Send + Sync + 'static>) -> Self {
        Arg::Error(ErrorValue::from_arc(error.into(), "Error"))
    }
}

impl From<Callback> for Arg {
    fn from(callback: Callback) -> Self {
        Arg::Callback(callback)
    }
}

impl From<()> for Arg {
    fn from((): ()) -> Self {
        Arg::Null
    }
}

impl<T> From<Option<T>> for Arg
where
    T: Into<Arg>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Null, Into::into)
    }
}

macro_rules! scalar_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Scalar(Value::from(value))
                }
            }
        )*
    };
}

scalar_from!(bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_value_classification() {
        assert_eq!(Arg::from(json!(null)).kind(), ArgKind::Null);
        assert_eq!(Arg::from(json!("hi")).kind(), ArgKind::String);
        assert_eq!(Arg::from(json!([1, 2])).kind(), ArgKind::Array);
        assert_eq!(Arg::from(json!({"a": 1})).kind(), ArgKind::Object);
        assert_eq!(Arg::from(json!(1.5)).kind(), ArgKind::Scalar);
        assert_eq!(Arg::from(json!(true)).kind(), ArgKind::Scalar);
    }

    #[test]
    fn test_option_maps_none_to_null() {
        assert!(Arg::from(None::<&str>).is_null());
        assert_eq!(Arg::from(Some("x")).kind(), ArgKind::String);
    }

    #[test]
    fn test_macro_dispatch() {
        let args = crate::args![
            std::io::Error::other("boom"),
            |_: &Delivery| {},
            "msg",
            42_i64,
            Callback::new(|_| {}),
        ];
        let kinds: Vec<_> = args.iter().map(Arg::kind).collect();
        assert_eq!(
            kinds,
            [
                ArgKind::Error,
                ArgKind::Callback,
                ArgKind::String,
                ArgKind::Scalar,
                ArgKind::Callback,
            ]
        );
    }

    #[test]
    fn test_boxed_error_is_an_error() {
        let boxed: Box<dyn std::error::Error + Send + Sync> = "bad input".into();
        let arg = Arg::from(boxed);
        assert_eq!(arg.kind(), ArgKind::Error);
        assert_eq!(arg.to_value(), json!("Error: bad input"));
    }

    #[test]
    fn test_empty_macro() {
        let args = crate::args![];
        assert!(args.is_empty());
    }

    #[test]
    fn test_date_renders_rfc3339() {
        let date = DateTime::<Utc>::from_timestamp(946_684_800, 0).unwrap();
        assert_eq!(
            Arg::from(date).to_value(),
            json!("2000-01-01T00:00:00+00:00")
        );
    }
}
