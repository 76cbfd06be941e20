//! The canonical unit of telemetry and the values it carries.

use core::{any::type_name, fmt};
use std::{borrow::Cow, error::Error, sync::Arc};

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{error::DeliveryError, level::Level, telemetry::TelemetryEvent};

/// Key under which leftover call-site arguments are collected in
/// [`Item::custom`].
pub const EXTRA_ARGS_KEY: &str = "extraArgs";

/// Source location of a captured exception.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    /// File the exception was raised in.
    pub file: Cow<'static, str>,
    /// Line number, 1-based.
    pub line: u32,
    /// Column number, 1-based.
    pub column: u32,
}

impl Location {
    /// Creates a location from its parts.
    pub fn new(file: impl Into<Cow<'static, str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// The location of the caller.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(core::panic::Location::caller())
    }
}

impl From<&core::panic::Location<'static>> for Location {
    fn from(location: &core::panic::Location<'static>) -> Self {
        Self {
            file: Cow::Borrowed(location.file()),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A captured exception.
///
/// `ErrorValue` is a cheap, clonable handle to an error owned by the caller.
/// The pipeline only reads it. Two handles compare equal when they point at
/// the same underlying error.
///
/// # Examples
///
/// ```
/// use tattle::ErrorValue;
///
/// let err = ErrorValue::new(std::io::Error::other("disk on fire"));
/// assert_eq!(err.message(), "disk on fire");
/// assert!(err.downcast_ref::<std::io::Error>().is_some());
/// assert_eq!(err.clone(), err);
/// ```
#[derive(Clone)]
pub struct ErrorValue {
    error: Arc<dyn Error + Send + Sync + 'static>,
    name: Cow<'static, str>,
    stack: Option<String>,
    location: Option<Location>,
}

/// Error reconstructed from a name and message only.
#[derive(Debug)]
struct MessageError {
    message: String,
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for MessageError {}

impl ErrorValue {
    /// Wraps `error`, recording the caller as the error's location.
    #[track_caller]
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            error: Arc::new(error),
            name: Cow::Borrowed(short_type_name(type_name::<E>())),
            stack: None,
            location: Some(Location::caller()),
        }
    }

    /// Wraps an already shared error.
    pub fn from_arc(
        error: Arc<dyn Error + Send + Sync + 'static>,
        name: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            error,
            name: name.into(),
            stack: None,
            location: None,
        }
    }

    /// Builds an error from a class name and message, for hosts that only
    /// hand over strings.
    pub fn from_message(name: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            error: Arc::new(MessageError {
                message: message.into(),
            }),
            name: name.into(),
            stack: None,
            location: None,
        }
    }

    /// Replaces the recorded location.
    #[must_use]
    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    /// Attaches a rendered stack.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// The error's display message.
    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// The error's class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rendered stack, if the host provided one.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// Where the error was raised, if known.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// The underlying error.
    pub fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.error
    }

    /// Attempts to downcast the underlying error.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.error.downcast_ref::<E>()
    }

    /// Whether both handles refer to the same error.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.error, &other.error)
    }
}

impl PartialEq for ErrorValue {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorValue")
            .field("name", &self.name)
            .field("message", &self.message())
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    match base.rsplit_once("::") {
        Some((_, short)) => short,
        None => base,
    }
}

/// What a transport reports back once delivery of an item resolves.
pub type Delivery = Result<Uuid, DeliveryError>;

/// Function invoked by the transport once delivery of an item resolves.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(&Delivery) + Send + Sync + 'static>);

impl Callback {
    /// Wraps `f`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Delivery) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invokes the callback with the delivery outcome.
    pub fn call(&self, outcome: &Delivery) {
        (self.0)(outcome)
    }

    /// Whether both callbacks are the same function object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

/// Error name and message as first observed, before any payload shaping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawError {
    /// Exception class, guessed from the message when no error object exists.
    pub name: String,
    /// Message with any class prefix stripped.
    pub message: String,
}

/// Metadata describing how an item came to be.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostic {
    /// The error object was reconstructed from a stack-trace candidate.
    pub is_anonymous: bool,
    /// The item came from the uncaught-exception or rejection path.
    pub is_uncaught: bool,
    /// Raw error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_error: Option<RawError>,
    /// Kinds of the call-site arguments, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub original_arg_types: Vec<&'static str>,
    /// Snapshot of the options the caller configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configured_options: Option<Map<String, Value>>,
}

/// The canonical normalised report.
#[derive(Debug, Clone)]
pub struct Item {
    /// First plain string argument.
    pub message: Option<String>,
    /// First exception-like argument.
    pub err: Option<ErrorValue>,
    /// Merged structured arguments plus `extraArgs`.
    pub custom: Map<String, Value>,
    /// Last function argument.
    pub callback: Option<Callback>,
    /// Epoch milliseconds at normalisation time.
    pub timestamp: i64,
    /// Random v4 identifier.
    pub uuid: Uuid,
    /// Severity, set by the entry point or the base-info step.
    pub level: Option<Level>,
    /// Source location reported by the host for uncaught exceptions.
    pub location: Option<Location>,
    /// Deployment environment copied from the payload options.
    pub environment: Option<String>,
    /// Telemetry events recorded before this item.
    pub telemetry: Vec<TelemetryEvent>,
    /// How the item came to be.
    pub diagnostic: Diagnostic,
}

impl Item {
    /// Leftover scalar, array and date arguments, in arrival order.
    pub fn extra_args(&self) -> &[Value] {
        match self.custom.get(EXTRA_ARGS_KEY) {
            Some(Value::Array(values)) => values,
            _ => &[],
        }
    }
}
