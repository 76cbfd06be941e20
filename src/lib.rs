#![deny(
    missing_docs,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Client-side error and event telemetry.
//!
//! ## Overview
//!
//! tattle runs inside an application, captures uncaught panics and failed
//! tasks, turns loosely typed call-site arguments into a canonical [`Item`],
//! enriches and filters it, and hands it to a [`Transport`] for delivery.
//!
//! ## Quick Example
//!
//! ```
//! use serde_json::json;
//! use tattle::args;
//!
//! tattle::init(json!({"payload": {"environment": "production"}}), None);
//!
//! if let Err(err) = std::fs::read("/nonexistent/config.toml") {
//!     tattle::error(args![err, "failed to load configuration", json!({"attempt": 1})]);
//! }
//! # tattle::reset();
//! ```
//!
//! ## Core Concepts
//!
//! - **Arguments** ([`Arg`], [`args!`]): every logging call takes an ordered
//!   list of errors, strings, structured objects, callbacks and scalars.
//! - **Items** ([`Item`], [`create_item`]): one pass over the arguments picks
//!   the first error, the first string and the last callback, merges objects
//!   into `custom` and keeps everything else in `custom.extraArgs`.
//! - **Options** ([`Options`]): JSON configuration merged call after call
//!   through a table of per-key [merge strategies](options::merge). The
//!   options each caller actually passed are kept apart in
//!   `_configuredOptions`.
//! - **Capture** ([`capture`], [`host`]): hooks installed with the
//!   [`CaptureHost`] feed uncaught exceptions and rejections into the
//!   notifier. Each hook has an on/off switch driven by the options. Repeats
//!   of the same exception are suppressed, and error-less reports can be
//!   matched with the thrown value seen by a stack-trace hook.
//! - **Pipeline** ([`pipeline`]): enrichment steps followed by filtering
//!   steps, both append-only.
//! - **Telemetry** ([`telemetry`]): a bounded trail of recent events attached
//!   to every item.
//!
//! A [`Notifier`] ties these together. The crate-level functions
//! ([`init`], [`log`], [`error()`], [`configure`], ...) route to a process-wide
//! default notifier held in a [`Registry`]; before [`init`] they do nothing.
//!
//! ## Ecosystem
//!
//! - **`tattle-tracing`** - a [`tracing`] layer that records events as
//!   telemetry, and a transform that attaches the active span chain to items.
//!
//! ## Features
//!
//! - `backtrace` - [`PanicHost`] attaches the raw frame addresses of a panic
//!   to its error, so panics with the same message and location but different
//!   call stacks are not treated as duplicates.

#[macro_use]
mod macros;

mod args;
mod error;
mod global;
pub mod item;
pub mod level;
mod normalize;
mod notifier;
mod registry;

pub mod capture;
pub mod host;
pub mod options;
pub mod pipeline;
pub mod telemetry;
pub mod transport;

pub use self::{
    args::{Arg, ArgKind},
    error::{DeliveryError, HostError},
    global::{
        add_predicate, add_transform, capture_event, configure, critical, current, debug, error,
        info, init, log, registry, reset, warn, warning,
    },
    host::{CaptureHost, ManualHost, PANIC_ERROR_NAME, PanicHost, UncaughtEvent},
    item::{Callback, Delivery, Diagnostic, ErrorValue, Item, Location, RawError},
    level::{Level, Method},
    normalize::{MISSING_ARGUMENTS_MESSAGE, create_item},
    notifier::{LogResult, NULL_REJECTION_MESSAGE, Notifier, NotifierBuilder},
    options::Options,
    registry::Registry,
    telemetry::{EventType, TelemetryEvent},
    transport::{TracingTransport, Transport},
};

// Not public API. Referenced by macro-generated code.
#[doc(hidden)]
pub mod __private {
    pub mod kind {
        use crate::{
            args::Arg,
            item::{Callback, Delivery, ErrorValue},
        };

        #[doc(hidden)]
        pub struct Wrap<'a, T>(pub &'a T);

        #[doc(hidden)]
        pub struct CallbackTag;

        impl CallbackTag {
            #[inline(always)]
            pub fn into_arg<F>(self, f: F) -> Arg
            where
                F: 'static + Send + Sync + Fn(&Delivery),
            {
                Arg::Callback(Callback::new(f))
            }
        }

        #[doc(hidden)]
        pub struct ErrorTag;

        impl ErrorTag {
            #[inline(always)]
            #[track_caller]
            pub fn into_arg<E>(self, error: E) -> Arg
            where
                E: 'static + Send + Sync + std::error::Error,
            {
                Arg::Error(ErrorValue::new(error))
            }
        }

        #[doc(hidden)]
        pub struct PlainTag;

        impl PlainTag {
            #[inline(always)]
            pub fn into_arg<T: Into<Arg>>(self, value: T) -> Arg {
                value.into()
            }
        }

        #[doc(hidden)]
        pub trait CallbackKind {
            #[inline(always)]
            fn arg_kind(&self) -> CallbackTag {
                CallbackTag
            }
        }

        impl<T> CallbackKind for &&Wrap<'_, T> where T: 'static + Send + Sync + Fn(&Delivery) {}

        #[doc(hidden)]
        pub trait ErrorKind {
            #[inline(always)]
            fn arg_kind(&self) -> ErrorTag {
                ErrorTag
            }
        }

        impl<T> ErrorKind for &Wrap<'_, T> where T: 'static + Send + Sync + std::error::Error {}

        #[doc(hidden)]
        pub trait PlainKind {
            #[inline(always)]
            fn arg_kind(&self) -> PlainTag {
                PlainTag
            }
        }

        impl<T> PlainKind for Wrap<'_, T> where T: Into<Arg> {}
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Arg: Send, Sync, Clone);
    assert_impl_all!(Options: Send, Sync, Clone);
    assert_impl_all!(Registry: Send, Sync);
    assert_impl_all!(TelemetryEvent: Send, Sync, Clone);
}
