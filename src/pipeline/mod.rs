//! Enrichment and filtering between capture and transport.
//!
//! A [`Pipeline`] holds two append-only lists of steps:
//!
//! 1. [`Transform`]s run first, in registration order, and may mutate the
//!    item in place.
//! 2. [`Predicate`]s run second, in registration order, and decide whether the
//!    item is forwarded. The first predicate returning `false` suppresses the
//!    item and the remaining predicates are not evaluated.
//!
//! Both traits are implemented for closures of the right shape, so most steps
//! are registered as plain functions:
//!
//! ```
//! use tattle::{
//!     Item, Options, args, create_item,
//!     level::Method,
//!     pipeline::{Context, Pipeline},
//! };
//!
//! let pipeline = Pipeline::new();
//! pipeline
//!     .add_transform(|item: &mut Item, _: &Context<'_>| {
//!         item.custom.insert("release".into(), "1.2.3".into());
//!     })
//!     .add_predicate(|item: &Item, _: &Context<'_>| item.message.as_deref() != Some("noise"));
//!
//! let options = Options::default();
//! let cx = Context::new(Method::Info, &options, &[]);
//!
//! let kept = pipeline.run(create_item(args!["signal"]), &cx).unwrap();
//! assert_eq!(kept.custom["release"], "1.2.3");
//! assert!(pipeline.run(create_item(args!["noise"]), &cx).is_none());
//! ```
//!
//! Steps are never called with a lock held, so a step may register further
//! steps; those take effect from the next run.

pub mod builtins;

use core::{any::type_name, fmt, panic::Location};
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, PoisonError},
};

use crate::{item::Item, level::Method, options::Options, telemetry::TelemetryEvent};

/// What a step gets to see besides the item.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    /// The entry point the item came through.
    pub method: Method,
    /// The options at the time the item was processed.
    pub options: &'a Options,
    /// Telemetry buffered before this item.
    pub telemetry: &'a [TelemetryEvent],
}

impl<'a> Context<'a> {
    /// Creates a context.
    pub fn new(method: Method, options: &'a Options, telemetry: &'a [TelemetryEvent]) -> Self {
        Self {
            method,
            options,
            telemetry,
        }
    }
}

/// An enrichment step.
pub trait Transform: 'static + Send + Sync {
    /// Augments `item` in place.
    fn apply(&self, item: &mut Item, cx: &Context<'_>);
}

impl<F> Transform for F
where
    F: 'static + Send + Sync + Fn(&mut Item, &Context<'_>),
{
    fn apply(&self, item: &mut Item, cx: &Context<'_>) {
        self(item, cx)
    }
}

/// A filtering step.
pub trait Predicate: 'static + Send + Sync {
    /// Returns `false` to suppress `item`.
    fn check(&self, item: &Item, cx: &Context<'_>) -> bool;
}

impl<F> Predicate for F
where
    F: 'static + Send + Sync + Fn(&Item, &Context<'_>) -> bool,
{
    fn check(&self, item: &Item, cx: &Context<'_>) -> bool {
        self(item, cx)
    }
}

struct Registered<S: ?Sized> {
    kind: &'static str,
    name: &'static str,
    added_at: &'static Location<'static>,
    step: Box<S>,
}

impl<S: ?Sized> fmt::Display for Registered<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} registered at {}:{}",
            self.kind,
            self.name,
            self.added_at.file(),
            self.added_at.line()
        )
    }
}

type StepList<S> = Mutex<Vec<Arc<Registered<S>>>>;

/// Ordered enrichment and filtering steps.
#[derive(Default)]
pub struct Pipeline {
    transforms: StepList<dyn Transform>,
    predicates: StepList<dyn Predicate>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("transforms", &self.transform_count())
            .field("predicates", &self.predicate_count())
            .finish()
    }
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pipeline with the [built-in steps](builtins) registered.
    pub fn with_builtins() -> Self {
        let pipeline = Self::new();
        pipeline
            .add_transform(builtins::add_base_info)
            .add_transform(builtins::add_telemetry)
            .add_transform(builtins::add_configured_options)
            .add_transform(builtins::add_diagnostic_keys)
            .add_predicate(builtins::check_enabled)
            .add_predicate(builtins::check_level)
            .add_predicate(builtins::check_ignored_messages);
        pipeline
    }

    /// Appends an enrichment step.
    #[track_caller]
    pub fn add_transform<T: Transform>(&self, transform: T) -> &Self {
        let step = Registered {
            kind: "Transform",
            name: type_name::<T>(),
            added_at: Location::caller(),
            step: Box::new(transform) as Box<dyn Transform>,
        };
        tracing::trace!(target: "tattle::pipeline", "{step}");
        push(&self.transforms, Arc::new(step));
        self
    }

    /// Appends a filtering step.
    #[track_caller]
    pub fn add_predicate<P: Predicate>(&self, predicate: P) -> &Self {
        let step = Registered {
            kind: "Predicate",
            name: type_name::<P>(),
            added_at: Location::caller(),
            step: Box::new(predicate) as Box<dyn Predicate>,
        };
        tracing::trace!(target: "tattle::pipeline", "{step}");
        push(&self.predicates, Arc::new(step));
        self
    }

    /// Number of registered transforms.
    pub fn transform_count(&self) -> usize {
        lock(&self.transforms).len()
    }

    /// Number of registered predicates.
    pub fn predicate_count(&self) -> usize {
        lock(&self.predicates).len()
    }

    /// Runs every transform and then every predicate over `item`.
    ///
    /// Returns `None` if a predicate suppressed the item. A transform that
    /// panics is skipped; a predicate that panics suppresses the item.
    pub fn run(&self, mut item: Item, cx: &Context<'_>) -> Option<Item> {
        let transforms = lock(&self.transforms).clone();
        for transform in &transforms {
            let outcome = catch_unwind(AssertUnwindSafe(|| transform.step.apply(&mut item, cx)));
            if outcome.is_err() {
                tracing::warn!(target: "tattle::pipeline", uuid = %item.uuid, "{transform} panicked");
            }
        }

        let predicates = lock(&self.predicates).clone();
        for predicate in &predicates {
            let keep = catch_unwind(AssertUnwindSafe(|| predicate.step.check(&item, cx)))
                .unwrap_or_else(|_| {
                    tracing::warn!(target: "tattle::pipeline", uuid = %item.uuid, "{predicate} panicked");
                    false
                });
            if !keep {
                tracing::debug!(target: "tattle::pipeline", uuid = %item.uuid, "item suppressed by {predicate}");
                return None;
            }
        }

        Some(item)
    }
}

fn lock<S: ?Sized>(list: &StepList<S>) -> std::sync::MutexGuard<'_, Vec<Arc<Registered<S>>>> {
    list.lock().unwrap_or_else(PoisonError::into_inner)
}

fn push<S: ?Sized>(list: &StepList<S>, step: Arc<Registered<S>>) {
    lock(list).push(step);
}
