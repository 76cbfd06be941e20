//! The process-wide default notifier.
//!
//! A [`Registry`] holds at most one [`Notifier`]. The crate-level functions
//! ([`tattle::init`](crate::init), [`tattle::error`](crate::error()), ...)
//! operate on a static registry; tests and embedders can create their own
//! registries to keep instances isolated.
//!
//! ```
//! use serde_json::json;
//! use tattle::Registry;
//!
//! static REGISTRY: Registry = Registry::new();
//!
//! assert!(REGISTRY.current().is_none());
//! let notifier = REGISTRY.init(json!({"payload": {"environment": "test"}}), None);
//! assert!(REGISTRY.current().is_some_and(|current| current.ptr_eq(&notifier)));
//!
//! let again = REGISTRY.init(json!({"payload": {"environment": "prod"}}), None);
//! assert!(again.ptr_eq(&notifier));
//! assert_eq!(notifier.options().environment(), Some("prod"));
//!
//! assert!(REGISTRY.reset().is_some());
//! assert!(REGISTRY.current().is_none());
//! ```

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use crate::{notifier::Notifier, transport::Transport};

/// Holder for a default [`Notifier`].
#[derive(Debug)]
pub struct Registry {
    current: RwLock<Option<Notifier>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Notifier>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Notifier>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the default notifier, creating it on first use.
    ///
    /// If a notifier is already installed, `options` are applied to it with
    /// [`Notifier::configure`] and `transport` is ignored.
    pub fn init(&self, options: Value, transport: Option<Arc<dyn Transport>>) -> Notifier {
        let existing = self.read().clone();
        if let Some(notifier) = existing {
            notifier.configure(options, None);
            return notifier;
        }

        let mut slot = self.write();
        if let Some(notifier) = slot.clone() {
            drop(slot);
            notifier.configure(options, None);
            return notifier;
        }

        let mut builder = Notifier::builder().options(options);
        if let Some(transport) = transport {
            builder = builder.transport(transport);
        }
        let notifier = builder.build();
        *slot = Some(notifier.clone());
        tracing::debug!(target: "tattle::registry", "default notifier installed");
        notifier
    }

    /// Installs `notifier` as the default, returning the one it replaces.
    pub fn replace(&self, notifier: Notifier) -> Option<Notifier> {
        self.write().replace(notifier)
    }

    /// The default notifier, if one is installed.
    pub fn current(&self) -> Option<Notifier> {
        self.read().clone()
    }

    /// Removes and returns the default notifier.
    pub fn reset(&self) -> Option<Notifier> {
        let previous = self.write().take();
        if previous.is_some() {
            tracing::debug!(target: "tattle::registry", "default notifier removed");
        }
        previous
    }

    /// Runs `f` on the default notifier, if any.
    ///
    /// The registry lock is not held while `f` runs.
    pub fn with_current<R>(&self, f: impl FnOnce(&Notifier) -> R) -> Option<R> {
        self.current().map(|notifier| f(&notifier))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_calls_before_init_do_nothing() {
        let registry = Registry::new();
        assert!(registry.with_current(|n| n.log(args!["hi"])).is_none());
    }

    #[test]
    fn test_replace() {
        let registry = Registry::new();
        let first = registry.init(json!({}), None);
        let second = Notifier::new(json!({}));
        let replaced = registry.replace(second.clone()).unwrap();
        assert!(replaced.ptr_eq(&first));
        assert!(registry.current().unwrap().ptr_eq(&second));
    }
}
