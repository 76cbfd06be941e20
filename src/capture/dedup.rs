//! Suppression of repeated uncaught exceptions.
//!
//! One throw often reaches the uncaught hook more than once (a panic seen by
//! several layers, a browser-style host reporting the same error twice in one
//! frame). The guard only remembers the most recent fingerprint: it stops
//! notification storms from one throw, not repeats spread over time.

use crate::item::{Item, Location};

/// Identity of a captured exception: its message, source location and, when
/// the host provided one, its stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    message: String,
    location: Option<Location>,
    stack: Option<String>,
}

impl Fingerprint {
    /// Creates a fingerprint from a message and location.
    pub fn new(message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            message: message.into(),
            location,
            stack: None,
        }
    }

    /// Adds the rendered stack to the identity.
    #[must_use]
    pub fn with_stack(mut self, stack: Option<String>) -> Self {
        self.stack = stack;
        self
    }

    /// Fingerprint of a normalised item.
    ///
    /// The error object's message, location and stack take precedence over the
    /// item's message and host-reported location.
    pub fn of_item(item: &Item) -> Self {
        let message = match (&item.err, &item.message) {
            (Some(err), _) => err.message(),
            (None, Some(message)) => message.clone(),
            (None, None) => String::new(),
        };
        let location = item
            .err
            .as_ref()
            .and_then(|err| err.location().cloned())
            .or_else(|| item.location.clone());
        let stack = item
            .err
            .as_ref()
            .and_then(|err| err.stack().map(str::to_owned));

        Self::new(message, location).with_stack(stack)
    }
}

/// Remembers the last fingerprint seen.
#[derive(Debug, Default)]
pub struct DedupGuard {
    last: Option<Fingerprint>,
}

impl DedupGuard {
    /// Creates a guard that has seen nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `fingerprint` and reports whether it repeats the previous one.
    ///
    /// The fingerprint is recorded even when `enabled` is false, so turning
    /// suppression on later compares against the real previous exception.
    pub fn should_suppress(&mut self, fingerprint: Fingerprint, enabled: bool) -> bool {
        let repeat = self.last.as_ref() == Some(&fingerprint);
        self.last = Some(fingerprint);
        enabled && repeat
    }

    /// Forgets the last fingerprint.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_item, item::ErrorValue};

    fn fingerprint(message: &str, line: u32) -> Fingerprint {
        Fingerprint::new(message, Some(Location::new("app.rs", line, 1)))
    }

    #[test]
    fn test_only_last_fingerprint_is_compared() {
        let mut guard = DedupGuard::new();
        assert!(!guard.should_suppress(fingerprint("boom", 1), true));
        assert!(guard.should_suppress(fingerprint("boom", 1), true));
        assert!(!guard.should_suppress(fingerprint("boom", 2), true));
        assert!(!guard.should_suppress(fingerprint("boom", 1), true));
    }

    #[test]
    fn test_disabled_never_suppresses() {
        let mut guard = DedupGuard::new();
        assert!(!guard.should_suppress(fingerprint("boom", 1), false));
        assert!(!guard.should_suppress(fingerprint("boom", 1), false));
        assert!(guard.should_suppress(fingerprint("boom", 1), true));
    }

    #[test]
    fn test_item_fingerprint_uses_error() {
        let err = ErrorValue::from_message("Panic", "boom")
            .with_location(Some(Location::new("lib.rs", 3, 9)))
            .with_stack("0x1\n0x2");
        let a = Fingerprint::of_item(&create_item(args![err.clone(), "ignored"]));
        let b = Fingerprint::new("boom", Some(Location::new("lib.rs", 3, 9)))
            .with_stack(Some("0x1\n0x2".to_owned()));
        assert_eq!(a, b);

        let mut reported = create_item(args![err.clone()]);
        reported.location = Some(Location::new("host.rs", 40, 1));
        assert_eq!(Fingerprint::of_item(&reported), a);

        let mut plain = create_item(args!["boom"]);
        plain.location = Some(Location::new("lib.rs", 3, 9));
        assert_ne!(Fingerprint::of_item(&plain), a);
    }
}
