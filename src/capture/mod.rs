//! Capture state: which host hooks are active, duplicate suppression and
//! anonymous-error reconciliation.
//!
//! Each hook (uncaught exceptions, rejections and the stack-trace side
//! channel) has a [`CaptureSwitch`]. A switch is either
//! [`Inactive`](CaptureState::Inactive) or [`Active`](CaptureState::Active)
//! and is re-evaluated on every configure call. The host hook is installed the
//! first time a switch turns on and stays installed afterwards; an inactive
//! switch makes the handler return without doing anything.

pub mod anonymous;
pub mod dedup;

use core::cell::Cell;

use crate::error::HostError;

/// State of one capture switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// Events are ignored.
    #[default]
    Inactive,
    /// Events are processed.
    Active,
}

/// One hook's activation state.
#[derive(Debug, Default)]
pub struct CaptureSwitch {
    name: &'static str,
    state: CaptureState,
    installed: bool,
}

impl CaptureSwitch {
    /// Creates an inactive switch with no hook installed.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            state: CaptureState::Inactive,
            installed: false,
        }
    }

    /// The current state.
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// Whether events are currently processed.
    pub const fn is_active(&self) -> bool {
        matches!(self.state, CaptureState::Active)
    }

    /// Whether the host hook has been installed.
    pub const fn is_installed(&self) -> bool {
        self.installed
    }

    /// Moves the switch to match `wanted`, calling `install` the first time
    /// it turns on.
    ///
    /// If the host cannot install the hook the switch stays inactive and
    /// installation is attempted again on the next update.
    pub fn update<F>(&mut self, wanted: bool, install: F) -> CaptureState
    where
        F: FnOnce() -> Result<(), HostError>,
    {
        let next = match (wanted, self.installed) {
            (false, _) => CaptureState::Inactive,
            (true, true) => CaptureState::Active,
            (true, false) => match install() {
                Ok(()) | Err(HostError::AlreadyInstalled) => {
                    self.installed = true;
                    CaptureState::Active
                }
                Err(error) => {
                    tracing::warn!(target: "tattle::capture", hook = self.name, %error, "could not install hook");
                    CaptureState::Inactive
                }
            },
        };

        if next != self.state {
            tracing::debug!(target: "tattle::capture", hook = self.name, from = ?self.state, to = ?next, "capture state changed");
            self.state = next;
        }
        next
    }
}

/// The three switches a notifier keeps.
#[derive(Debug)]
pub struct CaptureController {
    /// Uncaught exceptions.
    pub uncaught: CaptureSwitch,
    /// Unhandled rejections.
    pub rejections: CaptureSwitch,
    /// The stack-trace side channel feeding the anonymous resolver.
    pub stack_traces: CaptureSwitch,
}

impl Default for CaptureController {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureController {
    /// Creates a controller with every switch inactive.
    pub const fn new() -> Self {
        Self {
            uncaught: CaptureSwitch::new("uncaught"),
            rejections: CaptureSwitch::new("rejections"),
            stack_traces: CaptureSwitch::new("stack_traces"),
        }
    }
}

thread_local! {
    static HANDLING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as busy handling a captured event.
///
/// Only the capture paths enter it. An uncaught exception, rejection or
/// stack-trace candidate raised on a thread that is already handling one,
/// for example a panic inside a transport, is dropped instead of recursing.
/// Explicit logging calls never consult it.
#[derive(Debug)]
pub struct ReentrancyGuard {
    _private: (),
}

impl ReentrancyGuard {
    /// Enters the guard, or returns `None` if this thread is already inside.
    pub fn enter() -> Option<Self> {
        HANDLING.with(|handling| {
            if handling.replace(true) {
                None
            } else {
                Some(Self { _private: () })
            }
        })
    }

    /// Whether the current thread is handling an item.
    pub fn is_active() -> bool {
        HANDLING.with(Cell::get)
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        HANDLING.with(|handling| handling.set(false));
    }
}
