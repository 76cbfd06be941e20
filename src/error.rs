//! Error types surfaced at the edges of the pipeline.
//!
//! The pipeline itself never fails: malformed input is normalised, vetoed
//! items are dropped silently and faults inside one capture event never
//! prevent the next one. The only errors are the ones collaborators report
//! back, namely transports resolving an item's callback and hosts that cannot
//! install a requested hook.

use thiserror::Error;

/// Outcome handed to an item's callback when delivery fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The collection endpoint refused the item.
    #[error("item rejected by endpoint: {0}")]
    Rejected(String),
    /// Delivery is switched off for this transport.
    #[error("transport is disabled")]
    Disabled,
    /// Any other transport-level failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Failure to install a hook with the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host has no way to offer this hook.
    #[error("the host does not support this hook")]
    Unsupported,
    /// A handler is already installed for this hook.
    #[error("a handler is already installed for this hook")]
    AlreadyInstalled,
}
