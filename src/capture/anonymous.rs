//! Reconciling error-less uncaught reports with thrown values.
//!
//! Some hosts report an uncaught exception with only a message and no error
//! object, for example when the error crossed a trust boundary. If the host
//! can also tell us whenever it prepares a stack trace for a thrown value,
//! those values are candidates for the missing error object.
//!
//! Error-less reports wait in a FIFO queue. Each candidate is matched against
//! the queue:
//!
//! 1. the first pending report with the same message;
//! 2. otherwise the first opaque report (empty message or
//!    [`OPAQUE_MESSAGE`]) raised on the same thread;
//! 3. otherwise, if reports were announced without being queued, any
//!    candidate matches one of them.
//!
//! A candidate that matches nothing still advances the queue: the oldest
//! pending report is released without an error object, so reports are never
//! held back indefinitely.

use std::{
    collections::VecDeque,
    thread::{self, ThreadId},
    time::{Duration, Instant},
};

use crate::item::{ErrorValue, Item};

/// The message hosts use for errors whose details were withheld.
pub const OPAQUE_MESSAGE: &str = "Script error.";

/// An error-less report waiting for its error object.
#[derive(Debug)]
struct PendingReport {
    item: Item,
    thread: ThreadId,
    reported_at: Instant,
}

impl PendingReport {
    fn is_opaque(&self) -> bool {
        self.item
            .message
            .as_deref()
            .is_none_or(|m| m.is_empty() || m == OPAQUE_MESSAGE)
    }
}

/// What became of a candidate.
#[derive(Debug)]
pub enum Resolution {
    /// Nothing was pending; the candidate is ignored.
    Idle,
    /// A queued report was completed with the candidate as its error.
    Correlated(Item),
    /// An announced report matched; the candidate itself is the report.
    Announced(ErrorValue),
    /// Nothing matched; the oldest pending report is released as it is.
    Released(Item),
}

/// Queue of reports awaiting reconciliation.
#[derive(Debug, Default)]
pub struct AnonymousResolver {
    pending: VecDeque<PendingReport>,
    announced: usize,
}

impl AnonymousResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reports awaiting reconciliation, queued or announced.
    pub fn pending(&self) -> usize {
        self.pending.len() + self.announced
    }

    /// Queues an error-less report raised on the current thread.
    pub fn defer(&mut self, item: Item) {
        self.pending.push_back(PendingReport {
            item,
            thread: thread::current().id(),
            reported_at: Instant::now(),
        });
    }

    /// Records that `count` reports are pending without queuing them.
    ///
    /// The matching reports are produced from the candidates alone.
    pub fn announce(&mut self, count: usize) {
        self.announced = self.announced.saturating_add(count);
    }

    /// Matches `candidate` against the pending reports.
    pub fn resolve(&mut self, candidate: &ErrorValue) -> Resolution {
        if self.pending() == 0 {
            return Resolution::Idle;
        }

        let message = candidate.message();
        let current = thread::current().id();
        let matched = self
            .pending
            .iter()
            .position(|p| p.item.message.as_deref() == Some(message.as_str()))
            .or_else(|| {
                self.pending
                    .iter()
                    .position(|p| p.thread == current && p.is_opaque())
            });

        if let Some(mut report) = matched.and_then(|idx| self.pending.remove(idx)) {
            report.item.err = Some(candidate.clone());
            report.item.diagnostic.is_anonymous = true;
            return Resolution::Correlated(report.item);
        }

        if self.announced > 0 {
            self.announced -= 1;
            return Resolution::Announced(candidate.clone());
        }

        match self.pending.pop_front() {
            Some(report) => {
                tracing::debug!(
                    target: "tattle::capture",
                    waited = ?report.reported_at.elapsed(),
                    "no match for anonymous candidate, releasing oldest report"
                );
                Resolution::Released(report.item)
            }
            None => Resolution::Idle,
        }
    }

    /// Empties the queue and clears any announced count, returning the
    /// queued reports oldest first.
    pub fn drain(&mut self) -> Vec<Item> {
        self.announced = 0;
        self.pending.drain(..).map(|p| p.item).collect()
    }

    /// Removes reports queued for longer than `max_age`, oldest first.
    pub fn drain_older_than(&mut self, max_age: Duration) -> Vec<Item> {
        let mut expired = Vec::new();
        while self
            .pending
            .front()
            .is_some_and(|p| p.reported_at.elapsed() >= max_age)
        {
            if let Some(report) = self.pending.pop_front() {
                expired.push(report.item);
            }
        }
        expired
    }
}
