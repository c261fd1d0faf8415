//! Reconcile outcome primitives.
//!
//! A lifecycle operation ends in one of three ways:
//!
//! - **Completed**: the operation did what was asked.
//! - **Requeue after**: a precondition is not met yet; call again later.
//! - **Error**: something is broken; carried on the `Err` side of a `Result`.
//!
//! The first two are [`Outcome`] values. Keeping "try again later" out of
//! the error channel lets callers schedule the retry without inspecting
//! error text.
//!
//! # Invariants
//!
//! - A requeue is never reported as a failure
//! - Retry bookkeeping for hard failures is the caller's, see [`RetryBudget`]

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Non-error result of a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation finished.
    Completed,

    /// A precondition is not satisfied yet; invoke again after the interval.
    RequeueAfter(Duration),
}

impl Outcome {
    /// Returns true if the operation finished.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// The suggested backoff, if this outcome asks for a requeue.
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::Completed => None,
            Self::RequeueAfter(after) => Some(*after),
        }
    }

    /// Merge two outcomes into the one a scheduler should act on.
    ///
    /// Any requeue wins over completion; between two requeues the shorter
    /// interval wins.
    pub fn merge(self, other: Outcome) -> Outcome {
        match (self, other) {
            (Self::Completed, Self::Completed) => Self::Completed,
            (Self::RequeueAfter(a), Self::Completed) | (Self::Completed, Self::RequeueAfter(a)) => {
                Self::RequeueAfter(a)
            }
            (Self::RequeueAfter(a), Self::RequeueAfter(b)) => Self::RequeueAfter(a.min(b)),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::RequeueAfter(after) => write!(f, "requeue after {}s", after.as_secs()),
        }
    }
}

/// What a recorded failure leaves of a key's retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Still within budget; `attempt` failures seen in the current window.
    Retry { attempt: u32 },
    /// Budget spent; stop scheduling the key until the window lapses.
    Exhausted,
}

/// Per-key budget of hard failures within a sliding window.
///
/// Requeues never touch the budget; only `Err` outcomes are recorded.
/// Callers pass `now` so window expiry is deterministic under test.
#[derive(Debug, Clone)]
pub struct RetryBudget<K> {
    max_failures: u32,
    window: Duration,
    failures: BTreeMap<K, Window>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    count: u32,
}

impl Window {
    fn lapsed(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.opened) > window
    }
}

impl<K: Ord> RetryBudget<K> {
    /// Allow `max_failures` failures per key within `window`.
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            max_failures,
            window,
            failures: BTreeMap::new(),
        }
    }

    /// Record a hard failure of `key` at `now`.
    pub fn record_failure(&mut self, key: K, now: Instant) -> RetryVerdict {
        let entry = self.failures.entry(key).or_insert(Window { opened: now, count: 0 });
        if entry.lapsed(now, self.window) {
            *entry = Window { opened: now, count: 0 };
        }
        entry.count += 1;

        if entry.count > self.max_failures {
            RetryVerdict::Exhausted
        } else {
            RetryVerdict::Retry { attempt: entry.count }
        }
    }

    /// Whether `key` has spent its budget in the window open at `now`.
    pub fn is_exhausted(&self, key: &K, now: Instant) -> bool {
        self.failures
            .get(key)
            .is_some_and(|w| !w.lapsed(now, self.window) && w.count > self.max_failures)
    }

    /// Forget `key` after it completed or requeued.
    pub fn clear(&mut self, key: &K) {
        self.failures.remove(key);
    }

    /// Drop windows that lapsed before `now`.
    pub fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.failures.retain(|_, w| !w.lapsed(now, window));
    }

    /// Keys with a failure window still open.
    pub fn tracked(&self) -> usize {
        self.failures.len()
    }
}

/// Backoff when the cluster's CA material is not populated yet.
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(20);

/// Backoff when a joining machine waits for the control plane to come online.
pub const DEFAULT_JOIN_REQUEUE_AFTER: Duration = Duration::from_secs(60);

/// Default hard-failure budget per machine.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default retry window.
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(10 * 60); // 10 minutes
