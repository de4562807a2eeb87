//! # Call Context & Logical Clock
//!
//! The registry has no ambient state: who is calling and what time it is
//! arrive with every operation as a [`CallContext`]. The transport layer
//! authenticates the caller; the host supplies the clock reading.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{Principal, Timestamp};

/// The caller's identity and the clock reading for one operation.
///
/// The clock is read once, when the context is built, so every record an
/// operation writes carries the same timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// The authenticated caller.
    pub caller: Principal,
    /// The logical clock value for this operation.
    pub now: Timestamp,
}

impl CallContext {
    pub fn new(caller: impl Into<Principal>, now: Timestamp) -> Self {
        Self {
            caller: caller.into(),
            now,
        }
    }

    /// Builds a context from a clock, reading it exactly once.
    pub fn at(caller: impl Into<Principal>, clock: &dyn Clock) -> Self {
        Self::new(caller, clock.now())
    }
}

/// A source of logical time.
pub trait Clock: Send + Sync {
    /// Returns the current clock value.
    fn now(&self) -> Timestamp;
}

/// A monotonically non-decreasing counter, advanced by the host.
#[derive(Debug, Default)]
pub struct LogicalClock {
    height: AtomicU64,
}

impl LogicalClock {
    /// Creates a clock starting at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            height: AtomicU64::new(start),
        }
    }

    /// Advances the clock by one tick and returns the new value.
    pub fn advance(&self) -> Timestamp {
        self.height.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    /// Moves the clock to `height` if that is not in the past.
    ///
    /// Returns the clock value after the call.
    pub fn set(&self, height: Timestamp) -> Timestamp {
        let prev = self.height.fetch_max(height, Ordering::SeqCst);
        prev.max(height)
    }
}

impl Clock for LogicalClock {
    fn now(&self) -> Timestamp {
        self.height.load(Ordering::SeqCst)
    }
}

/// A clock frozen at one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
