//! # Logical Clock Persistence
//!
//! The node stamps every registry call with a [`LogicalClock`] value. Valuation
//! history and grant expiry both assume those stamps never go backwards, so
//! the last value handed out is written to the database before it becomes
//! visible, and a restarted node resumes strictly above it.

use assetvault_registry::storage::StoreResult;
use assetvault_registry::{Clock, LogicalClock, SledStore, Timestamp};

/// Picks the starting clock value.
///
/// Wall-clock seconds are used when they are ahead; otherwise the clock
/// resumes one tick past the last persisted value.
pub fn seed(persisted: Option<Timestamp>, wall: Timestamp) -> Timestamp {
    match persisted {
        Some(height) => wall.max(height.saturating_add(1)),
        None => wall,
    }
}

/// Opens the clock for `store`, persisting the starting value.
pub fn resume(store: &SledStore, wall: Timestamp) -> StoreResult<LogicalClock> {
    let start = seed(store.clock_height()?, wall);
    store.save_clock_height(start)?;
    Ok(LogicalClock::new(start))
}

/// Advances the clock by one, persisting the new value before publishing it.
pub fn tick(clock: &LogicalClock, store: &SledStore) -> StoreResult<Timestamp> {
    let next = clock.now().saturating_add(1);
    store.save_clock_height(next)?;
    Ok(clock.set(next))
}
