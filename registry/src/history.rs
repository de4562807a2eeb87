//! # Valuation History
//!
//! An append-only log of `(timestamp, value)` points per asset. The only
//! writer is [`record`], called by the asset ledger on registration and on
//! every value update. Events are never rewritten or removed, not even when
//! the asset itself is deleted.
//!
//! Events recorded at the same clock value do not overwrite each other: the
//! key carries a per-timestamp sequence number, so the number of events
//! always equals the number of value-setting calls.

use tracing::debug;

use crate::access::require_asset_view;
use crate::context::CallContext;
use crate::error::RegistryResult;
use crate::registry::Registry;
use crate::storage::{keys, RecordStore, Table, Txn};
use crate::types::{Timestamp, ValuationEvent};

/// Stages a new valuation event for `(owner, asset_id)` at `now`.
pub fn record<S: RecordStore + ?Sized>(
    txn: &mut Txn<'_, S>,
    owner: &str,
    asset_id: &str,
    value: u64,
    now: Timestamp,
) -> RegistryResult<ValuationEvent> {
    let taken = txn
        .scan_raw(Table::Valuations, &keys::valuation_at(owner, asset_id, now))?
        .len();
    let sequence = u32::try_from(taken).unwrap_or(u32::MAX);

    let event = ValuationEvent {
        asset_id: asset_id.to_string(),
        timestamp: now,
        sequence,
        value,
    };
    txn.put(
        Table::Valuations,
        keys::valuation(owner, asset_id, now, sequence),
        &event,
    )?;
    Ok(event)
}

/// Every event for `(owner, asset_id)`, oldest first.
pub fn events<S: RecordStore + ?Sized>(
    txn: &Txn<'_, S>,
    owner: &str,
    asset_id: &str,
) -> RegistryResult<Vec<ValuationEvent>> {
    Ok(txn.scan(Table::Valuations, &keys::asset_prefix(owner, asset_id))?)
}

impl<S: RecordStore> Registry<S> {
    /// The full valuation history of one asset, oldest first.
    ///
    /// Works after the asset is deleted, though only the owner or a grantee
    /// can still see it then.
    pub fn history(
        &self,
        ctx: &CallContext,
        owner: &str,
        asset_id: &str,
    ) -> RegistryResult<Vec<ValuationEvent>> {
        let txn = self.begin();
        require_asset_view(&txn, ctx, owner, asset_id)?;
        let events = events(&txn, owner, asset_id)?;
        debug!(owner, asset_id, count = events.len(), "history read");
        Ok(events)
    }

    /// The value the asset had at `timestamp`: the latest event recorded at
    /// or before it. `None` if the asset had no value yet.
    pub fn value_at(
        &self,
        ctx: &CallContext,
        owner: &str,
        asset_id: &str,
        timestamp: Timestamp,
    ) -> RegistryResult<Option<u64>> {
        let txn = self.begin();
        require_asset_view(&txn, ctx, owner, asset_id)?;
        Ok(events(&txn, owner, asset_id)?
            .into_iter()
            .take_while(|e| e.timestamp <= timestamp)
            .last()
            .map(|e| e.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::storage::MemoryStore;

    #[test]
    fn same_timestamp_events_accumulate() {
        let store = MemoryStore::new();
        let mut txn = Txn::new(&store);
        let first = record(&mut txn, "alice", "a1", 100, 5).unwrap();
        let second = record(&mut txn, "alice", "a1", 200, 5).unwrap();
        txn.commit().unwrap();

        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);

        let txn = Txn::new(&store);
        let values: Vec<u64> = events(&txn, "alice", "a1")
            .unwrap()
            .into_iter()
            .map(|e| e.value)
            .collect();
        assert_eq!(values, vec![100, 200]);
    }

    #[test]
    fn events_are_scoped_to_one_asset() {
        let store = MemoryStore::new();
        let mut txn = Txn::new(&store);
        record(&mut txn, "alice", "a", 1, 1).unwrap();
        record(&mut txn, "alice", "ab", 2, 1).unwrap();
        record(&mut txn, "bob", "a", 3, 1).unwrap();
        txn.commit().unwrap();

        let txn = Txn::new(&store);
        let only: Vec<u64> = events(&txn, "alice", "a")
            .unwrap()
            .into_iter()
            .map(|e| e.value)
            .collect();
        assert_eq!(only, vec![1]);
    }

    #[test]
    fn value_at_picks_latest_not_after() {
        let reg = Registry::in_memory();
        let store = reg.store();
        let mut txn = Txn::new(store);
        record(&mut txn, "alice", "a1", 10, 5).unwrap();
        record(&mut txn, "alice", "a1", 20, 9).unwrap();
        record(&mut txn, "alice", "a1", 30, 9).unwrap();
        txn.commit().unwrap();

        let ctx = CallContext::new("alice", 12);
        assert_eq!(reg.value_at(&ctx, "alice", "a1", 4).unwrap(), None);
        assert_eq!(reg.value_at(&ctx, "alice", "a1", 5).unwrap(), Some(10));
        assert_eq!(reg.value_at(&ctx, "alice", "a1", 8).unwrap(), Some(10));
        assert_eq!(reg.value_at(&ctx, "alice", "a1", 9).unwrap(), Some(30));
        assert_eq!(reg.value_at(&ctx, "alice", "a1", 100).unwrap(), Some(30));
    }

    #[test]
    fn history_requires_visibility() {
        let reg = Registry::in_memory();
        let err = reg
            .history(&CallContext::new("mallory", 1), "alice", "a1")
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotAuthorized(_)));
    }
}
