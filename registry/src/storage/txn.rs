//! Staging transactions.
//!
//! A [`Txn`] layers uncommitted writes over a [`RecordStore`]. Reads see
//! the staged writes first, so a multi-step operation (materialize the
//! vault, insert the asset, touch the vault) observes its own earlier
//! steps. Nothing reaches the store until [`Txn::commit`], which hands the
//! whole set to the backend as one atomic batch. Dropping a `Txn` discards
//! it.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{decode, encode, RecordStore, StoreResult, Table, WriteBatch};

/// Uncommitted writes over a store. `None` marks a staged delete.
pub struct Txn<'s, S: RecordStore + ?Sized> {
    store: &'s S,
    staged: BTreeMap<(Table, Vec<u8>), Option<Vec<u8>>>,
}

impl<'s, S: RecordStore + ?Sized> Txn<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            staged: BTreeMap::new(),
        }
    }

    /// Reads raw bytes, preferring staged writes over the store.
    pub fn get_raw(&self, table: Table, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        match self.staged.get(&(table, key.to_vec())) {
            Some(staged) => Ok(staged.clone()),
            None => self.store.get(table, key),
        }
    }

    /// Scans a prefix, merging staged writes into the store's view.
    pub fn scan_raw(&self, table: Table, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.store.scan_prefix(table, prefix)?.into_iter().collect();

        let staged = self
            .staged
            .range((table, prefix.to_vec())..)
            .take_while(|((t, k), _)| *t == table && k.starts_with(prefix));
        for ((_, key), value) in staged {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    /// Reads and decodes one record.
    pub fn get<T: DeserializeOwned>(&self, table: Table, key: &[u8]) -> StoreResult<Option<T>> {
        match self.get_raw(table, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Returns `true` if a record exists under `key`.
    pub fn contains(&self, table: Table, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get_raw(table, key)?.is_some())
    }

    /// Decodes every record under `prefix`, in key order.
    pub fn scan<T: DeserializeOwned>(&self, table: Table, prefix: &[u8]) -> StoreResult<Vec<T>> {
        self.scan_raw(table, prefix)?
            .iter()
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }

    /// Stages an insert or overwrite.
    pub fn put<T: Serialize>(&mut self, table: Table, key: Vec<u8>, value: &T) -> StoreResult<()> {
        let bytes = encode(value)?;
        self.staged.insert((table, key), Some(bytes));
        Ok(())
    }

    /// Stages a delete. Deleting a missing key is not an error.
    pub fn delete(&mut self, table: Table, key: Vec<u8>) {
        self.staged.insert((table, key), None);
    }

    /// Applies every staged write to the store in one batch.
    pub fn commit(self) -> StoreResult<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        for ((table, key), value) in self.staged {
            match value {
                Some(v) => batch.put(table, key, v),
                None => batch.delete(table, key),
            }
        }
        self.store.commit(batch)
    }
}
