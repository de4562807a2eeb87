//! # SledStore: Persistent Record Store
//!
//! The durable backend, built on sled's embedded key-value store.
//!
//! ## Layout
//!
//! All seven tables share one sled tree, `records`. Each key is the
//! table's one-byte tag followed by the composite key:
//!
//! | Tag | Table             | Key                                   | Value                  |
//! |-----|-------------------|---------------------------------------|------------------------|
//! | 1   | `vaults`          | owner                                 | `bincode(Vault)`       |
//! | 2   | `assets`          | owner, asset_id                       | `bincode(Asset)`       |
//! | 3   | `categories`      | owner, category_id                    | `bincode(Category)`    |
//! | 4   | `grants`          | owner, viewer                         | `bincode(ViewerGrant)` |
//! | 5   | `valuations`      | owner, asset_id, timestamp, sequence  | `bincode(ValuationEvent)` |
//! | 6   | `thresholds`      | owner, asset_id, threshold_id         | `bincode(Threshold)`   |
//! | 7   | `threshold_index` | owner, asset_id                       | `bincode(BTreeSet<ThresholdId>)` |
//!
//! A second tree, `meta`, holds host bookkeeping that is not part of any
//! table. Today that is only the last logical clock value handed out.
//!
//! ## Atomicity
//!
//! A `sled::Batch` is atomic within one tree. Keeping every table in the
//! same tree means one registry operation is one batch: either every record
//! it touches lands on disk or none does.

use sled::{Batch, Db, Tree};
use std::path::Path;

use super::{decode, encode, RecordStore, StoreResult, Table, WriteBatch, WriteOp};
use crate::types::Timestamp;

/// Name of the tree holding every table.
const RECORDS_TREE: &str = "records";

/// Name of the tree holding host bookkeeping.
const META_TREE: &str = "meta";

/// Key of the persisted clock value inside [`META_TREE`].
const CLOCK_HEIGHT_KEY: &[u8] = b"clock_height";

/// Persistent [`RecordStore`] backed by sled.
///
/// Cheap to clone; clones share the same database handle.
#[derive(Debug, Clone)]
pub struct SledStore {
    /// The underlying sled database handle.
    db: Db,
    /// The shared keyspace for all tables.
    records: Tree,
    /// Host bookkeeping (clock height).
    meta: Tree,
}

impl SledStore {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    ///
    /// Suited to unit tests: nothing is left on disk.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let records = db.open_tree(RECORDS_TREE)?;
        let meta = db.open_tree(META_TREE)?;
        Ok(Self { db, records, meta })
    }

    /// Number of records in one table.
    pub fn len(&self, table: Table) -> usize {
        self.records.scan_prefix([table.tag()]).count()
    }

    /// Returns `true` if no table holds any record.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The last clock value recorded with [`SledStore::save_clock_height`].
    pub fn clock_height(&self) -> StoreResult<Option<Timestamp>> {
        match self.meta.get(CLOCK_HEIGHT_KEY)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Records the clock value the host is about to hand out.
    pub fn save_clock_height(&self, height: Timestamp) -> StoreResult<()> {
        self.meta.insert(CLOCK_HEIGHT_KEY, encode(&height)?)?;
        Ok(())
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// Prepends the table tag to a composite key.
fn tagged(table: Table, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 1);
    out.push(table.tag());
    out.extend_from_slice(key);
    out
}

impl RecordStore for SledStore {
    fn get(&self, table: Table, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.records.get(tagged(table, key))?.map(|v| v.to_vec()))
    }

    fn scan_prefix(&self, table: Table, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        for result in self.records.scan_prefix(tagged(table, prefix)) {
            let (key, value) = result?;
            out.push((key[1..].to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut sled_batch = Batch::default();
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { table, key, value } => sled_batch.insert(tagged(table, &key), value),
                WriteOp::Delete { table, key } => sled_batch.remove(tagged(table, &key)),
            }
        }
        self.records.apply_batch(sled_batch)?;
        Ok(())
    }
}
