//! # Storage Module
//!
//! The Record Store collaborator: seven independent keyed tables with
//! single-key reads, prefix scans, and atomic batch commits. Nothing above
//! this module knows which backend is in use.
//!
//! ## Architecture
//!
//! ```text
//! keys.rs  : Composite key encoding (length-prefixed strings, BE integers)
//! txn.rs   : Staging overlay: read-your-writes, commit as one batch
//! memory.rs: BTreeMap-backed store for tests and embedders
//! db.rs    : sled-backed persistent store
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Validate, then commit once.** Operations stage every write in a
//!    [`Txn`] and hand the whole set to [`RecordStore::commit`]. Backends
//!    must apply a batch atomically.
//!
//! 2. **Ordered keys.** Keys sort byte-wise in the same order as their
//!    components, so a prefix scan over `(owner, asset_id)` returns one
//!    asset's valuation events in time order.
//!
//! 3. **Bincode values.** Compact and deterministic. JSON is for the API.

pub mod db;
pub mod keys;
pub mod memory;
pub mod txn;

pub use db::SledStore;
pub use memory::MemoryStore;
pub use txn::Txn;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur inside a Record Store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// The keyed tables of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    /// `owner` → `Vault`
    Vaults,
    /// `(owner, asset_id)` → `Asset`
    Assets,
    /// `(owner, category_id)` → `Category`
    Categories,
    /// `(owner, viewer)` → `ViewerGrant`
    Grants,
    /// `(owner, asset_id, timestamp, sequence)` → `ValuationEvent`
    Valuations,
    /// `(owner, asset_id, threshold_id)` → `Threshold`
    Thresholds,
    /// `(owner, asset_id)` → set of threshold ids
    ThresholdIndex,
}

impl Table {
    /// Every table, in tag order.
    pub const ALL: [Table; 7] = [
        Table::Vaults,
        Table::Assets,
        Table::Categories,
        Table::Grants,
        Table::Valuations,
        Table::Thresholds,
        Table::ThresholdIndex,
    ];

    /// One-byte tag used by backends that share a single keyspace.
    pub fn tag(self) -> u8 {
        match self {
            Table::Vaults => 1,
            Table::Assets => 2,
            Table::Categories => 3,
            Table::Grants => 4,
            Table::Valuations => 5,
            Table::Thresholds => 6,
            Table::ThresholdIndex => 7,
        }
    }
}

// ---------------------------------------------------------------------------
// Write Batch
// ---------------------------------------------------------------------------

/// A single staged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put {
        table: Table,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        table: Table,
        key: Vec<u8>,
    },
}

/// An ordered set of mutations applied atomically by [`RecordStore::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, table: Table, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(WriteOp::Put { table, key, value });
    }

    pub fn delete(&mut self, table: Table, key: Vec<u8>) {
        self.ops.push(WriteOp::Delete { table, key });
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

// ---------------------------------------------------------------------------
// Record Store
// ---------------------------------------------------------------------------

/// A keyed store with atomic batch commits and ordered prefix scans.
///
/// Implementations must be safe to share across threads. They are not
/// required to serialize whole operations against each other; the host does
/// that.
pub trait RecordStore: Send + Sync {
    /// Reads one value.
    fn get(&self, table: Table, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Returns every `(key, value)` in `table` whose key starts with
    /// `prefix`, in ascending key order.
    fn scan_prefix(&self, table: Table, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Applies every operation in `batch`, or none of them.
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn get(&self, table: Table, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(table, key)
    }

    fn scan_prefix(&self, table: Table, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        (**self).scan_prefix(table, prefix)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        (**self).commit(batch)
    }
}

// ---------------------------------------------------------------------------
// Value Encoding
// ---------------------------------------------------------------------------

/// Encodes a record for storage.
pub fn encode<T: serde::Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decodes a stored record.
pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}
