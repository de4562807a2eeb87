//! # Registry Facade
//!
//! [`Registry`] owns a Record Store and the validation limits. Its public
//! operations are spread over the component modules (`access`, `vault`,
//! `ledger`, `history`, `threshold`, `category`), each adding an
//! `impl Registry<S>` block for its own concern.
//!
//! Every operation follows the same shape:
//!
//! 1. open a [`Txn`] over the store,
//! 2. run every check, staging writes as it goes,
//! 3. commit the staged writes in one batch.
//!
//! An error anywhere before step 3 drops the `Txn`, so a failed call never
//! leaves a partial write behind.

use crate::config::RegistryConfig;
use crate::context::CallContext;
use crate::error::RegistryResult;
use crate::storage::{MemoryStore, RecordStore, Txn};

/// The asset registry over a Record Store `S`.
#[derive(Debug)]
pub struct Registry<S: RecordStore> {
    store: S,
    config: RegistryConfig,
}

impl<S: RecordStore> Registry<S> {
    /// Creates a registry with default limits.
    pub fn new(store: S) -> Self {
        Self::with_config(store, RegistryConfig::default())
    }

    /// Creates a registry with explicit limits.
    pub fn with_config(store: S, config: RegistryConfig) -> Self {
        Self { store, config }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active validation limits.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Opens a staging transaction over the store.
    pub(crate) fn begin(&self) -> Txn<'_, S> {
        Txn::new(&self.store)
    }
}

impl Registry<MemoryStore> {
    /// A registry over a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

/// Logs a rejected mutation and passes the result through.
pub(crate) fn logged<T>(
    operation: &'static str,
    ctx: &CallContext,
    result: RegistryResult<T>,
) -> RegistryResult<T> {
    if let Err(err) = &result {
        tracing::warn!(
            operation,
            caller = %ctx.caller,
            now = ctx.now,
            kind = err.kind().as_str(),
            error = %err,
            "operation rejected"
        );
    }
    result
}
