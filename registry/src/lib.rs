// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # AssetVault Registry
//!
//! An owner-scoped registry of digital assets. Every record belongs to
//! exactly one owner's vault; other identities see it only through a
//! time-limited viewer grant or a per-asset public flag. On top of the
//! records sit an append-only valuation history and pull-based threshold
//! monitoring.
//!
//! ## Architecture
//!
//! - **context**: Caller identity and the logical clock, passed explicitly.
//! - **storage**: The keyed Record Store trait, staging transactions, and
//!   the in-memory and sled-backed implementations.
//! - **access**: The authorization/visibility decision engine and grants.
//! - **vault**: Lazy vault materialization and last-updated tracking.
//! - **ledger**: Asset CRUD scoped to the caller's own vault.
//! - **history**: Append-only valuation events.
//! - **threshold**: Stored comparison rules and on-demand evaluation.
//! - **category**: Per-owner category labels.
//! - **registry**: The [`Registry`] facade every public operation hangs off.
//!
//! ## Ground Rules
//!
//! 1. Writes never take an owner parameter. The owner is the caller.
//! 2. Every operation validates first and writes last, in one atomic batch.
//!    A failed call leaves no trace in the store.
//! 3. Time is an input. The engine never reads a wall clock.

pub mod access;
pub mod category;
pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod ledger;
pub mod registry;
pub mod storage;
pub mod threshold;
pub mod types;
pub mod vault;

pub use access::GrantStatus;
pub use config::RegistryConfig;
pub use context::{CallContext, Clock, FixedClock, LogicalClock};
pub use error::{ErrorKind, RegistryError, RegistryResult};
pub use registry::Registry;
pub use storage::{MemoryStore, RecordStore, SledStore};
pub use types::{
    Asset, AssetDetails, AssetId, Category, CategoryId, Comparison, Principal, Threshold,
    ThresholdId, Timestamp, ValuationEvent, Vault, ViewerGrant,
};
