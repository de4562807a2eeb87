//! Composite key encoding.
//!
//! A key is a sequence of segments. String segments are written as a
//! big-endian `u32` length followed by the raw bytes; integer segments as
//! big-endian `u64`/`u32`. Length prefixes keep `("ab", "c")` and
//! `("a", "bc")` apart, and big-endian integers sort numerically.

use crate::types::Timestamp;

/// Incrementally builds a composite key.
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    buf: Vec<u8>,
}

impl KeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a length-prefixed string segment.
    pub fn str(mut self, segment: &str) -> Self {
        let len = u32::try_from(segment.len()).unwrap_or(u32::MAX);
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(segment.as_bytes());
        self
    }

    /// Appends a big-endian `u64` segment.
    pub fn u64(mut self, segment: u64) -> Self {
        self.buf.extend_from_slice(&segment.to_be_bytes());
        self
    }

    /// Appends a big-endian `u32` segment.
    pub fn u32(mut self, segment: u32) -> Self {
        self.buf.extend_from_slice(&segment.to_be_bytes());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// `owner`
pub fn vault(owner: &str) -> Vec<u8> {
    KeyBuilder::new().str(owner).build()
}

/// `(owner, asset_id)`
pub fn asset(owner: &str, asset_id: &str) -> Vec<u8> {
    KeyBuilder::new().str(owner).str(asset_id).build()
}

/// `(owner, category_id)`
pub fn category(owner: &str, category_id: &str) -> Vec<u8> {
    KeyBuilder::new().str(owner).str(category_id).build()
}

/// `(owner, viewer)`
pub fn grant(owner: &str, viewer: &str) -> Vec<u8> {
    KeyBuilder::new().str(owner).str(viewer).build()
}

/// `(owner, asset_id, timestamp, sequence)`
pub fn valuation(owner: &str, asset_id: &str, timestamp: Timestamp, sequence: u32) -> Vec<u8> {
    KeyBuilder::new()
        .str(owner)
        .str(asset_id)
        .u64(timestamp)
        .u32(sequence)
        .build()
}

/// Prefix selecting every valuation event recorded at one timestamp.
pub fn valuation_at(owner: &str, asset_id: &str, timestamp: Timestamp) -> Vec<u8> {
    KeyBuilder::new()
        .str(owner)
        .str(asset_id)
        .u64(timestamp)
        .build()
}

/// `(owner, asset_id, threshold_id)`
pub fn threshold(owner: &str, asset_id: &str, threshold_id: &str) -> Vec<u8> {
    KeyBuilder::new()
        .str(owner)
        .str(asset_id)
        .str(threshold_id)
        .build()
}

/// Prefix selecting everything one owner holds in a table.
pub fn owner_prefix(owner: &str) -> Vec<u8> {
    vault(owner)
}

/// Prefix selecting everything recorded for one asset in a table, and the
/// key of the asset's entry in the threshold index.
pub fn asset_prefix(owner: &str, asset_id: &str) -> Vec<u8> {
    asset(owner, asset_id)
}
