//! # Registry Records
//!
//! The six record kinds stored by the registry, plus the small value types
//! they share. Every record derives `Serialize`/`Deserialize` so it can be
//! written to the Record Store with bincode and returned over the wire as
//! JSON by the node.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// An authenticated identity. Compared byte-for-byte, never normalized.
pub type Principal = String;

/// Caller-chosen asset identifier, unique within one owner's vault.
pub type AssetId = String;

/// Caller-chosen category identifier, unique within one owner's vault.
pub type CategoryId = String;

/// Caller-chosen threshold identifier, unique within one asset.
pub type ThresholdId = String;

/// A reading of the logical clock (e.g. block height).
pub type Timestamp = u64;

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Per-owner portfolio metadata. Materialized on the owner's first write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    /// The owning identity (also the record key).
    pub owner: Principal,
    /// Display name.
    pub name: String,
    /// Clock value when the vault was first materialized.
    pub created_at: Timestamp,
    /// Whether any caller may read the vault's metadata and categories.
    pub public_view: bool,
    /// Clock value of the latest mutation touching this owner's records.
    /// Never moves backwards.
    pub last_updated: Timestamp,
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// Descriptive fields of an asset, everything except its value.
///
/// Shared by registration and detail updates so both operations accept the
/// same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDetails {
    /// Human-readable name.
    pub name: String,
    /// Free-form category label. Not checked against stored categories.
    pub category: String,
    /// Clock value at which the owner acquired the asset.
    pub acquisition_date: Timestamp,
    /// Price paid at acquisition, in the smallest unit.
    pub acquisition_cost: u64,
    /// Optional free-form metadata.
    #[serde(default)]
    pub metadata: Option<String>,
    /// Whether any caller may view this one asset without a grant.
    #[serde(default)]
    pub public_view: bool,
}

/// An asset record, keyed by `(owner, asset_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Identifier chosen by the owner at registration.
    pub asset_id: AssetId,
    /// Human-readable name.
    pub name: String,
    /// Free-form category label.
    pub category: String,
    /// Clock value at which the owner acquired the asset.
    pub acquisition_date: Timestamp,
    /// Price paid at acquisition.
    pub acquisition_cost: u64,
    /// Latest recorded value.
    pub current_value: u64,
    /// Clock value of the latest change to this record.
    pub last_updated: Timestamp,
    /// Optional free-form metadata.
    pub metadata: Option<String>,
    /// Per-asset public-visibility flag.
    pub public_view: bool,
}

impl Asset {
    /// Builds a fresh asset record from its details and opening value.
    pub fn new(asset_id: AssetId, details: AssetDetails, current_value: u64, now: Timestamp) -> Self {
        Self {
            asset_id,
            name: details.name,
            category: details.category,
            acquisition_date: details.acquisition_date,
            acquisition_cost: details.acquisition_cost,
            current_value,
            last_updated: now,
            metadata: details.metadata,
            public_view: details.public_view,
        }
    }

    /// Overwrites every descriptive field, keeping `current_value`.
    pub fn apply_details(&mut self, details: AssetDetails, now: Timestamp) {
        self.name = details.name;
        self.category = details.category;
        self.acquisition_date = details.acquisition_date;
        self.acquisition_cost = details.acquisition_cost;
        self.metadata = details.metadata;
        self.public_view = details.public_view;
        self.last_updated = now;
    }
}

// ---------------------------------------------------------------------------
// Valuation Event
// ---------------------------------------------------------------------------

/// One immutable point in an asset's value history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationEvent {
    /// The asset this value belongs to.
    pub asset_id: AssetId,
    /// Clock value at which the value was recorded.
    pub timestamp: Timestamp,
    /// Position among events sharing `timestamp`, starting at 0.
    pub sequence: u32,
    /// The recorded value.
    pub value: u64,
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A named category in an owner's vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Viewer Grant
// ---------------------------------------------------------------------------

/// Delegated read access from a vault owner to one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerGrant {
    /// The identity receiving read access.
    pub viewer: Principal,
    /// Clock value when the grant was (last) written.
    pub granted_at: Timestamp,
    /// Exclusive expiry. `None` means the grant never expires.
    pub expires_at: Option<Timestamp>,
}

impl ViewerGrant {
    /// Returns `true` if the grant still confers access at `now`.
    ///
    /// A grant expiring exactly at `now` is already expired.
    pub fn is_active(&self, now: Timestamp) -> bool {
        match self.expires_at {
            None => true,
            Some(expiry) => expiry > now,
        }
    }
}

// ---------------------------------------------------------------------------
// Threshold
// ---------------------------------------------------------------------------

/// How a threshold compares an asset's current value to its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Comparison {
    /// Triggered when `current_value > value`.
    GreaterThan,
    /// Triggered when `current_value < value`.
    LessThan,
}

impl Comparison {
    /// Returns `true` if `current` satisfies this comparison against `bound`.
    pub fn is_triggered(self, current: u64, bound: u64) -> bool {
        match self {
            Comparison::GreaterThan => current > bound,
            Comparison::LessThan => current < bound,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::GreaterThan => write!(f, "gt"),
            Comparison::LessThan => write!(f, "lt"),
        }
    }
}

impl FromStr for Comparison {
    type Err = RegistryError;

    /// Accepts the short (`gt`, `lt`) and long (`greater-than`, `less-than`)
    /// spellings. Anything else is `InvalidParameters`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gt" | "greater-than" => Ok(Comparison::GreaterThan),
            "lt" | "less-than" => Ok(Comparison::LessThan),
            other => Err(RegistryError::InvalidParameters(format!(
                "unknown comparison operator '{other}'"
            ))),
        }
    }
}

/// A stored comparison rule, keyed by `(owner, asset_id, threshold_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub threshold_id: ThresholdId,
    pub asset_id: AssetId,
    pub comparison: Comparison,
    /// The bound the asset's current value is compared against.
    pub value: u64,
    pub description: Option<String>,
    pub created_at: Timestamp,
}

impl Threshold {
    /// Returns `true` if `current_value` crosses this threshold.
    pub fn is_triggered(&self, current_value: u64) -> bool {
        self.comparison.is_triggered(current_value, self.value)
    }
}
