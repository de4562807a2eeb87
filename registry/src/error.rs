//! # Registry Errors
//!
//! Every failing operation returns one [`RegistryError`]. The variants map
//! one-to-one onto the error kinds callers are expected to branch on, plus
//! a `Storage` variant for failures of the underlying Record Store.
//!
//! No error is ever raised after a write has been staged for commit, so a
//! caller receiving any of these can assume the store is unchanged.

use thiserror::Error;

use crate::storage::StoreError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The caller failed the ownership, grant, or visibility check.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// No asset with this id exists in the owner's vault.
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// The owner already registered an asset with this id.
    #[error("asset already exists: {0}")]
    AssetExists(String),

    /// The vault record is missing. Mutations always materialize the vault
    /// first, so outside of reads this indicates a broken invariant.
    #[error("vault not found for owner {0}")]
    VaultNotFound(String),

    /// A parameter failed validation (unknown operator, empty id, ...).
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// No category with this id exists in the owner's vault.
    #[error("category not found: {0}")]
    CategoryNotFound(String),

    /// No threshold with this id exists for the asset.
    #[error("threshold not found: {0}")]
    ThresholdNotFound(String),

    /// A threshold with this id already exists for the asset.
    #[error("threshold already exists: {0}")]
    ThresholdExists(String),

    /// The Record Store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Payload-free discriminant of a [`RegistryError`].
///
/// Transport layers match on this rather than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotAuthorized,
    AssetNotFound,
    AssetExists,
    VaultNotFound,
    InvalidParameters,
    CategoryNotFound,
    ThresholdNotFound,
    ThresholdExists,
    Storage,
}

impl ErrorKind {
    /// Stable snake_case label, suitable for metrics and JSON bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotAuthorized => "not_authorized",
            ErrorKind::AssetNotFound => "asset_not_found",
            ErrorKind::AssetExists => "asset_exists",
            ErrorKind::VaultNotFound => "vault_not_found",
            ErrorKind::InvalidParameters => "invalid_parameters",
            ErrorKind::CategoryNotFound => "category_not_found",
            ErrorKind::ThresholdNotFound => "threshold_not_found",
            ErrorKind::ThresholdExists => "threshold_exists",
            ErrorKind::Storage => "storage",
        }
    }
}

impl RegistryError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::NotAuthorized(_) => ErrorKind::NotAuthorized,
            RegistryError::AssetNotFound(_) => ErrorKind::AssetNotFound,
            RegistryError::AssetExists(_) => ErrorKind::AssetExists,
            RegistryError::VaultNotFound(_) => ErrorKind::VaultNotFound,
            RegistryError::InvalidParameters(_) => ErrorKind::InvalidParameters,
            RegistryError::CategoryNotFound(_) => ErrorKind::CategoryNotFound,
            RegistryError::ThresholdNotFound(_) => ErrorKind::ThresholdNotFound,
            RegistryError::ThresholdExists(_) => ErrorKind::ThresholdExists,
            RegistryError::Storage(_) => ErrorKind::Storage,
        }
    }
}
