//! # Registry Configuration & Constants
//!
//! Every limit the registry enforces lives here. The node can override the
//! defaults from its config file.

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Maximum length of any caller-chosen identifier, in bytes.
pub const DEFAULT_MAX_ID_LENGTH: usize = 64;

/// Maximum length of a display name, in bytes.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 128;

/// Maximum length of free-form metadata or a description, in bytes.
pub const DEFAULT_MAX_METADATA_LENGTH: usize = 1024;

/// Name given to a vault materialized implicitly by a first write.
pub const DEFAULT_VAULT_NAME: &str = "My Vault";

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Validation limits applied before any write is staged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Upper bound for asset, category, threshold, and viewer ids.
    pub max_id_length: usize,
    /// Upper bound for asset, vault, and category names.
    pub max_name_length: usize,
    /// Upper bound for metadata and descriptions.
    pub max_metadata_length: usize,
    /// Name used when a vault is materialized by a first write.
    pub default_vault_name: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_id_length: DEFAULT_MAX_ID_LENGTH,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_metadata_length: DEFAULT_MAX_METADATA_LENGTH,
            default_vault_name: DEFAULT_VAULT_NAME.to_string(),
        }
    }
}

impl RegistryConfig {
    /// Checks a caller-chosen identifier: non-empty and within bounds.
    pub fn check_id(&self, field: &str, id: &str) -> RegistryResult<()> {
        if id.is_empty() {
            return Err(RegistryError::InvalidParameters(format!(
                "{field} must not be empty"
            )));
        }
        if id.len() > self.max_id_length {
            return Err(RegistryError::InvalidParameters(format!(
                "{field} exceeds {} bytes",
                self.max_id_length
            )));
        }
        Ok(())
    }

    /// Checks a display name against `max_name_length`.
    pub fn check_name(&self, field: &str, name: &str) -> RegistryResult<()> {
        if name.len() > self.max_name_length {
            return Err(RegistryError::InvalidParameters(format!(
                "{field} exceeds {} bytes",
                self.max_name_length
            )));
        }
        Ok(())
    }

    /// Checks optional free-form text against `max_metadata_length`.
    pub fn check_text(&self, field: &str, text: Option<&str>) -> RegistryResult<()> {
        match text {
            Some(t) if t.len() > self.max_metadata_length => {
                Err(RegistryError::InvalidParameters(format!(
                    "{field} exceeds {} bytes",
                    self.max_metadata_length
                )))
            }
            _ => Ok(()),
        }
    }
}
