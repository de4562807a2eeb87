//! # Vault Manager
//!
//! A vault is the per-owner metadata record. It is never created
//! explicitly: the first asset, category, or grant write by an owner
//! materializes it through [`ensure_vault`], and every later mutation bumps
//! its `last_updated` through [`touch_vault`].

use tracing::info;

use crate::access::require_vault_view;
use crate::context::CallContext;
use crate::error::{RegistryError, RegistryResult};
use crate::registry::{logged, Registry};
use crate::storage::{keys, RecordStore, Table, Txn};
use crate::types::{Timestamp, Vault};

/// Stages a new vault for `owner` unless one already exists.
///
/// Idempotent: an existing vault keeps its name, flags, and timestamps.
pub fn ensure_vault<S: RecordStore + ?Sized>(
    txn: &mut Txn<'_, S>,
    owner: &str,
    default_name: &str,
    now: Timestamp,
) -> RegistryResult<()> {
    let key = keys::vault(owner);
    if txn.contains(Table::Vaults, &key)? {
        return Ok(());
    }
    let vault = Vault {
        owner: owner.to_string(),
        name: default_name.to_string(),
        created_at: now,
        public_view: false,
        last_updated: now,
    };
    txn.put(Table::Vaults, key, &vault)?;
    Ok(())
}

/// Stages a `last_updated` bump on `owner`'s vault.
///
/// The timestamp never moves backwards, even if `now` is older than the
/// stored value.
///
/// # Errors
///
/// Returns [`RegistryError::VaultNotFound`] if the vault was never
/// materialized. Callers must run [`ensure_vault`] first.
pub fn touch_vault<S: RecordStore + ?Sized>(
    txn: &mut Txn<'_, S>,
    owner: &str,
    now: Timestamp,
) -> RegistryResult<()> {
    let key = keys::vault(owner);
    let mut vault: Vault = txn
        .get(Table::Vaults, &key)?
        .ok_or_else(|| RegistryError::VaultNotFound(owner.to_string()))?;
    vault.last_updated = vault.last_updated.max(now);
    txn.put(Table::Vaults, key, &vault)?;
    Ok(())
}

impl<S: RecordStore> Registry<S> {
    /// Reads `owner`'s vault metadata.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotAuthorized`] if the caller is neither the
    /// owner, a current grantee, nor looking at a public vault, and
    /// [`RegistryError::VaultNotFound`] if the owner has never written.
    pub fn get_vault(&self, ctx: &CallContext, owner: &str) -> RegistryResult<Vault> {
        let txn = self.begin();
        require_vault_view(&txn, ctx, owner)?;
        txn.get(Table::Vaults, &keys::vault(owner))?
            .ok_or_else(|| RegistryError::VaultNotFound(owner.to_string()))
    }

    /// Renames the caller's vault and sets its public flag, materializing
    /// the vault if needed.
    pub fn update_vault(
        &self,
        ctx: &CallContext,
        name: &str,
        public_view: bool,
    ) -> RegistryResult<String> {
        logged("update_vault", ctx, self.update_vault_inner(ctx, name, public_view))
    }

    fn update_vault_inner(
        &self,
        ctx: &CallContext,
        name: &str,
        public_view: bool,
    ) -> RegistryResult<String> {
        self.config().check_name("name", name)?;
        let owner = ctx.caller.as_str();
        let mut txn = self.begin();
        ensure_vault(&mut txn, owner, name, ctx.now)?;

        let key = keys::vault(owner);
        let mut vault: Vault = txn
            .get(Table::Vaults, &key)?
            .ok_or_else(|| RegistryError::VaultNotFound(owner.to_string()))?;
        vault.name = name.to_string();
        vault.public_view = public_view;
        txn.put(Table::Vaults, key, &vault)?;
        touch_vault(&mut txn, owner, ctx.now)?;
        txn.commit()?;

        info!(owner, public_view, now = ctx.now, "vault updated");
        Ok(owner.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn ensure_vault_creates_once() {
        let store = MemoryStore::new();
        let mut txn = Txn::new(&store);
        ensure_vault(&mut txn, "alice", "First", 3).unwrap();
        ensure_vault(&mut txn, "alice", "Second", 9).unwrap();
        txn.commit().unwrap();

        let txn = Txn::new(&store);
        let vault: Vault = txn.get(Table::Vaults, &keys::vault("alice")).unwrap().unwrap();
        assert_eq!(vault.name, "First");
        assert_eq!(vault.created_at, 3);
        assert_eq!(vault.last_updated, 3);
        assert!(!vault.public_view);
    }

    #[test]
    fn touch_missing_vault_fails() {
        let store = MemoryStore::new();
        let mut txn = Txn::new(&store);
        let err = touch_vault(&mut txn, "ghost", 1).unwrap_err();
        assert!(matches!(err, RegistryError::VaultNotFound(_)));
    }

    #[test]
    fn touch_never_moves_backwards() {
        let store = MemoryStore::new();
        let mut txn = Txn::new(&store);
        ensure_vault(&mut txn, "alice", "V", 10).unwrap();
        touch_vault(&mut txn, "alice", 20).unwrap();
        touch_vault(&mut txn, "alice", 15).unwrap();

        let vault: Vault = txn.get(Table::Vaults, &keys::vault("alice")).unwrap().unwrap();
        assert_eq!(vault.last_updated, 20);
    }

    #[test]
    fn update_vault_keeps_creation_time() {
        let reg = Registry::in_memory();
        reg.update_vault(&CallContext::new("alice", 1), "Alpha", false)
            .unwrap();
        reg.update_vault(&CallContext::new("alice", 7), "Beta", true)
            .unwrap();

        let vault = reg.get_vault(&CallContext::new("alice", 8), "alice").unwrap();
        assert_eq!(vault.name, "Beta");
        assert!(vault.public_view);
        assert_eq!(vault.created_at, 1);
        assert_eq!(vault.last_updated, 7);
    }

    #[test]
    fn get_vault_requires_visibility() {
        let reg = Registry::in_memory();
        reg.update_vault(&CallContext::new("alice", 1), "Private", false)
            .unwrap();
        let bob = CallContext::new("bob", 2);
        assert!(matches!(
            reg.get_vault(&bob, "alice"),
            Err(RegistryError::NotAuthorized(_))
        ));

        reg.authorize_viewer(&CallContext::new("alice", 3), "bob", None)
            .unwrap();
        assert_eq!(reg.get_vault(&bob, "alice").unwrap().name, "Private");
    }

    #[test]
    fn get_missing_vault_is_vault_not_found() {
        let reg = Registry::in_memory();
        assert!(matches!(
            reg.get_vault(&CallContext::new("alice", 1), "alice"),
            Err(RegistryError::VaultNotFound(_))
        ));
    }
}
