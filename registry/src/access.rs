//! # Access Control Engine
//!
//! Decides what a caller may see in someone else's vault. There are two
//! scopes with different reach:
//!
//! - **Vault scope.** A viewer grant from the owner unlocks reading every
//!   asset, history, threshold, and category in that vault until it
//!   expires. Grants never unlock writes.
//! - **Asset scope.** An asset's public flag unlocks that single asset to
//!   every caller, grant or not.
//!
//! Writes are never decided here. Mutating operations bind the owner to the
//! caller, so there is nothing to authorize.
//!
//! Decisions are booleans, not errors. Operations that need a hard failure
//! turn a `false` into [`RegistryError::NotAuthorized`] themselves.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::CallContext;
use crate::error::{RegistryError, RegistryResult};
use crate::registry::{logged, Registry};
use crate::storage::{keys, RecordStore, Table, Txn};
use crate::types::{Asset, Principal, Timestamp, Vault, ViewerGrant};
use crate::vault::{ensure_vault, touch_vault};

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// `true` if `caller` may read `owner`'s vault as a whole.
///
/// The owner always may. Anyone else needs a grant that has not expired:
/// a grant expiring at exactly `now` no longer counts.
pub fn is_authorized<S: RecordStore + ?Sized>(
    txn: &Txn<'_, S>,
    owner: &str,
    caller: &str,
    now: Timestamp,
) -> RegistryResult<bool> {
    if caller == owner {
        return Ok(true);
    }
    let grant: Option<ViewerGrant> = txn.get(Table::Grants, &keys::grant(owner, caller))?;
    Ok(grant.is_some_and(|g| g.is_active(now)))
}

/// `true` if `caller` may read one asset of `owner`.
///
/// Owner, public asset, or an active grant. A missing asset can only be
/// viewed through the owner or grant paths.
pub fn can_view_asset<S: RecordStore + ?Sized>(
    txn: &Txn<'_, S>,
    owner: &str,
    asset_id: &str,
    caller: &str,
    now: Timestamp,
) -> RegistryResult<bool> {
    if caller == owner {
        return Ok(true);
    }
    let asset: Option<Asset> = txn.get(Table::Assets, &keys::asset(owner, asset_id))?;
    if asset.is_some_and(|a| a.public_view) {
        return Ok(true);
    }
    is_authorized(txn, owner, caller, now)
}

/// `true` if `caller` may read `owner`'s vault metadata and categories.
///
/// Owner, public vault, or an active grant.
pub fn can_view_vault<S: RecordStore + ?Sized>(
    txn: &Txn<'_, S>,
    owner: &str,
    caller: &str,
    now: Timestamp,
) -> RegistryResult<bool> {
    if caller == owner {
        return Ok(true);
    }
    let vault: Option<Vault> = txn.get(Table::Vaults, &keys::vault(owner))?;
    if vault.is_some_and(|v| v.public_view) {
        return Ok(true);
    }
    is_authorized(txn, owner, caller, now)
}

/// Fails with `NotAuthorized` unless the caller may view the asset.
pub(crate) fn require_asset_view<S: RecordStore + ?Sized>(
    txn: &Txn<'_, S>,
    ctx: &CallContext,
    owner: &str,
    asset_id: &str,
) -> RegistryResult<()> {
    if can_view_asset(txn, owner, asset_id, &ctx.caller, ctx.now)? {
        Ok(())
    } else {
        Err(RegistryError::NotAuthorized(format!(
            "{} may not view asset {asset_id} of {owner}",
            ctx.caller
        )))
    }
}

/// Fails with `NotAuthorized` unless the caller may view the vault.
pub(crate) fn require_vault_view<S: RecordStore + ?Sized>(
    txn: &Txn<'_, S>,
    ctx: &CallContext,
    owner: &str,
) -> RegistryResult<()> {
    if can_view_vault(txn, owner, &ctx.caller, ctx.now)? {
        Ok(())
    } else {
        Err(RegistryError::NotAuthorized(format!(
            "{} may not view the vault of {owner}",
            ctx.caller
        )))
    }
}

// ---------------------------------------------------------------------------
// Grant listing
// ---------------------------------------------------------------------------

/// A stored grant together with its decision at the time of the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantStatus {
    #[serde(flatten)]
    pub grant: ViewerGrant,
    /// Whether the grant confers access at the query's clock value.
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl<S: RecordStore> Registry<S> {
    /// Whether the caller may read `owner`'s vault.
    pub fn is_authorized(&self, ctx: &CallContext, owner: &str) -> RegistryResult<bool> {
        let txn = self.begin();
        let allowed = is_authorized(&txn, owner, &ctx.caller, ctx.now)?;
        debug!(owner, caller = %ctx.caller, now = ctx.now, allowed, "vault authorization");
        Ok(allowed)
    }

    /// Whether the caller may read one asset of `owner`.
    pub fn can_view_asset(
        &self,
        ctx: &CallContext,
        owner: &str,
        asset_id: &str,
    ) -> RegistryResult<bool> {
        let txn = self.begin();
        let allowed = can_view_asset(&txn, owner, asset_id, &ctx.caller, ctx.now)?;
        debug!(owner, asset_id, caller = %ctx.caller, now = ctx.now, allowed, "asset visibility");
        Ok(allowed)
    }

    /// Whether the caller may read `owner`'s vault metadata and categories.
    pub fn can_view_vault(&self, ctx: &CallContext, owner: &str) -> RegistryResult<bool> {
        let txn = self.begin();
        can_view_vault(&txn, owner, &ctx.caller, ctx.now)
    }

    /// Grants `viewer` read access to the caller's vault.
    ///
    /// Re-authorizing a viewer replaces the previous grant. `expires_at` is
    /// exclusive and must lie after the current clock value; `None` grants
    /// permanent access.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidParameters`] for an empty viewer, a
    /// self-grant, or an expiry that is not in the future.
    pub fn authorize_viewer(
        &self,
        ctx: &CallContext,
        viewer: &str,
        expires_at: Option<Timestamp>,
    ) -> RegistryResult<Principal> {
        logged("authorize_viewer", ctx, self.authorize_viewer_inner(ctx, viewer, expires_at))
    }

    fn authorize_viewer_inner(
        &self,
        ctx: &CallContext,
        viewer: &str,
        expires_at: Option<Timestamp>,
    ) -> RegistryResult<Principal> {
        self.config().check_id("viewer", viewer)?;
        if viewer == ctx.caller {
            return Err(RegistryError::InvalidParameters(
                "an owner cannot grant access to themselves".into(),
            ));
        }
        if let Some(expiry) = expires_at {
            if expiry <= ctx.now {
                return Err(RegistryError::InvalidParameters(format!(
                    "expiration {expiry} is not after the current time {}",
                    ctx.now
                )));
            }
        }

        let owner = ctx.caller.as_str();
        let mut txn = self.begin();
        ensure_vault(&mut txn, owner, &self.config().default_vault_name, ctx.now)?;
        let grant = ViewerGrant {
            viewer: viewer.to_string(),
            granted_at: ctx.now,
            expires_at,
        };
        txn.put(Table::Grants, keys::grant(owner, viewer), &grant)?;
        touch_vault(&mut txn, owner, ctx.now)?;
        txn.commit()?;

        info!(owner, viewer, expires_at = ?expires_at, now = ctx.now, "viewer authorized");
        Ok(grant.viewer)
    }

    /// Removes `viewer`'s grant on the caller's vault. Revoking a viewer
    /// with no grant succeeds and changes nothing but the vault's
    /// last-updated time.
    pub fn revoke_viewer(&self, ctx: &CallContext, viewer: &str) -> RegistryResult<Principal> {
        logged("revoke_viewer", ctx, self.revoke_viewer_inner(ctx, viewer))
    }

    fn revoke_viewer_inner(&self, ctx: &CallContext, viewer: &str) -> RegistryResult<Principal> {
        self.config().check_id("viewer", viewer)?;
        let owner = ctx.caller.as_str();
        let mut txn = self.begin();
        ensure_vault(&mut txn, owner, &self.config().default_vault_name, ctx.now)?;
        txn.delete(Table::Grants, keys::grant(owner, viewer));
        touch_vault(&mut txn, owner, ctx.now)?;
        txn.commit()?;

        info!(owner, viewer, now = ctx.now, "viewer revoked");
        Ok(viewer.to_string())
    }

    /// Every grant the caller has issued, expired ones included.
    pub fn list_viewers(&self, ctx: &CallContext) -> RegistryResult<Vec<GrantStatus>> {
        let txn = self.begin();
        let grants: Vec<ViewerGrant> =
            txn.scan(Table::Grants, &keys::owner_prefix(&ctx.caller))?;
        Ok(grants
            .into_iter()
            .map(|grant| GrantStatus {
                active: grant.is_active(ctx.now),
                grant,
            })
            .collect())
    }
}
