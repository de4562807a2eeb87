//! # Asset Ledger
//!
//! Create, update, and delete assets in the caller's own vault, plus the
//! visibility-checked reads. Mutations never accept an owner: the owner is
//! always `ctx.caller`, so a caller cannot touch anyone else's records no
//! matter what it passes in.
//!
//! Value-setting operations (`register_asset`, `update_value`) append one
//! valuation event per call, including calls that leave the value unchanged.
//! Detail updates and deletions never touch the history.

use tracing::{debug, info};

use crate::access::{is_authorized, require_asset_view};
use crate::context::CallContext;
use crate::error::{RegistryError, RegistryResult};
use crate::history;
use crate::registry::{logged, Registry};
use crate::storage::{keys, RecordStore, Table, Txn};
use crate::types::{Asset, AssetDetails, AssetId};
use crate::vault::{ensure_vault, touch_vault};

/// Loads one of `owner`'s assets or fails with `AssetNotFound`.
pub(crate) fn load_asset<S: RecordStore + ?Sized>(
    txn: &Txn<'_, S>,
    owner: &str,
    asset_id: &str,
) -> RegistryResult<Asset> {
    txn.get(Table::Assets, &keys::asset(owner, asset_id))?
        .ok_or_else(|| RegistryError::AssetNotFound(asset_id.to_string()))
}

impl<S: RecordStore> Registry<S> {
    fn check_details(&self, details: &AssetDetails) -> RegistryResult<()> {
        let cfg = self.config();
        cfg.check_name("name", &details.name)?;
        cfg.check_name("category", &details.category)?;
        cfg.check_text("metadata", details.metadata.as_deref())
    }

    /// Registers a new asset in the caller's vault and records its opening
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidParameters`] for an empty or oversized
    /// id or field, and [`RegistryError::AssetExists`] if the caller already
    /// holds an asset with this id. The existing record is left untouched.
    pub fn register_asset(
        &self,
        ctx: &CallContext,
        asset_id: &str,
        details: AssetDetails,
        current_value: u64,
    ) -> RegistryResult<AssetId> {
        logged(
            "register_asset",
            ctx,
            self.register_asset_inner(ctx, asset_id, details, current_value),
        )
    }

    fn register_asset_inner(
        &self,
        ctx: &CallContext,
        asset_id: &str,
        details: AssetDetails,
        current_value: u64,
    ) -> RegistryResult<AssetId> {
        self.config().check_id("asset_id", asset_id)?;
        self.check_details(&details)?;

        let owner = ctx.caller.as_str();
        let mut txn = self.begin();
        ensure_vault(&mut txn, owner, &self.config().default_vault_name, ctx.now)?;

        let key = keys::asset(owner, asset_id);
        if txn.contains(Table::Assets, &key)? {
            return Err(RegistryError::AssetExists(asset_id.to_string()));
        }

        let asset = Asset::new(asset_id.to_string(), details, current_value, ctx.now);
        txn.put(Table::Assets, key, &asset)?;
        history::record(&mut txn, owner, asset_id, current_value, ctx.now)?;
        touch_vault(&mut txn, owner, ctx.now)?;
        txn.commit()?;

        info!(owner, asset_id, value = current_value, now = ctx.now, "asset registered");
        Ok(asset.asset_id)
    }

    /// Sets the current value of one of the caller's assets and appends a
    /// valuation event. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AssetNotFound`] if the asset does not exist.
    pub fn update_value(
        &self,
        ctx: &CallContext,
        asset_id: &str,
        new_value: u64,
    ) -> RegistryResult<u64> {
        logged(
            "update_value",
            ctx,
            self.update_value_inner(ctx, asset_id, new_value),
        )
    }

    fn update_value_inner(
        &self,
        ctx: &CallContext,
        asset_id: &str,
        new_value: u64,
    ) -> RegistryResult<u64> {
        let owner = ctx.caller.as_str();
        let mut txn = self.begin();
        let mut asset = load_asset(&txn, owner, asset_id)?;
        let previous = asset.current_value;

        asset.current_value = new_value;
        asset.last_updated = ctx.now;
        txn.put(Table::Assets, keys::asset(owner, asset_id), &asset)?;
        history::record(&mut txn, owner, asset_id, new_value, ctx.now)?;
        touch_vault(&mut txn, owner, ctx.now)?;
        txn.commit()?;

        info!(owner, asset_id, previous, value = new_value, now = ctx.now, "asset value updated");
        Ok(new_value)
    }

    /// Overwrites every descriptive field of one of the caller's assets.
    /// The current value is kept and no valuation event is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AssetNotFound`] if the asset does not exist.
    pub fn update_details(
        &self,
        ctx: &CallContext,
        asset_id: &str,
        details: AssetDetails,
    ) -> RegistryResult<AssetId> {
        logged(
            "update_details",
            ctx,
            self.update_details_inner(ctx, asset_id, details),
        )
    }

    fn update_details_inner(
        &self,
        ctx: &CallContext,
        asset_id: &str,
        details: AssetDetails,
    ) -> RegistryResult<AssetId> {
        self.check_details(&details)?;
        let owner = ctx.caller.as_str();
        let mut txn = self.begin();
        let mut asset = load_asset(&txn, owner, asset_id)?;

        asset.apply_details(details, ctx.now);
        txn.put(Table::Assets, keys::asset(owner, asset_id), &asset)?;
        touch_vault(&mut txn, owner, ctx.now)?;
        txn.commit()?;

        info!(owner, asset_id, now = ctx.now, "asset details updated");
        Ok(asset.asset_id)
    }

    /// Deletes one of the caller's assets.
    ///
    /// Only the asset record goes away. Its valuation history and any
    /// thresholds stay in the store and remain readable.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AssetNotFound`] if the asset does not exist.
    pub fn delete_asset(&self, ctx: &CallContext, asset_id: &str) -> RegistryResult<AssetId> {
        logged("delete_asset", ctx, self.delete_asset_inner(ctx, asset_id))
    }

    fn delete_asset_inner(&self, ctx: &CallContext, asset_id: &str) -> RegistryResult<AssetId> {
        let owner = ctx.caller.as_str();
        let mut txn = self.begin();
        let asset = load_asset(&txn, owner, asset_id)?;

        txn.delete(Table::Assets, keys::asset(owner, asset_id));
        touch_vault(&mut txn, owner, ctx.now)?;
        txn.commit()?;

        info!(owner, asset_id, now = ctx.now, "asset deleted");
        Ok(asset.asset_id)
    }

    /// Reads one asset.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotAuthorized`] if the caller may not view
    /// it, and [`RegistryError::AssetNotFound`] if a permitted caller asks
    /// for an asset that does not exist.
    pub fn get_asset(&self, ctx: &CallContext, owner: &str, asset_id: &str) -> RegistryResult<Asset> {
        let txn = self.begin();
        require_asset_view(&txn, ctx, owner, asset_id)?;
        load_asset(&txn, owner, asset_id)
    }

    /// The assets of `owner` the caller may see, in id order.
    ///
    /// The owner and current grantees see everything; anyone else sees only
    /// the public assets.
    pub fn list_assets(&self, ctx: &CallContext, owner: &str) -> RegistryResult<Vec<Asset>> {
        let txn = self.begin();
        let full_view = is_authorized(&txn, owner, &ctx.caller, ctx.now)?;
        let assets: Vec<Asset> = txn.scan(Table::Assets, &keys::owner_prefix(owner))?;
        let visible: Vec<Asset> = assets
            .into_iter()
            .filter(|a| full_view || a.public_view)
            .collect();
        debug!(owner, caller = %ctx.caller, full_view, count = visible.len(), "assets listed");
        Ok(visible)
    }
}
