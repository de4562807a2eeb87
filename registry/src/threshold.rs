//! # Threshold Monitor
//!
//! Stores comparison rules per asset and evaluates them on demand. Nothing
//! here runs in the background: a threshold only "fires" when someone calls
//! [`Registry::evaluate`].
//!
//! Evaluation enumerates thresholds through an explicit secondary index
//! `(owner, asset_id) → {threshold_id}`. The index entry is written in the
//! same batch as the threshold record itself.
//!
//! Thresholds outlive their asset. Deleting an asset leaves its thresholds
//! readable, but `evaluate` then fails with `AssetNotFound` because there is
//! no current value to compare.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::access::require_asset_view;
use crate::context::CallContext;
use crate::error::{RegistryError, RegistryResult};
use crate::ledger::load_asset;
use crate::registry::{logged, Registry};
use crate::storage::{keys, RecordStore, Table, Txn};
use crate::types::{Comparison, Threshold, ThresholdId};

/// The threshold ids indexed for `(owner, asset_id)`.
fn indexed_ids<S: RecordStore + ?Sized>(
    txn: &Txn<'_, S>,
    owner: &str,
    asset_id: &str,
) -> RegistryResult<BTreeSet<ThresholdId>> {
    Ok(txn
        .get(Table::ThresholdIndex, &keys::asset_prefix(owner, asset_id))?
        .unwrap_or_default())
}

/// Stages a new index entry set, removing the entry when it is empty.
fn write_index<S: RecordStore + ?Sized>(
    txn: &mut Txn<'_, S>,
    owner: &str,
    asset_id: &str,
    ids: &BTreeSet<ThresholdId>,
) -> RegistryResult<()> {
    let key = keys::asset_prefix(owner, asset_id);
    if ids.is_empty() {
        txn.delete(Table::ThresholdIndex, key);
    } else {
        txn.put(Table::ThresholdIndex, key, ids)?;
    }
    Ok(())
}

/// Every threshold stored for `(owner, asset_id)`, in id order.
fn load_thresholds<S: RecordStore + ?Sized>(
    txn: &Txn<'_, S>,
    owner: &str,
    asset_id: &str,
) -> RegistryResult<Vec<Threshold>> {
    let mut out = Vec::new();
    for id in indexed_ids(txn, owner, asset_id)? {
        let key = keys::threshold(owner, asset_id, &id);
        if let Some(threshold) = txn.get::<Threshold>(Table::Thresholds, &key)? {
            out.push(threshold);
        }
    }
    Ok(out)
}

impl<S: RecordStore> Registry<S> {
    /// Creates or replaces a threshold on one of the caller's assets.
    ///
    /// `comparison` accepts `gt`/`greater-than` and `lt`/`less-than`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AssetNotFound`] if the asset does not exist
    /// and [`RegistryError::InvalidParameters`] for an unknown operator or a
    /// bad id.
    pub fn set_threshold(
        &self,
        ctx: &CallContext,
        asset_id: &str,
        threshold_id: &str,
        comparison: &str,
        value: u64,
        description: Option<String>,
    ) -> RegistryResult<ThresholdId> {
        logged(
            "set_threshold",
            ctx,
            self.write_threshold(ctx, asset_id, threshold_id, comparison, value, description, true),
        )
    }

    /// Like [`set_threshold`](Self::set_threshold), but refuses to replace
    /// an existing threshold.
    ///
    /// # Errors
    ///
    /// Additionally returns [`RegistryError::ThresholdExists`] if the id is
    /// already in use for this asset.
    pub fn create_threshold(
        &self,
        ctx: &CallContext,
        asset_id: &str,
        threshold_id: &str,
        comparison: &str,
        value: u64,
        description: Option<String>,
    ) -> RegistryResult<ThresholdId> {
        logged(
            "create_threshold",
            ctx,
            self.write_threshold(ctx, asset_id, threshold_id, comparison, value, description, false),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn write_threshold(
        &self,
        ctx: &CallContext,
        asset_id: &str,
        threshold_id: &str,
        comparison: &str,
        value: u64,
        description: Option<String>,
        overwrite: bool,
    ) -> RegistryResult<ThresholdId> {
        self.config().check_id("threshold_id", threshold_id)?;
        self.config().check_text("description", description.as_deref())?;

        let owner = ctx.caller.as_str();
        let mut txn = self.begin();
        load_asset(&txn, owner, asset_id)?;
        let comparison: Comparison = comparison.parse()?;

        let key = keys::threshold(owner, asset_id, threshold_id);
        if !overwrite && txn.contains(Table::Thresholds, &key)? {
            return Err(RegistryError::ThresholdExists(threshold_id.to_string()));
        }

        let threshold = Threshold {
            threshold_id: threshold_id.to_string(),
            asset_id: asset_id.to_string(),
            comparison,
            value,
            description,
            created_at: ctx.now,
        };
        txn.put(Table::Thresholds, key, &threshold)?;

        let mut ids = indexed_ids(&txn, owner, asset_id)?;
        ids.insert(threshold.threshold_id.clone());
        write_index(&mut txn, owner, asset_id, &ids)?;
        txn.commit()?;

        info!(
            owner,
            asset_id,
            threshold_id,
            comparison = %comparison,
            value,
            now = ctx.now,
            "threshold set"
        );
        Ok(threshold.threshold_id)
    }

    /// Reads one threshold of `owner`'s asset.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotAuthorized`] if the caller may not view
    /// the asset and [`RegistryError::ThresholdNotFound`] if it is absent.
    pub fn get_threshold(
        &self,
        ctx: &CallContext,
        owner: &str,
        asset_id: &str,
        threshold_id: &str,
    ) -> RegistryResult<Threshold> {
        let txn = self.begin();
        require_asset_view(&txn, ctx, owner, asset_id)?;
        txn.get(Table::Thresholds, &keys::threshold(owner, asset_id, threshold_id))?
            .ok_or_else(|| RegistryError::ThresholdNotFound(threshold_id.to_string()))
    }

    /// Every threshold of `owner`'s asset, including those left behind by a
    /// deleted asset.
    pub fn list_thresholds(
        &self,
        ctx: &CallContext,
        owner: &str,
        asset_id: &str,
    ) -> RegistryResult<Vec<Threshold>> {
        let txn = self.begin();
        require_asset_view(&txn, ctx, owner, asset_id)?;
        load_thresholds(&txn, owner, asset_id)
    }

    /// Removes a threshold from one of the caller's assets.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AssetNotFound`] if the asset does not exist
    /// and [`RegistryError::ThresholdNotFound`] if the threshold does not.
    pub fn delete_threshold(
        &self,
        ctx: &CallContext,
        asset_id: &str,
        threshold_id: &str,
    ) -> RegistryResult<ThresholdId> {
        logged(
            "delete_threshold",
            ctx,
            self.delete_threshold_inner(ctx, asset_id, threshold_id),
        )
    }

    fn delete_threshold_inner(
        &self,
        ctx: &CallContext,
        asset_id: &str,
        threshold_id: &str,
    ) -> RegistryResult<ThresholdId> {
        let owner = ctx.caller.as_str();
        let mut txn = self.begin();
        load_asset(&txn, owner, asset_id)?;

        let key = keys::threshold(owner, asset_id, threshold_id);
        if !txn.contains(Table::Thresholds, &key)? {
            return Err(RegistryError::ThresholdNotFound(threshold_id.to_string()));
        }
        txn.delete(Table::Thresholds, key);

        let mut ids = indexed_ids(&txn, owner, asset_id)?;
        ids.remove(threshold_id);
        write_index(&mut txn, owner, asset_id, &ids)?;
        txn.commit()?;

        info!(owner, asset_id, threshold_id, now = ctx.now, "threshold deleted");
        Ok(threshold_id.to_string())
    }

    /// Compares the asset's current value against each of its thresholds
    /// and returns the ids of those that are crossed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotAuthorized`] if the caller may not view
    /// the asset and [`RegistryError::AssetNotFound`] if it does not exist.
    pub fn evaluate(
        &self,
        ctx: &CallContext,
        owner: &str,
        asset_id: &str,
    ) -> RegistryResult<BTreeSet<ThresholdId>> {
        let txn = self.begin();
        require_asset_view(&txn, ctx, owner, asset_id)?;
        let asset = load_asset(&txn, owner, asset_id)?;

        let thresholds = load_thresholds(&txn, owner, asset_id)?;
        let triggered: BTreeSet<ThresholdId> = thresholds
            .iter()
            .filter(|t| t.is_triggered(asset.current_value))
            .map(|t| t.threshold_id.clone())
            .collect();

        debug!(
            owner,
            asset_id,
            current_value = asset.current_value,
            checked = thresholds.len(),
            triggered = triggered.len(),
            "thresholds evaluated"
        );
        Ok(triggered)
    }
}
