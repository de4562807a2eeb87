//! # Categories
//!
//! Named labels an owner can keep in their vault. Categories are
//! independent records: an asset's `category` field is a free string and
//! is never checked against them, and deleting a category leaves assets
//! that mention it untouched.

use tracing::info;

use crate::access::require_vault_view;
use crate::context::CallContext;
use crate::error::{RegistryError, RegistryResult};
use crate::registry::{logged, Registry};
use crate::storage::{keys, RecordStore, Table};
use crate::types::{Category, CategoryId};
use crate::vault::{ensure_vault, touch_vault};

impl<S: RecordStore> Registry<S> {
    /// Creates or replaces a category in the caller's vault.
    pub fn set_category(
        &self,
        ctx: &CallContext,
        category_id: &str,
        name: &str,
        description: Option<String>,
    ) -> RegistryResult<CategoryId> {
        logged(
            "set_category",
            ctx,
            self.set_category_inner(ctx, category_id, name, description),
        )
    }

    fn set_category_inner(
        &self,
        ctx: &CallContext,
        category_id: &str,
        name: &str,
        description: Option<String>,
    ) -> RegistryResult<CategoryId> {
        let cfg = self.config();
        cfg.check_id("category_id", category_id)?;
        cfg.check_name("name", name)?;
        cfg.check_text("description", description.as_deref())?;

        let owner = ctx.caller.as_str();
        let mut txn = self.begin();
        ensure_vault(&mut txn, owner, &cfg.default_vault_name, ctx.now)?;
        let category = Category {
            category_id: category_id.to_string(),
            name: name.to_string(),
            description,
        };
        txn.put(Table::Categories, keys::category(owner, category_id), &category)?;
        touch_vault(&mut txn, owner, ctx.now)?;
        txn.commit()?;

        info!(owner, category_id, now = ctx.now, "category set");
        Ok(category.category_id)
    }

    /// Reads one of `owner`'s categories.
    pub fn get_category(
        &self,
        ctx: &CallContext,
        owner: &str,
        category_id: &str,
    ) -> RegistryResult<Category> {
        let txn = self.begin();
        require_vault_view(&txn, ctx, owner)?;
        txn.get(Table::Categories, &keys::category(owner, category_id))?
            .ok_or_else(|| RegistryError::CategoryNotFound(category_id.to_string()))
    }

    /// Every category of `owner`, in id order.
    pub fn list_categories(&self, ctx: &CallContext, owner: &str) -> RegistryResult<Vec<Category>> {
        let txn = self.begin();
        require_vault_view(&txn, ctx, owner)?;
        Ok(txn.scan(Table::Categories, &keys::owner_prefix(owner))?)
    }

    /// Removes a category from the caller's vault.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CategoryNotFound`] if it does not exist.
    pub fn delete_category(&self, ctx: &CallContext, category_id: &str) -> RegistryResult<CategoryId> {
        logged("delete_category", ctx, self.delete_category_inner(ctx, category_id))
    }

    fn delete_category_inner(
        &self,
        ctx: &CallContext,
        category_id: &str,
    ) -> RegistryResult<CategoryId> {
        let owner = ctx.caller.as_str();
        let mut txn = self.begin();
        let key = keys::category(owner, category_id);
        if !txn.contains(Table::Categories, &key)? {
            return Err(RegistryError::CategoryNotFound(category_id.to_string()));
        }
        txn.delete(Table::Categories, key);
        touch_vault(&mut txn, owner, ctx.now)?;
        txn.commit()?;

        info!(owner, category_id, now = ctx.now, "category deleted");
        Ok(category_id.to_string())
    }
}
