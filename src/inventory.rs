use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{GalleyError, Result};
use crate::store::{DataAccess, IngredientId, Recipe};

/// Serializes stock checks and deductions against the data-access layer.
///
/// Every check and deduction runs under one lock, so two submissions can
/// never both pass a sufficiency check for stock only one of them can take.
/// Deductions reach the store as one batch, which the store applies
/// atomically.
pub struct InventoryLedger {
    store: Arc<dyn DataAccess>,
    lock: Mutex<()>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn DataAccess>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Whether current stock covers `quantity` dishes. Never mutates.
    pub async fn can_fulfill(&self, recipe: &Recipe, quantity: u32) -> Result<bool> {
        let _guard = self.lock.lock().await;
        Ok(self.shortfall(recipe, quantity)?.is_none())
    }

    /// Like [`can_fulfill`](Self::can_fulfill) but reports which ingredient
    /// falls short.
    pub async fn check(&self, recipe: &Recipe, quantity: u32) -> Result<()> {
        let _guard = self.lock.lock().await;
        match self.shortfall(recipe, quantity)? {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Deduct all ingredients for `quantity` dishes as one unit.
    ///
    /// Sufficiency is re-validated under the lock and the decrements go to
    /// the store as a single batch, so no reader sees a partial deduction.
    /// The store snapshot is written before the lock is released; a failed
    /// write is logged and does not undo the deduction.
    pub async fn deduct(&self, recipe: &Recipe, quantity: u32) -> Result<()> {
        let _guard = self.lock.lock().await;
        if let Some(err) = self.shortfall(recipe, quantity)? {
            return Err(err);
        }

        let deltas: Vec<(IngredientId, f64)> = requirements(recipe, quantity)
            .into_iter()
            .map(|(ingredient_id, amount)| (ingredient_id, -amount))
            .collect();
        if let Err(e) = self.store.apply_stock_deltas(&deltas) {
            tracing::error!(recipe = %recipe.name, quantity, error = %e, "Deduction failed");
            return Err(e);
        }
        tracing::debug!(recipe = %recipe.name, quantity, "Ingredients deducted");

        if let Err(e) = self.store.persist_snapshot() {
            tracing::warn!(recipe = %recipe.name, error = %e, "Failed to persist snapshot");
        }
        Ok(())
    }

    /// First ingredient whose stock does not cover the order, as an error.
    fn shortfall(&self, recipe: &Recipe, quantity: u32) -> Result<Option<GalleyError>> {
        for (ingredient_id, needed) in requirements(recipe, quantity) {
            let available = self
                .store
                .ingredient_stock(ingredient_id)?
                .ok_or(GalleyError::UnknownIngredient(ingredient_id))?;
            if available < needed {
                return Ok(Some(GalleyError::InsufficientInventory {
                    recipe: recipe.name.clone(),
                    ingredient: ingredient_id,
                    needed,
                    available,
                }));
            }
        }
        Ok(None)
    }
}

/// Per-ingredient totals; a recipe may list the same ingredient twice.
fn requirements(recipe: &Recipe, quantity: u32) -> BTreeMap<IngredientId, f64> {
    let mut totals = BTreeMap::new();
    for (ingredient_id, amount) in recipe.requirements(quantity) {
        *totals.entry(ingredient_id).or_insert(0.0) += amount;
    }
    totals
}
