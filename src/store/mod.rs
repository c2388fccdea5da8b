//! Data-access collaborator consumed by the scheduler core.
//!
//! The core never touches files or databases directly. Everything it needs
//! about recipes, workers and stock goes through [`DataAccess`]; the crate
//! ships [`MemoryStore`] as the default implementation.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::workforce::{Role, WorkerProfile};

pub use memory::{Ingredient, MemoryStore, Menu};

pub type IngredientId = u64;
pub type RecipeId = u64;

/// One ingredient line of a recipe: `amount` units consumed per ordered dish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub ingredient_id: IngredientId,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub ingredients: Vec<RecipeIngredient>,
    pub complexity: f64,
    pub price: f64,
}

impl Recipe {
    /// Total amount of each ingredient needed for `quantity` dishes.
    pub fn requirements(&self, quantity: u32) -> impl Iterator<Item = (IngredientId, f64)> + '_ {
        self.ingredients
            .iter()
            .map(move |line| (line.ingredient_id, line.amount * f64::from(quantity)))
    }

    pub fn cost(&self, quantity: u32) -> f64 {
        self.price * f64::from(quantity)
    }
}

/// Storage operations the scheduler depends on.
///
/// Implementations must be safe to share across tasks. Stock mutation is a
/// plain delta application; sufficiency checks and serialization of
/// concurrent deductions belong to [`InventoryLedger`](crate::inventory::InventoryLedger).
/// Readers of the store must never observe a half-applied
/// [`apply_stock_deltas`](DataAccess::apply_stock_deltas) batch.
pub trait DataAccess: Send + Sync {
    /// Look up a recipe by its unique name.
    fn recipe(&self, name: &str) -> Result<Option<Recipe>>;

    /// All workers holding `role`.
    fn workers(&self, role: Role) -> Result<Vec<WorkerProfile>>;

    /// Available stock of an ingredient, `None` if the ingredient is unknown.
    fn ingredient_stock(&self, id: IngredientId) -> Result<Option<f64>>;

    /// Apply `delta` to an ingredient's stock and return the new level.
    fn mutate_ingredient_stock(&self, id: IngredientId, delta: f64) -> Result<f64>;

    /// Apply several stock deltas as one unit: either all of them land or
    /// none do.
    ///
    /// The default goes line by line and restores applied lines when one
    /// fails, which is only atomic for callers that serialize access.
    /// Stores with their own locking should override it.
    fn apply_stock_deltas(&self, deltas: &[(IngredientId, f64)]) -> Result<()> {
        for (applied, &(id, delta)) in deltas.iter().enumerate() {
            if let Err(e) = self.mutate_ingredient_stock(id, delta) {
                for &(rollback_id, rollback_delta) in deltas[..applied].iter().rev() {
                    if let Err(rollback_err) =
                        self.mutate_ingredient_stock(rollback_id, -rollback_delta)
                    {
                        tracing::error!(
                            ingredient_id = rollback_id,
                            error = %rollback_err,
                            "Rollback failed"
                        );
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Flush current state to durable storage, if any.
    fn persist_snapshot(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burger() -> Recipe {
        Recipe {
            id: 1,
            name: "Burger".to_string(),
            ingredients: vec![
                RecipeIngredient { ingredient_id: 1, amount: 1.0 },
                RecipeIngredient { ingredient_id: 2, amount: 0.5 },
            ],
            complexity: 2.0,
            price: 8.0,
        }
    }

    #[test]
    fn requirements_scale_with_quantity() {
        let needs: Vec<_> = burger().requirements(3).collect();
        assert_eq!(needs, vec![(1, 3.0), (2, 1.5)]);
    }

    #[test]
    fn cost_is_price_times_quantity() {
        assert_eq!(burger().cost(3), 24.0);
    }

    /// Store relying on the line-by-line default batch.
    struct LineStore {
        stock: std::sync::Mutex<std::collections::BTreeMap<IngredientId, f64>>,
    }

    impl DataAccess for LineStore {
        fn recipe(&self, _name: &str) -> Result<Option<Recipe>> {
            Ok(None)
        }

        fn workers(&self, _role: Role) -> Result<Vec<WorkerProfile>> {
            Ok(Vec::new())
        }

        fn ingredient_stock(&self, id: IngredientId) -> Result<Option<f64>> {
            Ok(self.stock.lock().unwrap().get(&id).copied())
        }

        fn mutate_ingredient_stock(&self, id: IngredientId, delta: f64) -> Result<f64> {
            let mut stock = self.stock.lock().unwrap();
            let level = stock
                .get_mut(&id)
                .ok_or(crate::error::GalleyError::UnknownIngredient(id))?;
            if *level + delta < 0.0 {
                return Err(crate::error::GalleyError::Store("negative".to_string()));
            }
            *level += delta;
            Ok(*level)
        }

        fn persist_snapshot(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn default_batch_rolls_back_applied_lines() {
        let store = LineStore {
            stock: std::sync::Mutex::new([(1, 5.0), (2, 1.0)].into_iter().collect()),
        };
        assert!(store.apply_stock_deltas(&[(1, -2.0), (2, -3.0)]).is_err());
        assert_eq!(store.ingredient_stock(1).unwrap(), Some(5.0));
        assert_eq!(store.ingredient_stock(2).unwrap(), Some(1.0));

        store.apply_stock_deltas(&[(1, -2.0), (2, -1.0)]).unwrap();
        assert_eq!(store.ingredient_stock(1).unwrap(), Some(3.0));
        assert_eq!(store.ingredient_stock(2).unwrap(), Some(0.0));
    }
}
