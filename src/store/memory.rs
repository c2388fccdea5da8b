use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{GalleyError, Result};
use crate::store::{DataAccess, IngredientId, Recipe};
use crate::workforce::{Role, WorkerProfile};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    pub stock: f64,
}

/// Everything a kitchen needs to start: stock, recipes and staff.
///
/// This is also the on-disk JSON layout of menu files and snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub workers: Vec<WorkerProfile>,
}

impl Menu {
    /// Reject menus the scheduler cannot run against.
    pub fn validate(&self) -> Result<()> {
        let mut ingredient_ids = HashSet::new();
        for ingredient in &self.ingredients {
            if !ingredient_ids.insert(ingredient.id) {
                return Err(invalid(format!("duplicate ingredient id {}", ingredient.id)));
            }
            if !(ingredient.stock >= 0.0) {
                return Err(invalid(format!(
                    "ingredient {} has negative stock",
                    ingredient.id
                )));
            }
        }

        let mut recipe_names = HashSet::new();
        for recipe in &self.recipes {
            if !recipe_names.insert(recipe.name.as_str()) {
                return Err(invalid(format!("duplicate recipe name {:?}", recipe.name)));
            }
            if !(recipe.complexity > 0.0) || !recipe.complexity.is_finite() {
                return Err(invalid(format!(
                    "recipe {:?} must have a positive complexity",
                    recipe.name
                )));
            }
            if !(recipe.price >= 0.0) {
                return Err(invalid(format!("recipe {:?} has a negative price", recipe.name)));
            }
            for line in &recipe.ingredients {
                if !ingredient_ids.contains(&line.ingredient_id) {
                    return Err(GalleyError::UnknownIngredient(line.ingredient_id));
                }
                if !(line.amount >= 0.0) {
                    return Err(invalid(format!(
                        "recipe {:?} uses a negative amount of ingredient {}",
                        recipe.name, line.ingredient_id
                    )));
                }
            }
        }

        let mut worker_ids = HashSet::new();
        for worker in &self.workers {
            if !worker_ids.insert(worker.id) {
                return Err(invalid(format!("duplicate worker id {}", worker.id)));
            }
            if !(worker.performance > 0.0) || !worker.performance.is_finite() {
                return Err(invalid(format!(
                    "worker {} must have a positive performance",
                    worker.id
                )));
            }
        }
        Ok(())
    }
}

fn invalid(msg: String) -> GalleyError {
    GalleyError::Store(format!("invalid menu: {}", msg))
}

/// In-process [`DataAccess`] backed by a [`Menu`].
///
/// When a snapshot path is set, [`persist_snapshot`](DataAccess::persist_snapshot)
/// writes the current menu there as pretty JSON. Snapshot writes are
/// serialized and each goes through its own temp file in the target
/// directory, so concurrent callers never clobber each other.
#[derive(Debug)]
pub struct MemoryStore {
    menu: RwLock<Menu>,
    snapshot_path: Option<PathBuf>,
    snapshot_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new(menu: Menu) -> Result<Self> {
        menu.validate()?;
        Ok(Self {
            menu: RwLock::new(menu),
            snapshot_path: None,
            snapshot_lock: Mutex::new(()),
        })
    }

    /// Load a menu file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let menu: Menu = serde_json::from_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            recipes = menu.recipes.len(),
            workers = menu.workers.len(),
            "Menu loaded"
        );
        Self::new(menu)
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Copy of the current state.
    pub fn menu(&self) -> Result<Menu> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Menu>> {
        self.menu
            .read()
            .map_err(|_| GalleyError::Store("menu lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Menu>> {
        self.menu
            .write()
            .map_err(|_| GalleyError::Store("menu lock poisoned".to_string()))
    }
}

impl DataAccess for MemoryStore {
    fn recipe(&self, name: &str) -> Result<Option<Recipe>> {
        Ok(self.read()?.recipes.iter().find(|r| r.name == name).cloned())
    }

    fn workers(&self, role: Role) -> Result<Vec<WorkerProfile>> {
        Ok(self
            .read()?
            .workers
            .iter()
            .filter(|w| w.role == role)
            .cloned()
            .collect())
    }

    fn ingredient_stock(&self, id: IngredientId) -> Result<Option<f64>> {
        Ok(self
            .read()?
            .ingredients
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.stock))
    }

    fn mutate_ingredient_stock(&self, id: IngredientId, delta: f64) -> Result<f64> {
        let mut menu = self.write()?;
        let ingredient = menu
            .ingredients
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(GalleyError::UnknownIngredient(id))?;
        let updated = ingredient.stock + delta;
        if updated < 0.0 {
            return Err(GalleyError::Store(format!(
                "stock of ingredient {} would drop to {}",
                id, updated
            )));
        }
        ingredient.stock = updated;
        Ok(updated)
    }

    fn apply_stock_deltas(&self, deltas: &[(IngredientId, f64)]) -> Result<()> {
        let mut menu = self.write()?;

        // Validate the whole batch before touching anything.
        let mut updated = Vec::with_capacity(deltas.len());
        for &(id, delta) in deltas {
            let index = menu
                .ingredients
                .iter()
                .position(|i| i.id == id)
                .ok_or(GalleyError::UnknownIngredient(id))?;
            let pending: f64 = updated
                .iter()
                .filter(|&&(i, _)| i == index)
                .map(|&(_, d)| d)
                .sum();
            let level = menu.ingredients[index].stock + pending + delta;
            if level < 0.0 {
                return Err(GalleyError::Store(format!(
                    "stock of ingredient {} would drop to {}",
                    id, level
                )));
            }
            updated.push((index, delta));
        }

        for (index, delta) in updated {
            menu.ingredients[index].stock += delta;
        }
        Ok(())
    }

    fn persist_snapshot(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let _guard = self
            .snapshot_lock
            .lock()
            .map_err(|_| GalleyError::Store("snapshot lock poisoned".to_string()))?;
        let json = serde_json::to_string_pretty(&*self.read()?)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        tracing::debug!(path = %path.display(), "Snapshot persisted");
        Ok(())
    }
}
