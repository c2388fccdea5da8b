use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Recipe;
use crate::workforce::Role;

/// Order identity. Assigned monotonically and never reused.
pub type OrderId = u64;

/// Pipeline phase a work item is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Preparation,
    Delivery,
}

impl Stage {
    /// Role whose workers run this stage.
    pub fn role(self) -> Role {
        match self {
            Stage::Preparation => Role::Chef,
            Stage::Delivery => Role::Waiter,
        }
    }

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Preparation => Some(Stage::Delivery),
            Stage::Delivery => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Preparation => write!(f, "preparation"),
            Stage::Delivery => write!(f, "delivery"),
        }
    }
}

/// One admitted order moving through the pipeline.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: OrderId,
    pub recipe: Arc<Recipe>,
    pub quantity: u32,
    /// Estimated completion time in time units. Fixed at admission and used
    /// as the priority key for every stage.
    pub estimate: f64,
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn new(id: OrderId, recipe: Arc<Recipe>, quantity: u32, estimate: f64) -> Self {
        Self {
            id,
            recipe,
            quantity,
            estimate,
            stage: Stage::Preparation,
            created_at: Utc::now(),
        }
    }

    /// Move to the next stage. Returns false once the item is past delivery.
    pub fn advance(&mut self) -> bool {
        match self.stage.next() {
            Some(next) => {
                self.stage = next;
                true
            }
            None => false,
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.recipe.cost(self.quantity)
    }
}
