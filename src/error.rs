use thiserror::Error;

use crate::scheduler::OrderId;
use crate::store::IngredientId;
use crate::workforce::{Role, WorkerId};

#[derive(Error, Debug)]
pub enum GalleyError {
    #[error("Recipe not found: {0}")]
    RecipeNotFound(String),

    #[error(
        "Insufficient inventory for {recipe}: ingredient {ingredient} needs {needed}, {available} available"
    )]
    InsufficientInventory {
        recipe: String,
        ingredient: IngredientId,
        needed: f64,
        available: f64,
    },

    #[error("Invalid quantity: {0} (must be between 1 and {max})", max = u32::MAX)]
    InvalidQuantity(i64),

    #[error("No worker available for role {0}")]
    NoWorkerAvailable(Role),

    #[error("Stale assignment: order {order_id} missing from worker {worker_id} backlog")]
    StaleAssignment { order_id: OrderId, worker_id: WorkerId },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order {order_id} cannot be canceled while {status}")]
    NotCancellable { order_id: OrderId, status: String },

    #[error("Worker not found: {0}")]
    WorkerNotFound(WorkerId),

    #[error("Unknown ingredient: {0}")]
    UnknownIngredient(IngredientId),

    #[error("Store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GalleyError>;
