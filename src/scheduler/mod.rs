pub mod dispatch;
pub mod estimator;
pub mod priority;
pub mod queue;
pub mod work_item;

pub use dispatch::Dispatcher;
pub use estimator::OrderEstimator;
pub use priority::PriorityScheduler;
pub use queue::WorkQueue;
pub use work_item::{OrderId, Stage, WorkItem};

#[cfg(test)]
pub(crate) fn test_item(id: OrderId, estimate: f64) -> WorkItem {
    use std::sync::Arc;

    use crate::store::Recipe;

    let recipe = Recipe {
        id: 1,
        name: "Test".to_string(),
        ingredients: Vec::new(),
        complexity: 1.0,
        price: 1.0,
    };
    WorkItem::new(id, Arc::new(recipe), 1, estimate)
}
