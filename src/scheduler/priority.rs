use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify, RwLock};

use crate::error::{GalleyError, Result};
use crate::inventory::InventoryLedger;
use crate::ledger::{OrderEvent, OrderLedger};
use crate::scheduler::estimator::OrderEstimator;
use crate::scheduler::queue::WorkQueue;
use crate::scheduler::work_item::{OrderId, Stage, WorkItem};
use crate::store::DataAccess;
use crate::workforce::WorkforceDirectory;

/// Admission and the shared priority queue.
///
/// Producers call [`submit`](Self::submit); stage transitions come back in
/// through [`enqueue`](Self::enqueue). A single consumer waits with
/// [`ready`](Self::ready) and takes items with [`try_next`](Self::try_next).
///
/// An item's `Queued` status is recorded under the queue lock, so the
/// ledger never reports an order as queued unless the queue holds it.
pub struct PriorityScheduler {
    store: Arc<dyn DataAccess>,
    inventory: Arc<InventoryLedger>,
    workforce: Arc<RwLock<WorkforceDirectory>>,
    estimator: OrderEstimator,
    ledger: Arc<OrderLedger>,
    queue: Mutex<WorkQueue>,
    ready: Notify,
    next_id: AtomicU64,
}

impl PriorityScheduler {
    pub fn new(
        store: Arc<dyn DataAccess>,
        inventory: Arc<InventoryLedger>,
        workforce: Arc<RwLock<WorkforceDirectory>>,
        estimator: OrderEstimator,
        ledger: Arc<OrderLedger>,
    ) -> Self {
        Self {
            store,
            inventory,
            workforce,
            estimator,
            ledger,
            queue: Mutex::new(WorkQueue::new()),
            ready: Notify::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Validate, estimate, deduct and enqueue a new order.
    ///
    /// All validation failures leave stock and queue untouched. The queue
    /// lock is only taken once the item exists.
    pub async fn submit(&self, recipe_name: &str, quantity: i64) -> Result<WorkItem> {
        let quantity = match u32::try_from(quantity) {
            Ok(q) if q > 0 => q,
            _ => return Err(GalleyError::InvalidQuantity(quantity)),
        };
        let recipe = self
            .store
            .recipe(recipe_name)?
            .ok_or_else(|| GalleyError::RecipeNotFound(recipe_name.to_string()))?;
        self.inventory.check(&recipe, quantity).await?;

        let estimate = {
            let workforce = self.workforce.read().await;
            let chef = workforce
                .least_loaded(Stage::Preparation)
                .map(|w| &w.profile);
            self.estimator.estimate(&recipe, quantity, chef)
        };

        // Re-validates under the inventory lock; a concurrent submission may
        // have taken the stock since the check above.
        self.inventory.deduct(&recipe, quantity).await?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let item = WorkItem::new(id, Arc::new(recipe), quantity, estimate);
        {
            let mut queue = self.queue.lock().await;
            self.ledger.admit(&item).await;
            self.push(&mut queue, item.clone()).await;
        }
        tracing::info!(
            order_id = id,
            recipe = %item.recipe.name,
            quantity,
            estimate,
            "Order admitted"
        );
        self.ready.notify_one();
        Ok(item)
    }

    /// Put an item into the queue at its current stage.
    pub async fn enqueue(&self, item: WorkItem) {
        {
            let mut queue = self.queue.lock().await;
            self.push(&mut queue, item).await;
        }
        self.ready.notify_one();
    }

    async fn push(&self, queue: &mut WorkQueue, item: WorkItem) {
        let order_id = item.id;
        let stage = item.stage;
        self.ledger
            .record(OrderEvent::Queued { order_id, stage })
            .await;
        queue.push(item);
        tracing::debug!(order_id, stage = %stage, "Item queued");
    }

    /// Wait until the queue holds at least one item.
    pub async fn ready(&self) {
        loop {
            if !self.queue.lock().await.is_empty() {
                return;
            }
            self.ready.notified().await;
        }
    }

    /// Remove the highest-priority item, if any.
    pub async fn try_next(&self) -> Option<WorkItem> {
        self.queue.lock().await.pop()
    }

    /// Take a queued item out before it is dispatched.
    pub async fn cancel_queued(&self, order_id: OrderId) -> Option<WorkItem> {
        self.queue.lock().await.remove(order_id)
    }

    /// Number of items waiting for dispatch.
    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }
}
