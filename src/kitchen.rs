use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::KitchenConfig;
use crate::error::{GalleyError, Result};
use crate::inventory::InventoryLedger;
use crate::ledger::{OrderEvent, OrderLedger, OrderReceipt, OrderRecord, OrderStatus};
use crate::pipeline::{ActiveUnit, ActiveWorkRegistry, PipelineExecutor};
use crate::scheduler::{Dispatcher, OrderEstimator, OrderId, PriorityScheduler};
use crate::store::DataAccess;
use crate::workforce::{Role, WorkerId, WorkerLoad, WorkforceDirectory};

/// Facade that wires all scheduler components together.
///
/// Construction loads the workforce from the data-access layer. Nothing runs
/// until [`start`](Self::start) spawns the dispatch loop and the registry
/// sweeper; orders submitted before that simply wait in the queue.
pub struct Kitchen {
    config: KitchenConfig,
    workforce: Arc<RwLock<WorkforceDirectory>>,
    scheduler: Arc<PriorityScheduler>,
    executor: Arc<PipelineExecutor>,
    registry: Arc<ActiveWorkRegistry>,
    ledger: Arc<OrderLedger>,
}

impl Kitchen {
    pub fn new(config: KitchenConfig, store: Arc<dyn DataAccess>) -> Result<Self> {
        let mut directory = WorkforceDirectory::new();
        for role in Role::ALL {
            for profile in store.workers(role)? {
                if !(profile.performance > 0.0) || !profile.performance.is_finite() {
                    return Err(GalleyError::Store(format!(
                        "worker {} has invalid performance {}",
                        profile.id, profile.performance
                    )));
                }
                directory.register(profile);
            }
        }
        if directory.is_empty() {
            tracing::warn!("Kitchen has no workers, every order will be dropped at dispatch");
        }

        let workforce = Arc::new(RwLock::new(directory));
        let estimator = OrderEstimator::new(&config);
        let ledger = Arc::new(
            OrderLedger::new(config.event_capacity).with_max_records(config.ledger_capacity),
        );
        let inventory = Arc::new(InventoryLedger::new(store.clone()));
        let registry = Arc::new(ActiveWorkRegistry::new());
        let scheduler = Arc::new(PriorityScheduler::new(
            store,
            inventory,
            workforce.clone(),
            estimator.clone(),
            ledger.clone(),
        ));
        let executor = Arc::new(PipelineExecutor::new(
            estimator,
            workforce.clone(),
            scheduler.clone(),
            registry.clone(),
            ledger.clone(),
            config.effective_slots(),
        ));

        Ok(Self {
            config,
            workforce,
            scheduler,
            executor,
            registry,
            ledger,
        })
    }

    /// Spawn the dispatch loop and the registry sweeper.
    ///
    /// Both stop when `shutdown` is cancelled. Stages already executing run
    /// to completion on their own tasks.
    pub fn start(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let dispatcher = Dispatcher::new(
            self.scheduler.clone(),
            self.workforce.clone(),
            self.executor.clone(),
            self.ledger.clone(),
        );
        let dispatch_shutdown = shutdown.clone();
        let dispatch = tokio::spawn(async move {
            dispatcher.run(dispatch_shutdown).await;
        });

        let registry = self.registry.clone();
        let interval = Duration::from_millis(self.config.sweep_interval_ms.max(1));
        let sweeper = tokio::spawn(async move {
            registry.run_sweeper(interval, shutdown).await;
        });

        vec![dispatch, sweeper]
    }

    /// Admit an order. Validation errors leave all state unchanged.
    pub async fn submit_order(&self, recipe_name: &str, quantity: i64) -> Result<OrderReceipt> {
        let item = self.scheduler.submit(recipe_name, quantity).await?;
        Ok(OrderReceipt {
            order_id: item.id,
            estimated_time: item.estimate,
            total_cost: item.total_cost(),
        })
    }

    /// Current backlog size of every worker, ordered by worker id.
    pub async fn worker_loads(&self) -> Vec<WorkerLoad> {
        self.workforce.read().await.loads()
    }

    /// Cancel an order that has not started executing its current stage.
    ///
    /// Runs under the directory write lock. The dispatcher pops and assigns
    /// under the same lock, so a live item is always found either in the
    /// queue or in the registry.
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<()> {
        let mut workforce = self.workforce.write().await;

        if self.scheduler.cancel_queued(order_id).await.is_some() {
            self.ledger.record(OrderEvent::Canceled { order_id }).await;
            tracing::info!(order_id, "Queued order canceled");
            return Ok(());
        }

        if let Some(worker_id) = self.registry.try_cancel(order_id).await? {
            if workforce.release_item(worker_id, order_id).is_none() {
                let err = GalleyError::StaleAssignment { order_id, worker_id };
                tracing::error!(error = %err, "Canceled order was not in its worker's backlog");
            }
            self.ledger.record(OrderEvent::Canceled { order_id }).await;
            tracing::info!(order_id, worker_id, "Assigned order canceled");
            return Ok(());
        }
        drop(workforce);

        match self.ledger.status(order_id).await {
            None => Err(GalleyError::OrderNotFound(order_id)),
            Some(status) => Err(GalleyError::NotCancellable {
                order_id,
                status: status.to_string(),
            }),
        }
    }

    /// Finish the oldest item in a worker's backlog right away.
    ///
    /// The item's running stage is preempted and the item moves on exactly as
    /// if the stage had completed. Returns `None` when the backlog is empty or
    /// the oldest stage is already completing on its own.
    pub async fn complete_next(&self, worker_id: WorkerId) -> Result<Option<OrderId>> {
        let mut workforce = self.workforce.write().await;
        let worker = workforce
            .worker(worker_id)
            .ok_or(GalleyError::WorkerNotFound(worker_id))?;
        let Some(order_id) = worker.backlog().next().map(|item| item.id) else {
            return Ok(None);
        };
        if !self.registry.preempt(order_id).await {
            return Ok(None);
        }
        let Some(item) = workforce.release(worker_id) else {
            return Ok(None);
        };

        tracing::info!(order_id, worker_id, stage = %item.stage, "Stage completed manually");
        self.executor.finish(item, worker_id).await;
        Ok(Some(order_id))
    }

    pub async fn order(&self, order_id: OrderId) -> Option<OrderRecord> {
        self.ledger.get(order_id).await
    }

    pub async fn orders(&self) -> Vec<OrderRecord> {
        self.ledger.all().await
    }

    /// Wait until an order is completed, canceled, dropped or faulted.
    pub async fn wait_for(&self, order_id: OrderId) -> Option<OrderStatus> {
        self.ledger.wait_terminal(order_id).await
    }

    pub async fn revenue(&self) -> f64 {
        self.ledger.revenue().await
    }

    /// Items waiting for dispatch.
    pub async fn pending(&self) -> usize {
        self.scheduler.pending().await
    }

    /// In-flight execution units.
    pub async fn active(&self) -> Vec<ActiveUnit> {
        self.registry.snapshot().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.ledger.subscribe()
    }
}
