use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{GalleyError, Result};
use crate::ledger::{OrderEvent, OrderLedger};
use crate::pipeline::{PipelineExecutor, StageTicket};
use crate::scheduler::priority::PriorityScheduler;
use crate::workforce::{WorkerId, WorkforceDirectory};

/// The single consumer of the priority queue.
///
/// Each decision takes the next item, picks the least-loaded worker able to
/// perform the item's stage and hands the stage to the executor. Preparation
/// and delivery go through the same path.
pub struct Dispatcher {
    scheduler: Arc<PriorityScheduler>,
    workforce: Arc<RwLock<WorkforceDirectory>>,
    executor: Arc<PipelineExecutor>,
    ledger: Arc<OrderLedger>,
}

impl Dispatcher {
    pub fn new(
        scheduler: Arc<PriorityScheduler>,
        workforce: Arc<RwLock<WorkforceDirectory>>,
        executor: Arc<PipelineExecutor>,
        ledger: Arc<OrderLedger>,
    ) -> Self {
        Self {
            scheduler,
            workforce,
            executor,
            ledger,
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Dispatch failures never stop the loop: an item without a worker is
    /// logged and dropped.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("Dispatch loop started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.scheduler.ready() => {}
            }
            if let Some(Err(e)) = self.dispatch_next().await {
                tracing::warn!(error = %e, "Dispatch failed");
            }
        }
        tracing::info!("Dispatch loop stopped");
    }

    /// Take the highest-priority item and hand it to a worker.
    ///
    /// Returns `None` if the queue was empty. The item is popped, assigned
    /// and registered under the directory write lock, so at no point is it
    /// missing from both the queue and the directory while that lock is free.
    pub async fn dispatch_next(&self) -> Option<Result<WorkerId>> {
        let mut workforce = self.workforce.write().await;
        let item = self.scheduler.try_next().await?;
        let order_id = item.id;
        let stage = item.stage;

        let Some(worker) = workforce.least_loaded(stage).map(|w| w.profile.clone()) else {
            self.ledger
                .record(OrderEvent::Dropped { order_id, stage })
                .await;
            drop(workforce);
            let role = stage.role();
            tracing::warn!(
                order_id,
                stage = %stage,
                role = %role,
                "No worker available, dropping item"
            );
            return Some(Err(GalleyError::NoWorkerAvailable(role)));
        };

        let ticket = StageTicket {
            order_id,
            stage,
            worker_id: worker.id,
            performance: worker.performance,
            complexity: item.recipe.complexity,
        };
        if let Err(e) = workforce.assign(worker.id, item) {
            return Some(Err(e));
        }
        self.ledger
            .record(OrderEvent::Assigned {
                order_id,
                stage,
                worker_id: worker.id,
            })
            .await;
        self.executor.launch(ticket).await;
        drop(workforce);

        tracing::info!(order_id, worker_id = worker.id, stage = %stage, "Item assigned");
        Some(Ok(worker.id))
    }
}
