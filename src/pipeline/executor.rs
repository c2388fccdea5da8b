use std::sync::Arc;

use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{GalleyError, Result};
use crate::ledger::{OrderEvent, OrderLedger};
use crate::pipeline::registry::ActiveWorkRegistry;
use crate::scheduler::{OrderEstimator, OrderId, PriorityScheduler, Stage, WorkItem};
use crate::workforce::{WorkerId, WorkforceDirectory};

/// Everything a stage task needs, copied out of the item at dispatch time.
/// The item itself stays in the worker's backlog.
#[derive(Debug, Clone, Copy)]
pub struct StageTicket {
    pub order_id: OrderId,
    pub stage: Stage,
    pub worker_id: WorkerId,
    pub performance: f64,
    pub complexity: f64,
}

/// Runs stages as independent tasks, bounded by a fixed number of slots.
pub struct PipelineExecutor {
    estimator: OrderEstimator,
    workforce: Arc<RwLock<WorkforceDirectory>>,
    scheduler: Arc<PriorityScheduler>,
    registry: Arc<ActiveWorkRegistry>,
    ledger: Arc<OrderLedger>,
    slots: Arc<Semaphore>,
}

impl PipelineExecutor {
    pub fn new(
        estimator: OrderEstimator,
        workforce: Arc<RwLock<WorkforceDirectory>>,
        scheduler: Arc<PriorityScheduler>,
        registry: Arc<ActiveWorkRegistry>,
        ledger: Arc<OrderLedger>,
        execution_slots: usize,
    ) -> Self {
        Self {
            estimator,
            workforce,
            scheduler,
            registry,
            ledger,
            slots: Arc::new(Semaphore::new(execution_slots.max(1))),
        }
    }

    /// Register an execution unit for the ticket and spawn its task.
    pub async fn launch(self: &Arc<Self>, ticket: StageTicket) {
        let cancel = CancellationToken::new();
        self.registry
            .register(ticket.order_id, ticket.worker_id, ticket.stage, cancel.clone())
            .await;

        let executor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            executor.run_stage(ticket, cancel).await;
        });
        self.registry
            .attach(ticket.order_id, ticket.stage, handle)
            .await;
    }

    async fn run_stage(&self, ticket: StageTicket, cancel: CancellationToken) {
        let StageTicket {
            order_id,
            stage,
            worker_id,
            ..
        } = ticket;

        let permit = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(order_id, stage = %stage, "Stage canceled before start");
                return;
            }
            permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(order_id, error = %e, "Execution slots closed");
                    self.registry.remove(order_id).await;
                    return;
                }
            },
        };

        if !self.registry.begin(order_id).await {
            tracing::debug!(order_id, stage = %stage, "Stage canceled before start");
            return;
        }
        self.ledger
            .record(OrderEvent::Executing {
                order_id,
                stage,
                worker_id,
            })
            .await;

        let duration = self
            .estimator
            .stage_duration(ticket.complexity, ticket.performance);
        tracing::info!(
            order_id,
            worker_id,
            stage = %stage,
            duration_ms = duration.as_millis() as u64,
            "Stage started"
        );

        // Simulated work: no lock is held across this await.
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = cancel.cancelled() => {
                tracing::debug!(order_id, stage = %stage, "Stage preempted");
                return;
            }
        }
        drop(permit);

        // Already logged and retired inside.
        let _ = self.complete_stage(ticket).await;
    }

    /// Take the finished item out of the worker's backlog and move it on.
    ///
    /// If the unit was preempted meanwhile, nothing happens. If the backlog
    /// no longer holds the item, the order is retired as faulted and
    /// `StaleAssignment` is returned.
    pub async fn complete_stage(&self, ticket: StageTicket) -> Result<()> {
        let StageTicket {
            order_id,
            stage,
            worker_id,
            ..
        } = ticket;

        if !self.registry.remove(order_id).await {
            tracing::debug!(order_id, stage = %stage, "Execution unit already released");
            return Ok(());
        }

        // Held until the item is queued again or retired.
        let mut workforce = self.workforce.write().await;
        match workforce.release_item(worker_id, order_id) {
            Some(item) => {
                self.finish(item, worker_id).await;
                Ok(())
            }
            None => {
                let err = GalleyError::StaleAssignment { order_id, worker_id };
                tracing::error!(
                    order_id,
                    worker_id,
                    stage = %stage,
                    error = %err,
                    "Backlog does not hold the finished item, retiring it"
                );
                self.ledger
                    .record(OrderEvent::Faulted { order_id, stage })
                    .await;
                Err(err)
            }
        }
    }

    /// Post a released item to its next stage, or retire it after delivery.
    ///
    /// Callers hold the directory write lock so that cancellation never
    /// sees the item between the backlog and the queue.
    pub async fn finish(&self, mut item: WorkItem, worker_id: WorkerId) {
        let order_id = item.id;
        let stage = item.stage;
        self.ledger
            .record(OrderEvent::StageCompleted {
                order_id,
                stage,
                worker_id,
            })
            .await;

        if item.advance() {
            tracing::info!(order_id, worker_id, stage = %stage, next = %item.stage, "Stage completed");
            self.scheduler.enqueue(item).await;
        } else {
            tracing::info!(order_id, worker_id, "Order completed");
            self.ledger
                .record(OrderEvent::Completed {
                    order_id,
                    worker_id,
                })
                .await;
        }
    }
}
