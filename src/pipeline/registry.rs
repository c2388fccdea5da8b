use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{GalleyError, Result};
use crate::scheduler::{OrderId, Stage};
use crate::workforce::WorkerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    /// In a backlog, waiting for an execution slot.
    Assigned,
    /// Simulated work in progress.
    Executing,
}

#[derive(Debug)]
struct ExecutionUnit {
    worker_id: WorkerId,
    stage: Stage,
    state: UnitState,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    registered_at: Instant,
}

/// Read-only view of an in-flight unit.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveUnit {
    pub order_id: OrderId,
    pub worker_id: WorkerId,
    pub stage: Stage,
    pub state: UnitState,
    pub age_ms: u64,
}

/// In-flight execution units keyed by order.
#[derive(Debug, Default)]
pub struct ActiveWorkRegistry {
    units: Mutex<HashMap<OrderId, ExecutionUnit>>,
}

impl ActiveWorkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        order_id: OrderId,
        worker_id: WorkerId,
        stage: Stage,
        cancel: CancellationToken,
    ) {
        let unit = ExecutionUnit {
            worker_id,
            stage,
            state: UnitState::Assigned,
            cancel,
            handle: None,
            registered_at: Instant::now(),
        };
        if self.units.lock().await.insert(order_id, unit).is_some() {
            tracing::warn!(order_id, "Replaced an existing execution unit");
        }
    }

    /// Attach the task handle to a registered unit of the same stage.
    pub async fn attach(&self, order_id: OrderId, stage: Stage, handle: JoinHandle<()>) {
        if let Some(unit) = self.units.lock().await.get_mut(&order_id) {
            if unit.stage == stage && unit.handle.is_none() {
                unit.handle = Some(handle);
            }
        }
    }

    /// Mark a unit as executing. Returns false if it was canceled or removed
    /// in the meantime.
    pub async fn begin(&self, order_id: OrderId) -> bool {
        match self.units.lock().await.get_mut(&order_id) {
            Some(unit) if unit.state == UnitState::Assigned && !unit.cancel.is_cancelled() => {
                unit.state = UnitState::Executing;
                true
            }
            _ => false,
        }
    }

    /// Cancel a unit that has not started executing.
    ///
    /// Returns the worker holding the item, `None` if no unit exists, and
    /// `NotCancellable` once execution has begun.
    pub async fn try_cancel(&self, order_id: OrderId) -> Result<Option<WorkerId>> {
        let mut units = self.units.lock().await;
        match units.get(&order_id).map(|u| u.state) {
            None => Ok(None),
            Some(UnitState::Executing) => Err(GalleyError::NotCancellable {
                order_id,
                status: "executing".to_string(),
            }),
            Some(UnitState::Assigned) => {
                let unit = units.remove(&order_id);
                Ok(unit.map(|u| {
                    u.cancel.cancel();
                    u.worker_id
                }))
            }
        }
    }

    /// Remove a unit in any state and signal its task to stop.
    pub async fn preempt(&self, order_id: OrderId) -> bool {
        match self.units.lock().await.remove(&order_id) {
            Some(unit) => {
                unit.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop a unit's bookkeeping. Returns false if it was already gone.
    pub async fn remove(&self, order_id: OrderId) -> bool {
        self.units.lock().await.remove(&order_id).is_some()
    }

    /// Reclaim units whose task has finished without deregistering.
    pub async fn sweep(&self) -> usize {
        let mut units = self.units.lock().await;
        let before = units.len();
        units.retain(|order_id, unit| {
            let finished = unit.handle.as_ref().is_some_and(|h| h.is_finished());
            if finished {
                tracing::warn!(
                    order_id = *order_id,
                    worker_id = unit.worker_id,
                    stage = %unit.stage,
                    "Reclaiming finished execution unit"
                );
            }
            !finished
        });
        before - units.len()
    }

    pub async fn snapshot(&self) -> Vec<ActiveUnit> {
        let mut units: Vec<ActiveUnit> = self
            .units
            .lock()
            .await
            .iter()
            .map(|(&order_id, unit)| ActiveUnit {
                order_id,
                worker_id: unit.worker_id,
                stage: unit.stage,
                state: unit.state,
                age_ms: unit.registered_at.elapsed().as_millis() as u64,
            })
            .collect();
        units.sort_by_key(|u| u.order_id);
        units
    }

    pub async fn is_empty(&self) -> bool {
        self.units.lock().await.is_empty()
    }

    /// Periodic sweep. Advisory only; scheduling never depends on it.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let reclaimed = self.sweep().await;
                    if reclaimed > 0 {
                        tracing::debug!(reclaimed, "Registry sweep");
                    }
                }
            }
        }
    }
}
