//! Caller-visible order status.
//!
//! Every lifecycle step of an order is recorded here as an [`OrderEvent`].
//! The ledger keeps the latest [`OrderStatus`] per order and rebroadcasts
//! each applied event to subscribers. Terminal states are sticky: once an
//! order is completed, canceled, dropped or faulted, later events for it are
//! ignored, which is what makes retirement happen exactly once.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::config::DEFAULT_LEDGER_CAPACITY;
use crate::scheduler::{OrderId, Stage, WorkItem};
use crate::workforce::WorkerId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrderStatus {
    Queued { stage: Stage },
    Assigned { stage: Stage, worker_id: WorkerId },
    Executing { stage: Stage, worker_id: WorkerId },
    Completed,
    Canceled,
    /// No worker could take the stage; the caller must resubmit.
    Dropped { stage: Stage },
    /// Retired after an internal consistency fault.
    Faulted { stage: Stage },
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Canceled
                | OrderStatus::Dropped { .. }
                | OrderStatus::Faulted { .. }
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Queued { stage } => write!(f, "queued ({})", stage),
            OrderStatus::Assigned { stage, worker_id } => {
                write!(f, "assigned ({} by worker {})", stage, worker_id)
            }
            OrderStatus::Executing { stage, worker_id } => {
                write!(f, "executing ({} by worker {})", stage, worker_id)
            }
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Canceled => write!(f, "canceled"),
            OrderStatus::Dropped { stage } => write!(f, "dropped ({})", stage),
            OrderStatus::Faulted { stage } => write!(f, "faulted ({})", stage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Queued { order_id: OrderId, stage: Stage },
    Assigned { order_id: OrderId, stage: Stage, worker_id: WorkerId },
    Executing { order_id: OrderId, stage: Stage, worker_id: WorkerId },
    StageCompleted { order_id: OrderId, stage: Stage, worker_id: WorkerId },
    Completed { order_id: OrderId, worker_id: WorkerId },
    Canceled { order_id: OrderId },
    Dropped { order_id: OrderId, stage: Stage },
    Faulted { order_id: OrderId, stage: Stage },
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match *self {
            OrderEvent::Queued { order_id, .. }
            | OrderEvent::Assigned { order_id, .. }
            | OrderEvent::Executing { order_id, .. }
            | OrderEvent::StageCompleted { order_id, .. }
            | OrderEvent::Completed { order_id, .. }
            | OrderEvent::Canceled { order_id }
            | OrderEvent::Dropped { order_id, .. }
            | OrderEvent::Faulted { order_id, .. } => order_id,
        }
    }

    /// Status this event moves the order into, `None` for informational events.
    fn status(&self) -> Option<OrderStatus> {
        match *self {
            OrderEvent::Queued { stage, .. } => Some(OrderStatus::Queued { stage }),
            OrderEvent::Assigned {
                stage, worker_id, ..
            } => Some(OrderStatus::Assigned { stage, worker_id }),
            OrderEvent::Executing {
                stage, worker_id, ..
            } => Some(OrderStatus::Executing { stage, worker_id }),
            OrderEvent::StageCompleted { .. } => None,
            OrderEvent::Completed { .. } => Some(OrderStatus::Completed),
            OrderEvent::Canceled { .. } => Some(OrderStatus::Canceled),
            OrderEvent::Dropped { stage, .. } => Some(OrderStatus::Dropped { stage }),
            OrderEvent::Faulted { stage, .. } => Some(OrderStatus::Faulted { stage }),
        }
    }
}

/// What a caller gets back for an admitted order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub estimated_time: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub recipe: String,
    pub quantity: u32,
    pub estimated_time: f64,
    pub total_cost: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct LedgerState {
    records: BTreeMap<OrderId, OrderRecord>,
    /// Running total, so evicting completed records keeps the figure.
    revenue: f64,
}

impl LedgerState {
    /// Drop the oldest finished records until the ledger fits `max`.
    fn evict(&mut self, max: usize) -> usize {
        let excess = self.records.len().saturating_sub(max);
        if excess == 0 {
            return 0;
        }
        let victims: Vec<OrderId> = self
            .records
            .values()
            .filter(|r| r.status.is_terminal())
            .map(|r| r.order_id)
            .take(excess)
            .collect();
        for order_id in &victims {
            self.records.remove(order_id);
        }
        victims.len()
    }
}

pub struct OrderLedger {
    state: RwLock<LedgerState>,
    events: broadcast::Sender<OrderEvent>,
    max_records: usize,
}

impl OrderLedger {
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            state: RwLock::new(LedgerState::default()),
            events,
            max_records: DEFAULT_LEDGER_CAPACITY,
        }
    }

    /// Cap the number of retained records. Finished orders beyond the cap
    /// are evicted oldest first; unknown ids then read as `None`.
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records.max(1);
        self
    }

    /// Open a record for a freshly admitted item.
    pub async fn admit(&self, item: &WorkItem) -> OrderReceipt {
        let record = OrderRecord {
            order_id: item.id,
            recipe: item.recipe.name.clone(),
            quantity: item.quantity,
            estimated_time: item.estimate,
            total_cost: item.total_cost(),
            status: OrderStatus::Queued { stage: item.stage },
            created_at: item.created_at,
            finished_at: None,
        };
        let receipt = OrderReceipt {
            order_id: record.order_id,
            estimated_time: record.estimated_time,
            total_cost: record.total_cost,
        };
        self.state.write().await.records.insert(item.id, record);
        receipt
    }

    /// Apply an event. Returns false if the order is unknown or already
    /// terminal, in which case nothing is broadcast.
    pub async fn record(&self, event: OrderEvent) -> bool {
        {
            let mut state = self.state.write().await;
            let Some(record) = state.records.get_mut(&event.order_id()) else {
                tracing::warn!(order_id = event.order_id(), ?event, "Event for unknown order");
                return false;
            };
            if record.status.is_terminal() {
                tracing::debug!(
                    order_id = record.order_id,
                    status = %record.status,
                    ?event,
                    "Ignoring event for finished order"
                );
                return false;
            }
            if let Some(status) = event.status() {
                record.status = status;
                if status.is_terminal() {
                    record.finished_at = Some(Utc::now());
                    if status == OrderStatus::Completed {
                        let earned = record.total_cost;
                        state.revenue += earned;
                    }
                    let evicted = state.evict(self.max_records);
                    if evicted > 0 {
                        tracing::debug!(evicted, "Evicted finished order records");
                    }
                }
            }
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
        true
    }

    pub async fn get(&self, order_id: OrderId) -> Option<OrderRecord> {
        self.state.read().await.records.get(&order_id).cloned()
    }

    pub async fn status(&self, order_id: OrderId) -> Option<OrderStatus> {
        self.state
            .read()
            .await
            .records
            .get(&order_id)
            .map(|r| r.status)
    }

    /// All retained records ordered by id.
    pub async fn all(&self) -> Vec<OrderRecord> {
        self.state.read().await.records.values().cloned().collect()
    }

    /// Sum of `total_cost` over every completed order, evicted ones included.
    pub async fn revenue(&self) -> f64 {
        self.state.read().await.revenue
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.events.subscribe()
    }

    /// Wait until the order reaches a terminal status and return it.
    /// Returns `None` for unknown orders.
    pub async fn wait_terminal(&self, order_id: OrderId) -> Option<OrderStatus> {
        let mut rx = self.subscribe();
        loop {
            let status = self.status(order_id).await?;
            if status.is_terminal() {
                return Some(status);
            }
            loop {
                match rx.recv().await {
                    Ok(event) if event.order_id() == order_id => break,
                    Ok(_) => continue,
                    // Missed events: fall back to the stored status.
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => return self.status(order_id).await,
                }
            }
        }
    }
}
