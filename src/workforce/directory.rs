use std::collections::{BTreeMap, VecDeque};

use crate::error::{GalleyError, Result};
use crate::scheduler::{OrderId, Stage, WorkItem};
use crate::workforce::{Role, WorkerId, WorkerLoad, WorkerProfile};

/// A worker and the items currently assigned to it, oldest first.
#[derive(Debug, Clone)]
pub struct Worker {
    pub profile: WorkerProfile,
    backlog: VecDeque<WorkItem>,
}

impl Worker {
    pub fn new(profile: WorkerProfile) -> Self {
        Self {
            profile,
            backlog: VecDeque::new(),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.profile.id
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    /// Backlog length, the only load metric used for assignment.
    pub fn load(&self) -> usize {
        self.backlog.len()
    }

    pub fn backlog(&self) -> impl Iterator<Item = &WorkItem> {
        self.backlog.iter()
    }
}

/// Tracks workers and their backlogs.
///
/// Not internally synchronized: the kitchen shares it behind a single
/// `RwLock` so that a least-loaded read and the following assignment happen
/// under the same write guard.
#[derive(Debug, Default)]
pub struct WorkforceDirectory {
    workers: BTreeMap<WorkerId, Worker>,
}

impl WorkforceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = WorkerProfile>) -> Self {
        let mut directory = Self::new();
        for profile in profiles {
            directory.register(profile);
        }
        directory
    }

    /// Register a worker. Re-registering an id refreshes its profile and
    /// keeps the existing backlog.
    pub fn register(&mut self, profile: WorkerProfile) {
        let worker_id = profile.id;
        let role = profile.role;
        match self.workers.get_mut(&worker_id) {
            Some(worker) => worker.profile = profile,
            None => {
                self.workers.insert(worker_id, Worker::new(profile));
            }
        }
        tracing::info!(worker_id, role = %role, "Worker registered");
    }

    pub fn worker(&self, worker_id: WorkerId) -> Option<&Worker> {
        self.workers.get(&worker_id)
    }

    /// Worker able to perform `stage` with the shortest backlog; ties go to
    /// the lowest id.
    pub fn least_loaded(&self, stage: Stage) -> Option<&Worker> {
        self.workers
            .values()
            .filter(|w| w.role().can_perform(stage))
            .min_by_key(|w| (w.load(), w.id()))
    }

    /// Append an item to a worker's backlog.
    pub fn assign(&mut self, worker_id: WorkerId, item: WorkItem) -> Result<()> {
        let worker = self
            .workers
            .get_mut(&worker_id)
            .ok_or(GalleyError::WorkerNotFound(worker_id))?;
        tracing::debug!(order_id = item.id, worker_id, stage = %item.stage, "Item added to backlog");
        worker.backlog.push_back(item);
        Ok(())
    }

    /// Pop the oldest item from a worker's backlog.
    pub fn release(&mut self, worker_id: WorkerId) -> Option<WorkItem> {
        self.workers.get_mut(&worker_id)?.backlog.pop_front()
    }

    /// Remove a specific item from a worker's backlog.
    pub fn release_item(&mut self, worker_id: WorkerId, order_id: OrderId) -> Option<WorkItem> {
        let backlog = &mut self.workers.get_mut(&worker_id)?.backlog;
        let pos = backlog.iter().position(|item| item.id == order_id)?;
        backlog.remove(pos)
    }

    /// Loads of all workers, ordered by worker id.
    pub fn loads(&self) -> Vec<WorkerLoad> {
        self.workers
            .values()
            .map(|w| WorkerLoad {
                worker_id: w.id(),
                name: w.profile.name.clone(),
                role: w.role(),
                backlog_size: w.load(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::test_item;

    fn profile(id: WorkerId, role: Role) -> WorkerProfile {
        WorkerProfile {
            id,
            name: format!("worker-{}", id),
            role,
            performance: 1.0,
        }
    }

    #[test]
    fn least_loaded_picks_shortest_backlog() {
        let mut dir = WorkforceDirectory::from_profiles([
            profile(1, Role::Chef),
            profile(2, Role::Chef),
        ]);
        dir.assign(1, test_item(10, 1.0)).unwrap();
        dir.assign(1, test_item(11, 1.0)).unwrap();
        dir.assign(1, test_item(12, 1.0)).unwrap();
        dir.assign(2, test_item(13, 1.0)).unwrap();

        assert_eq!(dir.least_loaded(Stage::Preparation).map(|w| w.id()), Some(2));
    }

    #[test]
    fn least_loaded_ties_go_to_lowest_id() {
        let dir = WorkforceDirectory::from_profiles([
            profile(7, Role::Chef),
            profile(3, Role::Chef),
            profile(5, Role::Chef),
        ]);
        assert_eq!(dir.least_loaded(Stage::Preparation).map(|w| w.id()), Some(3));
    }

    #[test]
    fn least_loaded_filters_by_capability() {
        let dir = WorkforceDirectory::from_profiles([profile(1, Role::Chef)]);
        assert!(dir.least_loaded(Stage::Delivery).is_none());
        assert!(dir.least_loaded(Stage::Preparation).is_some());

        // An idle waiter never takes preparation work from a busy chef.
        let mut dir = WorkforceDirectory::from_profiles([
            profile(1, Role::Chef),
            profile(2, Role::Waiter),
        ]);
        dir.assign(1, test_item(10, 1.0)).unwrap();
        assert_eq!(dir.least_loaded(Stage::Preparation).map(|w| w.id()), Some(1));
        assert_eq!(dir.least_loaded(Stage::Delivery).map(|w| w.id()), Some(2));
    }

    #[test]
    fn release_is_fifo() {
        let mut dir = WorkforceDirectory::from_profiles([profile(1, Role::Chef)]);
        dir.assign(1, test_item(1, 1.0)).unwrap();
        dir.assign(1, test_item(2, 1.0)).unwrap();

        assert_eq!(dir.release(1).map(|i| i.id), Some(1));
        assert_eq!(dir.release(1).map(|i| i.id), Some(2));
        assert!(dir.release(1).is_none());
    }

    #[test]
    fn release_item_removes_only_that_item() {
        let mut dir = WorkforceDirectory::from_profiles([profile(1, Role::Chef)]);
        dir.assign(1, test_item(1, 1.0)).unwrap();
        dir.assign(1, test_item(2, 1.0)).unwrap();
        dir.assign(1, test_item(3, 1.0)).unwrap();

        assert_eq!(dir.release_item(1, 2).map(|i| i.id), Some(2));
        assert!(dir.release_item(1, 2).is_none());
        let remaining: Vec<_> = dir.worker(1).unwrap().backlog().map(|i| i.id).collect();
        assert_eq!(remaining, vec![1, 3]);
    }

    #[test]
    fn assign_to_unknown_worker_fails() {
        let mut dir = WorkforceDirectory::new();
        let err = dir.assign(9, test_item(1, 1.0)).unwrap_err();
        assert!(matches!(err, GalleyError::WorkerNotFound(9)));
    }

    #[test]
    fn register_keeps_backlog() {
        let mut dir = WorkforceDirectory::from_profiles([profile(1, Role::Chef)]);
        dir.assign(1, test_item(1, 1.0)).unwrap();
        let mut faster = profile(1, Role::Chef);
        faster.performance = 2.0;
        dir.register(faster);

        let worker = dir.worker(1).unwrap();
        assert_eq!(worker.profile.performance, 2.0);
        assert_eq!(worker.load(), 1);
    }

    #[test]
    fn loads_are_ordered_by_id() {
        let mut dir = WorkforceDirectory::from_profiles([
            profile(2, Role::Waiter),
            profile(1, Role::Chef),
        ]);
        dir.assign(2, test_item(1, 1.0)).unwrap();
        let loads = dir.loads();
        assert_eq!(loads.len(), 2);
        assert_eq!(loads[0].worker_id, 1);
        assert_eq!(loads[0].backlog_size, 0);
        assert_eq!(loads[1].worker_id, 2);
        assert_eq!(loads[1].role, Role::Waiter);
        assert_eq!(loads[1].backlog_size, 1);
    }
}
