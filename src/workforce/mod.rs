//! Kitchen staff: roles, profiles and the backlog-tracking directory.

pub mod directory;

use serde::{Deserialize, Serialize};

use crate::scheduler::Stage;

pub use directory::{Worker, WorkforceDirectory};

pub type WorkerId = u64;

/// A worker's job. Each role carries a fixed capability set; adding a role
/// means deciding which pipeline stages it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Chef,
    Waiter,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Chef, Role::Waiter];

    pub fn can_prepare(self) -> bool {
        matches!(self, Role::Chef)
    }

    pub fn can_deliver(self) -> bool {
        matches!(self, Role::Waiter)
    }

    pub fn can_perform(self, stage: Stage) -> bool {
        match stage {
            Stage::Preparation => self.can_prepare(),
            Stage::Delivery => self.can_deliver(),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Chef => write!(f, "chef"),
            Role::Waiter => write!(f, "waiter"),
        }
    }
}

/// Static description of a worker as served by the data-access layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub id: WorkerId,
    pub name: String,
    pub role: Role,
    /// Relative speed multiplier; values above 1.0 work faster.
    pub performance: f64,
}

/// Snapshot of one worker's current load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerLoad {
    pub worker_id: WorkerId,
    pub name: String,
    pub role: Role,
    pub backlog_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_capabilities() {
        assert!(Role::Chef.can_perform(Stage::Preparation));
        assert!(!Role::Chef.can_perform(Stage::Delivery));
        assert!(Role::Waiter.can_perform(Stage::Delivery));
        assert!(!Role::Waiter.can_perform(Stage::Preparation));
    }

    #[test]
    fn role_serde_is_lowercase() {
        let json = serde_json::to_string(&Role::Waiter).unwrap();
        assert_eq!(json, "\"waiter\"");
        let role: Role = serde_json::from_str("\"chef\"").unwrap();
        assert_eq!(role, Role::Chef);
        assert_eq!(Role::Chef.to_string(), "chef");
    }
}
