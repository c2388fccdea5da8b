use std::time::Duration;

use rand::Rng;

use crate::config::KitchenConfig;
use crate::store::Recipe;
use crate::workforce::WorkerProfile;

/// Computes completion estimates and simulated stage durations.
#[derive(Debug, Clone)]
pub struct OrderEstimator {
    minutes_per_complexity_unit: f64,
    jitter: f64,
    time_unit: Duration,
}

impl OrderEstimator {
    pub fn new(config: &KitchenConfig) -> Self {
        Self {
            minutes_per_complexity_unit: config.minutes_per_complexity_unit,
            jitter: config.effective_jitter(),
            time_unit: config.time_unit,
        }
    }

    /// Estimated completion time in time units.
    ///
    /// Quantity only affects cost, never duration. Without a worker the
    /// estimate assumes nominal performance (1.0).
    pub fn estimate(&self, recipe: &Recipe, _quantity: u32, worker: Option<&WorkerProfile>) -> f64 {
        let performance = worker.map_or(1.0, |w| w.performance);
        self.base_units(recipe.complexity, performance)
    }

    pub fn base_units(&self, complexity: f64, performance: f64) -> f64 {
        complexity * self.minutes_per_complexity_unit / performance
    }

    /// Multiplier drawn uniformly from `[1 - jitter, 1 + jitter]`.
    pub fn jitter_factor(&self) -> f64 {
        if self.jitter == 0.0 {
            return 1.0;
        }
        rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter))
    }

    /// Wall-clock duration of one stage, jitter applied once.
    pub fn stage_duration(&self, complexity: f64, performance: f64) -> Duration {
        let units = self.base_units(complexity, performance) * self.jitter_factor();
        self.to_duration(units)
    }

    pub fn to_duration(&self, units: f64) -> Duration {
        Duration::try_from_secs_f64(units * self.time_unit.as_secs_f64()).unwrap_or(Duration::MAX)
    }
}
