use std::time::Duration;

/// Minutes of work per unit of recipe complexity.
pub const DEFAULT_MINUTES_PER_COMPLEXITY_UNIT: f64 = 10.0;

/// Default jitter half-width: stage durations vary by up to ±20%.
pub const DEFAULT_JITTER: f64 = 0.2;

/// Order records kept before the oldest finished ones are evicted.
pub const DEFAULT_LEDGER_CAPACITY: usize = 10_000;

/// Runtime configuration for a [`Kitchen`](crate::Kitchen).
///
/// Estimates are expressed in abstract time units; `time_unit` maps one unit
/// onto wall-clock time when stages are simulated.
#[derive(Debug, Clone)]
pub struct KitchenConfig {
    /// Wall-clock length of one estimate unit.
    pub time_unit: Duration,
    /// Work units per point of recipe complexity.
    pub minutes_per_complexity_unit: f64,
    /// Half-width of the uniform jitter band applied to stage durations.
    /// Clamped to `[0, 1)`.
    pub jitter: f64,
    /// Maximum number of stages executing concurrently.
    pub execution_slots: usize,
    /// Interval of the registry sweep that reclaims finished executions.
    pub sweep_interval_ms: u64,
    /// Buffer size of the order event broadcast channel.
    pub event_capacity: usize,
    /// Maximum order records retained by the ledger. Live orders are never
    /// evicted, so the ledger can exceed this while they are in flight.
    pub ledger_capacity: usize,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        Self {
            time_unit: Duration::from_secs(1),
            minutes_per_complexity_unit: DEFAULT_MINUTES_PER_COMPLEXITY_UNIT,
            jitter: DEFAULT_JITTER,
            execution_slots: 64,
            sweep_interval_ms: 1000,
            event_capacity: 1024,
            ledger_capacity: DEFAULT_LEDGER_CAPACITY,
        }
    }
}

impl KitchenConfig {
    pub fn with_time_unit(mut self, time_unit: Duration) -> Self {
        self.time_unit = time_unit;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_execution_slots(mut self, slots: usize) -> Self {
        self.execution_slots = slots;
        self
    }

    pub fn with_sweep_interval_ms(mut self, interval_ms: u64) -> Self {
        self.sweep_interval_ms = interval_ms;
        self
    }

    pub fn with_ledger_capacity(mut self, capacity: usize) -> Self {
        self.ledger_capacity = capacity;
        self
    }

    /// Jitter clamped into the supported range.
    pub fn effective_jitter(&self) -> f64 {
        if self.jitter.is_nan() {
            return 0.0;
        }
        self.jitter.clamp(0.0, 0.99)
    }

    /// Execution slots, never zero.
    pub fn effective_slots(&self) -> usize {
        self.execution_slots.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kitchen_config_default() {
        let cfg = KitchenConfig::default();
        assert_eq!(cfg.time_unit, Duration::from_secs(1));
        assert_eq!(cfg.minutes_per_complexity_unit, 10.0);
        assert_eq!(cfg.jitter, 0.2);
        assert_eq!(cfg.execution_slots, 64);
        assert_eq!(cfg.sweep_interval_ms, 1000);
        assert_eq!(cfg.event_capacity, 1024);
        assert_eq!(cfg.ledger_capacity, 10_000);
    }

    #[test]
    fn kitchen_config_builders() {
        let cfg = KitchenConfig::default()
            .with_time_unit(Duration::from_millis(5))
            .with_jitter(0.0)
            .with_execution_slots(2)
            .with_sweep_interval_ms(10)
            .with_ledger_capacity(3);
        assert_eq!(cfg.time_unit, Duration::from_millis(5));
        assert_eq!(cfg.jitter, 0.0);
        assert_eq!(cfg.execution_slots, 2);
        assert_eq!(cfg.sweep_interval_ms, 10);
        assert_eq!(cfg.ledger_capacity, 3);
    }

    #[test]
    fn jitter_is_clamped() {
        assert_eq!(KitchenConfig::default().with_jitter(-1.0).effective_jitter(), 0.0);
        assert_eq!(KitchenConfig::default().with_jitter(5.0).effective_jitter(), 0.99);
        assert_eq!(KitchenConfig::default().with_jitter(f64::NAN).effective_jitter(), 0.0);
        assert_eq!(KitchenConfig::default().with_jitter(0.2).effective_jitter(), 0.2);
    }

    #[test]
    fn zero_slots_become_one() {
        let cfg = KitchenConfig::default().with_execution_slots(0);
        assert_eq!(cfg.effective_slots(), 1);
    }
}
