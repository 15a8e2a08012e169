//! # Backoff Calculator
//!
//! Exponential backoff for task re-queues: configurable base delay with
//! exponential growth, a maximum delay cap, and optional jitter to prevent
//! thundering herd when many tasks retry at once.

use std::time::Duration;

use crate::config::BackoffConfig;

#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    config: BackoffConfig,
}

impl BackoffCalculator {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(BackoffConfig::default())
    }

    /// Delay before re-queueing after the given 1-based attempt number.
    ///
    /// `base * multiplier^(attempt - 1)`, capped at the configured maximum;
    /// jitter subtracts up to `max_jitter` of the capped delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms as f64;
        let exponent = attempt.saturating_sub(1).min(63);
        let exponential = base * self.config.multiplier.powi(exponent as i32);
        let capped = exponential.min(self.config.max_delay_ms as f64);

        let delay_ms = if self.config.jitter_enabled {
            self.apply_jitter(capped)
        } else {
            capped
        };

        Duration::from_millis(delay_ms as u64)
    }

    fn apply_jitter(&self, delay_ms: f64) -> f64 {
        use rand::Rng;
        let fraction = rand::thread_rng().gen_range(0.0..=self.config.max_jitter);
        delay_ms - delay_ms * fraction
    }
}
