//! Backoff policy for bootstrap steps that fail to reach the hub.

use std::time::Duration;

use hubrelay_core::config::BootstrapConfig;

/// Exponential backoff with a bounded number of attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Total attempts per step, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&BootstrapConfig::default())
    }
}

impl From<&BootstrapConfig> for RetryPolicy {
    fn from(config: &BootstrapConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts,
        }
    }
}

impl RetryPolicy {
    /// No second chances.
    pub const fn once() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts: 1,
        }
    }

    /// Delay after the given failed attempt (0-indexed), doubling each time.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether attempt number `attempt` (0-indexed) may run.
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
