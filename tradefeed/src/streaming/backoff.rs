use std::time::Duration;

use rand::Rng;
use tradefeed_core::BackoffConfig;

/// Exponential reconnect delay, bounded by `[min, max]`.
///
/// `next()` hands out the current delay and then grows it by `factor`, capped at
/// `max`. `reset()` brings it back to `min`; the connection calls it right after
/// every successful open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    factor: u32,
    current: Duration,
}

impl Backoff {
    /// Build a policy. `factor` below 1 is treated as 1 and `max` below `min` as `min`.
    #[must_use]
    pub fn new(min: Duration, max: Duration, factor: u32) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            factor: factor.max(1),
            current: min,
        }
    }

    /// Build a policy from configuration.
    #[must_use]
    pub fn from_config(cfg: &BackoffConfig) -> Self {
        Self::new(cfg.min_backoff(), cfg.max_backoff(), cfg.factor)
    }

    /// Return the delay for this failure and advance to the next one.
    pub fn next(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(self.factor)
            .map_or(self.max, |d| d.min(self.max));
        delay
    }

    /// Restart from the minimum delay.
    pub const fn reset(&mut self) {
        self.current = self.min;
    }

    /// The delay the next call to `next()` will return.
    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }

    /// Lower bound.
    #[must_use]
    pub const fn min(&self) -> Duration {
        self.min
    }

    /// Upper bound.
    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }
}

/// Add up to `jitter_percent`% of random extra wait to `base_ms`.
pub fn jitter_wait(base_ms: u64, jitter_percent: u32) -> u64 {
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, (base_ms.saturating_mul(u64::from(jitter_percent))) / 100)
    };
    let mut rng = rand::rng();
    base_ms.saturating_add(rng.random_range(0..jitter_range))
}

/// `jitter_wait` over `Duration`s.
pub(crate) fn jittered(delay: Duration, jitter_percent: u8) -> Duration {
    if jitter_percent == 0 {
        return delay;
    }
    let base_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(jitter_wait(base_ms, u32::from(jitter_percent.min(100))))
}
