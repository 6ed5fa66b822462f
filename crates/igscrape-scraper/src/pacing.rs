//! Randomized pacing between backend calls.

use std::time::Duration;

use igscrape_core::AppConfig;
use rand::Rng;

/// Sleeps a uniformly random duration inside `[min, max]` seconds.
///
/// The orchestrator paces once before and once after every request so that
/// no two backend calls are ever closer together than `min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiter {
    min_secs: f64,
    max_secs: f64,
}

impl RateLimiter {
    /// Builds a limiter for the window `[min_secs, max_secs]`. Bounds are
    /// swapped if given in the wrong order and clamped to be non-negative.
    #[must_use]
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        let min_secs = min_secs.max(0.0);
        let max_secs = max_secs.max(0.0);
        if min_secs <= max_secs {
            Self { min_secs, max_secs }
        } else {
            Self {
                min_secs: max_secs,
                max_secs: min_secs,
            }
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.min_delay_secs, config.max_delay_secs)
    }

    /// A limiter that never sleeps.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0.0, 0.0)
    }

    #[must_use]
    pub fn window(&self) -> (f64, f64) {
        (self.min_secs, self.max_secs)
    }

    /// Draws the next delay.
    #[must_use]
    pub fn sample(&self) -> Duration {
        let secs = if self.max_secs > self.min_secs {
            rand::rng().random_range(self.min_secs..=self.max_secs)
        } else {
            self.min_secs
        };
        Duration::from_secs_f64(secs)
    }

    /// Sleeps for one sampled delay and returns it.
    pub async fn pace(&self) -> Duration {
        let delay = self.sample();
        if !delay.is_zero() {
            tracing::info!(delay_secs = delay.as_secs_f64(), "pacing");
            tokio::time::sleep(delay).await;
        }
        delay
    }
}
