#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Minimum-interval request pacing.
//!
//! Public geocoding and statistics endpoints document a maximum request
//! rate. A [`Throttle`] is shared by every task that talks to one
//! provider; each caller awaits [`Throttle::wait`] before sending, and
//! permits are handed out no closer together than the configured
//! interval.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Hands out request permits at most once per `min_interval`.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Creates a throttle. A zero interval never waits.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Creates a throttle from a `rate_limit_ms` setting.
    #[must_use]
    pub fn from_millis(rate_limit_ms: u64) -> Self {
        Self::new(Duration::from_millis(rate_limit_ms))
    }

    /// The configured interval.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until at least `min_interval` has passed since the previous
    /// permit, then takes a permit.
    ///
    /// Waiters are served in FIFO order.
    pub async fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                log::trace!("throttling for {}ms", remaining.as_millis());
                tokio::time::sleep(remaining).await;
            }
        }
        *last = Some(Instant::now());
    }
}
