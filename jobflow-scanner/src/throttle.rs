use crate::error::{Result, ScanError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Ceiling on requests in flight against the site at once.
    pub max_concurrent_requests: usize,
    pub start_delay_ms: u64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Average number of requests the delay aims to keep in flight.
    pub target_concurrency: f64,
    /// Scale each delay by a random factor in 0.5..1.5.
    pub randomize_delay: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 4,
            start_delay_ms: 1000,
            min_delay_ms: 250,
            max_delay_ms: 10_000,
            target_concurrency: 2.0,
            randomize_delay: true,
        }
    }
}

impl ThrottleConfig {
    /// No stagger at all, only the concurrency ceiling.
    pub fn unthrottled(max_concurrent_requests: usize) -> Self {
        Self {
            max_concurrent_requests,
            start_delay_ms: 0,
            min_delay_ms: 0,
            max_delay_ms: 0,
            target_concurrency: 1.0,
            randomize_delay: false,
        }
    }
}

/// Per-domain request throttle.
///
/// Concurrency is capped by a semaphore. Before each request the holder of a
/// permit waits the current delay, which tracks observed latency divided by
/// the target concurrency and only widens on failed responses.
pub struct Throttle {
    semaphore: Semaphore,
    delay: Mutex<Duration>,
    config: ThrottleConfig,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        let permits = config.max_concurrent_requests.max(1);
        let start = Duration::from_millis(config.start_delay_ms);
        Self {
            semaphore: Semaphore::new(permits),
            delay: Mutex::new(start),
            config,
        }
    }

    pub fn current_delay(&self) -> Duration {
        match self.delay.lock() {
            Ok(delay) => *delay,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Wait for a request slot, then wait out the current stagger delay.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| ScanError::Other(format!("Throttle closed: {}", e)))?;

        let delay = self.jittered(self.current_delay());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(permit)
    }

    /// Feed back the latency of a completed response.
    pub fn record_response(&self, latency: Duration, success: bool) {
        let min = Duration::from_millis(self.config.min_delay_ms);
        let max = Duration::from_millis(self.config.max_delay_ms);
        let target_concurrency = self.config.target_concurrency.max(0.1);

        let mut delay = match self.delay.lock() {
            Ok(delay) => delay,
            Err(poisoned) => poisoned.into_inner(),
        };

        let target = latency.div_f64(target_concurrency);
        let smoothed = (*delay + target) / 2;
        let next = smoothed.max(target).clamp(min, max.max(min));

        // error responses never make us faster
        if !success && next <= *delay {
            return;
        }

        debug!("Throttle delay {:?} -> {:?} (latency {:?})", *delay, next, latency);
        *delay = next;
    }

    /// A request that never produced a response (timeout, refused) backs off hard.
    pub fn record_failure(&self) {
        let min = Duration::from_millis(self.config.min_delay_ms);
        let max = Duration::from_millis(self.config.max_delay_ms);

        let mut delay = match self.delay.lock() {
            Ok(delay) => delay,
            Err(poisoned) => poisoned.into_inner(),
        };

        let next = (delay.max(min) * 2).clamp(min, max.max(min));
        debug!("Throttle backing off {:?} -> {:?}", *delay, next);
        *delay = next;
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.config.randomize_delay || delay.is_zero() {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.5..1.5);
        delay.mul_f64(factor)
    }
}
