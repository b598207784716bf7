//! Bounded retry around whole harvest attempts.
//!
//! Every attempt starts from scratch; nothing from a failed attempt is kept.
//! Any error is retryable, and only running out of attempts is fatal.

use crate::config::SupervisorConfig;
use crate::harvest::error::{HarvestError, HarvestResult};
use std::future::Future;
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tracing::{info, warn};

pub struct Supervisor {
    max_attempts: u32,
    backoff_ms: u64,
}

impl Supervisor {
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_ms,
        }
    }

    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(config.max_attempts, config.backoff_ms)
    }

    /// Run `attempt` (given the 1-based attempt number) until it succeeds or
    /// the budget is spent, then fail with `HarvestExhausted`.
    pub async fn supervise<T, F, Fut>(&self, mut attempt: F) -> HarvestResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = HarvestResult<T>>,
    {
        let strategy = FixedInterval::from_millis(self.backoff_ms)
            .take(self.max_attempts as usize - 1);
        let max_attempts = self.max_attempts;
        let mut made = 0u32;

        let outcome = Retry::start(strategy, || {
            made += 1;
            let n = made;
            let fut = attempt(n);
            async move {
                info!("Harvest attempt {}/{}", n, max_attempts);
                let result = fut.await;
                if let Err(e) = &result {
                    warn!("Attempt {}/{} failed: {}", n, max_attempts, e);
                }
                result
            }
        })
        .await;

        outcome.map_err(|last| HarvestError::HarvestExhausted {
            attempts: made,
            last: Box::new(last),
        })
    }
}
