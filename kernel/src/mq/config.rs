use destructure::Mutation;
use std::time::Duration;
use vodca::References;

use crate::config::RetryPolicy;

#[derive(Debug, Clone, References, Mutation)]
pub struct MQConfig {
    worker_count: usize,
    max_retry: i64,
    backoff: RetryPolicy,
}

impl MQConfig {
    pub fn new(worker_count: usize, max_retry: i64, backoff: RetryPolicy) -> Self {
        Self {
            worker_count,
            max_retry,
            backoff,
        }
    }

    /// How long a delivery that already failed `attempts` times waits before the next try.
    pub fn redelivery_delay(&self, attempts: i64) -> Duration {
        let attempts = u32::try_from(attempts.max(0)).unwrap_or(u32::MAX);
        self.backoff.delay_for_attempt(attempts.saturating_sub(1))
    }
}

impl Default for MQConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_retry: 5,
            backoff: RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(300), 2.0),
        }
    }
}
