use destructure::Mutation;
use std::time::Duration;
use vodca::References;

/// Business parameters every rental transition is evaluated against.
#[derive(Debug, Clone, Eq, PartialEq, References, Mutation)]
pub struct RentalPolicy {
    max_items: usize,
    rental_period_days: i64,
    points_per_rental: i32,
}

impl RentalPolicy {
    pub fn new(max_items: usize, rental_period_days: i64, points_per_rental: i32) -> Self {
        Self {
            max_items,
            rental_period_days,
            points_per_rental,
        }
    }
}

impl Default for RentalPolicy {
    fn default() -> Self {
        Self::new(5, 14, 30)
    }
}

/// Exponential backoff: `initial_delay * multiplier^attempt`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq, References, Mutation)]
pub struct RetryPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        let delay = self.initial_delay.as_nanos() as f64 * factor;
        if !delay.is_finite() || delay >= self.max_delay.as_nanos() as f64 {
            self.max_delay
        } else {
            Duration::from_nanos(delay as u64)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), Duration::from_secs(2), 2.0)
    }
}

/// Limits applied by the use-case layer around the store.
#[derive(Debug, Clone, PartialEq, References, Mutation)]
pub struct UseCaseConfig {
    persist_timeout: Duration,
    max_attempts: u32,
    backoff: RetryPolicy,
}

impl UseCaseConfig {
    pub fn new(persist_timeout: Duration, max_attempts: u32, backoff: RetryPolicy) -> Self {
        Self {
            persist_timeout,
            max_attempts,
            backoff,
        }
    }
}

impl Default for UseCaseConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 5, RetryPolicy::default())
    }
}

/// Pacing of the relay that moves staged notifications into the delivery queue.
/// An entry is stranded after `max_attempts` failed hand-offs.
#[derive(Debug, Clone, PartialEq, References, Mutation)]
pub struct RelayConfig {
    poll_interval: Duration,
    batch_size: i64,
    max_attempts: i64,
    backoff: RetryPolicy,
}

impl RelayConfig {
    pub fn new(
        poll_interval: Duration,
        batch_size: i64,
        max_attempts: i64,
        backoff: RetryPolicy,
    ) -> Self {
        Self {
            poll_interval,
            batch_size,
            max_attempts,
            backoff,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(200),
            32,
            10,
            RetryPolicy::new(Duration::from_millis(100), Duration::from_secs(30), 2.0),
        )
    }
}

pub trait DependOnRentalPolicy: 'static + Sync + Send {
    fn rental_policy(&self) -> &RentalPolicy;
}

pub trait DependOnUseCaseConfig: 'static + Sync + Send {
    fn use_case_config(&self) -> &UseCaseConfig;
}

#[cfg(test)]
mod test {
    use super::RetryPolicy;
    use std::time::Duration;

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = RetryPolicy::new(Duration::from_millis(100), Duration::from_secs(1), 2.0);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(1));
    }
}
