use kernel::interface::mq::MQConfig;
use kernel::prelude::config::{RelayConfig, RentalPolicy, RetryPolicy, UseCaseConfig};
use kernel::KernelError;
use std::time::Duration;

use crate::env_or;

const RENTAL_MAX_ITEMS: &str = "RENTAL_MAX_ITEMS";
const RENTAL_PERIOD_DAYS: &str = "RENTAL_PERIOD_DAYS";
const RENTAL_POINTS_PER_ITEM: &str = "RENTAL_POINTS_PER_ITEM";

const PERSIST_TIMEOUT_MILLIS: &str = "PERSIST_TIMEOUT_MILLIS";
const PERSIST_MAX_ATTEMPTS: &str = "PERSIST_MAX_ATTEMPTS";

const OUTBOX_WORKER_COUNT: &str = "OUTBOX_WORKER_COUNT";
const OUTBOX_MAX_RETRY: &str = "OUTBOX_MAX_RETRY";
const OUTBOX_RETRY_DELAY_MILLIS: &str = "OUTBOX_RETRY_DELAY_MILLIS";
const OUTBOX_MAX_RETRY_DELAY_MILLIS: &str = "OUTBOX_MAX_RETRY_DELAY_MILLIS";

const RELAY_POLL_INTERVAL_MILLIS: &str = "RELAY_POLL_INTERVAL_MILLIS";
const RELAY_BATCH_SIZE: &str = "RELAY_BATCH_SIZE";
const RELAY_MAX_ATTEMPTS: &str = "RELAY_MAX_ATTEMPTS";

pub fn rental_policy() -> error_stack::Result<RentalPolicy, KernelError> {
    let default = RentalPolicy::default();
    Ok(RentalPolicy::new(
        env_or(RENTAL_MAX_ITEMS, *default.max_items())?,
        env_or(RENTAL_PERIOD_DAYS, *default.rental_period_days())?,
        env_or(RENTAL_POINTS_PER_ITEM, *default.points_per_rental())?,
    ))
}

pub fn use_case_config() -> error_stack::Result<UseCaseConfig, KernelError> {
    let default = UseCaseConfig::default();
    let timeout = env_or(
        PERSIST_TIMEOUT_MILLIS,
        millis(default.persist_timeout()),
    )?;
    Ok(UseCaseConfig::new(
        Duration::from_millis(timeout),
        env_or(PERSIST_MAX_ATTEMPTS, *default.max_attempts())?,
        default.backoff().clone(),
    ))
}

pub fn outbox_config() -> error_stack::Result<MQConfig, KernelError> {
    let default = MQConfig::default();
    let initial = env_or(
        OUTBOX_RETRY_DELAY_MILLIS,
        millis(default.backoff().initial_delay()),
    )?;
    let max = env_or(
        OUTBOX_MAX_RETRY_DELAY_MILLIS,
        millis(default.backoff().max_delay()),
    )?;
    Ok(MQConfig::new(
        env_or(OUTBOX_WORKER_COUNT, *default.worker_count())?,
        env_or(OUTBOX_MAX_RETRY, *default.max_retry())?,
        RetryPolicy::new(
            Duration::from_millis(initial),
            Duration::from_millis(max),
            *default.backoff().multiplier(),
        ),
    ))
}

pub fn relay_config() -> error_stack::Result<RelayConfig, KernelError> {
    let default = RelayConfig::default();
    let poll = env_or(RELAY_POLL_INTERVAL_MILLIS, millis(default.poll_interval()))?;
    Ok(RelayConfig::new(
        Duration::from_millis(poll),
        env_or(RELAY_BATCH_SIZE, *default.batch_size())?,
        env_or(RELAY_MAX_ATTEMPTS, *default.max_attempts())?,
        default.backoff().clone(),
    ))
}

fn millis(duration: &Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod test {
    use kernel::prelude::config::RentalPolicy;
    use kernel::KernelError;

    #[test]
    fn unset_variables_fall_back_to_defaults() -> error_stack::Result<(), KernelError> {
        let policy = super::rental_policy()?;
        if std::env::var("RENTAL_MAX_ITEMS").is_err()
            && std::env::var("RENTAL_PERIOD_DAYS").is_err()
            && std::env::var("RENTAL_POINTS_PER_ITEM").is_err()
        {
            assert_eq!(policy, RentalPolicy::default());
        }
        Ok(())
    }
}
