use error_stack::Report;
use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use kernel::interface::query::{DependOnRentalQuery, RentalQuery};
use kernel::interface::update::{
    DependOnOutboxModifier, DependOnRentalModifier, OutboxModifier, RentalModifier,
};
use kernel::prelude::config::DependOnUseCaseConfig;
use kernel::prelude::entity::{DestructTransition, Rental, Transition, UserId};
use kernel::KernelError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Bounds `io` by `limit`, reporting `Timeout` once it elapses.
pub(crate) async fn within<T, F>(limit: Duration, io: F) -> error_stack::Result<T, KernelError>
where
    F: Future<Output = error_stack::Result<T, KernelError>>,
{
    match timeout(limit, io).await {
        Ok(result) => result,
        Err(_) => Err(Report::new(KernelError::Timeout)
            .attach_printable(format!("persistence did not finish within {limit:?}"))),
    }
}

/// Load, decide, compare-and-swap, stage the notifications and commit.
///
/// An aggregate rejection ends the run at once without any write. Version
/// conflicts and transient store failures start over from a fresh load with
/// backoff until `max_attempts` is spent. Notifications land in the outbox in
/// the same transaction as the change; the relay hands them to the delivery
/// queue later, so a queue outage never fails or slows the caller.
#[async_trait::async_trait]
pub trait ApplyTransition:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection
    + DependOnRentalQuery
    + DependOnRentalModifier
    + DependOnOutboxModifier
    + DependOnUseCaseConfig
{
    async fn apply_transition<F>(
        &self,
        user_id: &UserId,
        operation: F,
    ) -> error_stack::Result<Rental, KernelError>
    where
        F: Fn(&Rental) -> error_stack::Result<Transition, KernelError> + Sync + Send,
    {
        let config = self.use_case_config();
        let max_attempts = (*config.max_attempts()).max(1);
        let mut attempt = 0;
        loop {
            let result = within(
                *config.persist_timeout(),
                self.persist_once(user_id, &operation),
            )
            .await;
            match result {
                Ok(stored) => return Ok(stored),
                Err(report)
                    if report.current_context().is_retryable() && attempt + 1 < max_attempts =>
                {
                    let delay = config.backoff().delay_for_attempt(attempt);
                    warn!(
                        "Attempt {} for user {} failed, retrying in {delay:?}: {}",
                        attempt + 1,
                        user_id.as_ref(),
                        report.current_context()
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(report) => return Err(report),
            }
        }
    }

    async fn persist_once<F>(
        &self,
        user_id: &UserId,
        operation: &F,
    ) -> error_stack::Result<Rental, KernelError>
    where
        F: Fn(&Rental) -> error_stack::Result<Transition, KernelError> + Sync + Send,
    {
        let mut con = self.database_connection().transact().await?;
        let current = self
            .rental_query()
            .find_by_user_id(&mut con, user_id)
            .await?
            .ok_or_else(|| {
                Report::new(KernelError::RecordNotFound)
                    .attach_printable(format!("No rental for user: {}", user_id.as_ref()))
            })?;
        // Dropping the transaction on rejection leaves the store untouched
        let DestructTransition {
            rental,
            notifications,
        } = operation(&current)?.into_destruct();
        let stored = self
            .rental_modifier()
            .compare_and_swap(&mut con, &rental, current.version())
            .await?;
        if !notifications.is_empty() {
            self.outbox_modifier()
                .stage(&mut con, &notifications)
                .await?;
        }
        con.commit().await?;
        debug!(
            "Committed version {} for user {} with {} staged notification(s)",
            stored.version().as_ref(),
            user_id.as_ref(),
            notifications.len()
        );
        Ok(stored)
    }
}

impl<T> ApplyTransition for T where
    T: DependOnDatabaseConnection
        + DependOnRentalQuery
        + DependOnRentalModifier
        + DependOnOutboxModifier
        + DependOnUseCaseConfig
{
}
