use uuid::Uuid;

use crate::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use crate::event::RentalNotification;
use crate::KernelError;

#[async_trait::async_trait]
pub trait OutboxModifier: 'static + Sync + Send {
    type Transaction: Transaction;
    /// Records the batch in the same transaction as the rental change, so both
    /// commit or neither does.
    async fn stage(
        &self,
        con: &mut Self::Transaction,
        notifications: &[RentalNotification],
    ) -> error_stack::Result<(), KernelError>;

    /// Drops an entry once the delivery queue has accepted it.
    async fn remove(&self, con: &mut Self::Transaction, id: &Uuid)
        -> error_stack::Result<(), KernelError>;

    /// Counts a failed hand-off. A stranded entry is kept but no longer relayed.
    async fn record_failure(
        &self,
        con: &mut Self::Transaction,
        id: &Uuid,
        stack_trace: &str,
        strand: bool,
    ) -> error_stack::Result<(), KernelError>;
}

pub trait DependOnOutboxModifier: 'static + Sync + Send + DependOnDatabaseConnection {
    type OutboxModifier: OutboxModifier<
        Transaction = <Self::DatabaseConnection as DatabaseConnection>::Transaction,
    >;
    fn outbox_modifier(&self) -> &Self::OutboxModifier;
}
