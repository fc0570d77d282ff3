use crate::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use crate::entity::{Rental, Version};
use crate::KernelError;

#[async_trait::async_trait]
pub trait RentalModifier: 'static + Sync + Send {
    type Transaction: Transaction;
    /// Fails with `Concurrency` when the user already owns a record.
    async fn create(
        &self,
        con: &mut Self::Transaction,
        rental: &Rental,
    ) -> error_stack::Result<(), KernelError>;

    /// Replaces the stored record only if its version still equals `expected`.
    /// Returns the record as stored, carrying the advanced version. A stale
    /// `expected` yields `Concurrency`, a missing record `RecordNotFound`.
    async fn compare_and_swap(
        &self,
        con: &mut Self::Transaction,
        rental: &Rental,
        expected: &Version<Rental>,
    ) -> error_stack::Result<Rental, KernelError>;
}

pub trait DependOnRentalModifier: 'static + Sync + Send + DependOnDatabaseConnection {
    type RentalModifier: RentalModifier<
        Transaction = <Self::DatabaseConnection as DatabaseConnection>::Transaction,
    >;
    fn rental_modifier(&self) -> &Self::RentalModifier;
}
