use error_stack::Report;
use kernel::interface::query::RentalQuery;
use kernel::interface::update::RentalModifier;
use kernel::prelude::entity::{Rental, UserId, Version};
use kernel::KernelError;

use crate::database::memory::{InMemoryTransaction, Write};

pub struct InMemoryRentalRepository;

#[async_trait::async_trait]
impl RentalQuery for InMemoryRentalRepository {
    type Transaction = InMemoryTransaction;

    async fn find_by_user_id(
        &self,
        con: &mut InMemoryTransaction,
        user_id: &UserId,
    ) -> error_stack::Result<Option<Rental>, KernelError> {
        Ok(con.visible(user_id).await)
    }
}

#[async_trait::async_trait]
impl RentalModifier for InMemoryRentalRepository {
    type Transaction = InMemoryTransaction;

    async fn create(
        &self,
        con: &mut InMemoryTransaction,
        rental: &Rental,
    ) -> error_stack::Result<(), KernelError> {
        if con.visible(rental.user_id()).await.is_some() {
            return Err(Report::new(KernelError::Concurrency).attach_printable(format!(
                "Rental already exists for user: {}",
                rental.user_id().as_ref()
            )));
        }
        con.writes.push(Write::Insert(rental.clone()));
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        con: &mut InMemoryTransaction,
        rental: &Rental,
        expected: &Version<Rental>,
    ) -> error_stack::Result<Rental, KernelError> {
        let Some(current) = con.visible(rental.user_id()).await else {
            return Err(Report::new(KernelError::RecordNotFound).attach_printable(format!(
                "No rental for user: {}",
                rental.user_id().as_ref()
            )));
        };
        if current.version() != expected {
            return Err(Report::new(KernelError::Concurrency).attach_printable(format!(
                "Expected version {} but found {}",
                expected.as_ref(),
                current.version().as_ref()
            )));
        }
        let mut stored = rental.clone();
        stored.substitute(|rental| *rental.version = expected.next());
        con.writes.push(Write::Swap {
            expected: expected.clone(),
            rental: stored.clone(),
        });
        Ok(stored)
    }
}

#[cfg(test)]
mod test {
    use time::macros::date;
    use uuid::Uuid;

    use kernel::interface::database::{DatabaseConnection, Transaction};
    use kernel::interface::query::RentalQuery;
    use kernel::interface::update::RentalModifier;
    use kernel::prelude::config::RentalPolicy;
    use kernel::prelude::entity::{ItemId, ItemInfo, ItemTitle, Rental, RentalId, UserId};
    use kernel::KernelError;

    use crate::database::memory::{InMemoryDatabase, InMemoryRentalRepository};

    #[tokio::test]
    async fn swap_bumps_version_once() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let mut con = db.transact().await?;
        let user_id = UserId::new(Uuid::new_v4());
        let rental = Rental::provision(RentalId::new(Uuid::new_v4()), user_id.clone());
        InMemoryRentalRepository.create(&mut con, &rental).await?;

        let item = ItemInfo::new(ItemId::new(Uuid::new_v4()), ItemTitle::new("Book A"));
        let next = rental
            .rent(&RentalPolicy::default(), item, date!(2024 - 01 - 01))?
            .into_destruct()
            .rental;

        let stored = InMemoryRentalRepository
            .compare_and_swap(&mut con, &next, rental.version())
            .await?;
        assert_eq!(stored.version(), &rental.version().next());

        let stale = InMemoryRentalRepository
            .compare_and_swap(&mut con, &next, rental.version())
            .await;
        assert!(matches!(
            stale.map_err(|e| *e.current_context()),
            Err(KernelError::Concurrency)
        ));

        let found = InMemoryRentalRepository
            .find_by_user_id(&mut con, &user_id)
            .await?;
        assert_eq!(found, Some(stored));
        Ok(())
    }

    #[tokio::test]
    async fn swap_on_missing_record_is_not_found() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let mut con = db.transact().await?;
        let rental = Rental::provision(RentalId::new(Uuid::new_v4()), UserId::new(Uuid::new_v4()));
        let result = InMemoryRentalRepository
            .compare_and_swap(&mut con, &rental, rental.version())
            .await;
        assert!(matches!(
            result.map_err(|e| *e.current_context()),
            Err(KernelError::RecordNotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let mut con = db.transact().await?;
        let rental = Rental::provision(RentalId::new(Uuid::new_v4()), UserId::new(Uuid::new_v4()));
        InMemoryRentalRepository.create(&mut con, &rental).await?;
        let result = InMemoryRentalRepository.create(&mut con, &rental).await;
        assert!(matches!(
            result.map_err(|e| *e.current_context()),
            Err(KernelError::Concurrency)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let rental = Rental::provision(RentalId::new(Uuid::new_v4()), UserId::new(Uuid::new_v4()));
        let mut con = db.transact().await?;
        InMemoryRentalRepository.create(&mut con, &rental).await?;

        let mut other = db.transact().await?;
        assert!(InMemoryRentalRepository
            .find_by_user_id(&mut other, rental.user_id())
            .await?
            .is_none());
        drop(con);
        assert!(InMemoryRentalRepository
            .find_by_user_id(&mut other, rental.user_id())
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn commit_rejects_interleaved_swap() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let rental = Rental::provision(RentalId::new(Uuid::new_v4()), UserId::new(Uuid::new_v4()));
        let mut con = db.transact().await?;
        InMemoryRentalRepository.create(&mut con, &rental).await?;
        con.commit().await?;

        let policy = RentalPolicy::default();
        let rent = |title: &str| {
            let item = ItemInfo::new(ItemId::new(Uuid::new_v4()), ItemTitle::new(title));
            rental
                .rent(&policy, item, date!(2024 - 01 - 01))
                .map(|transition| transition.into_destruct().rental)
        };
        let first = rent("Book A")?;
        let second = rent("Book B")?;

        let mut winner = db.transact().await?;
        let mut loser = db.transact().await?;
        InMemoryRentalRepository
            .compare_and_swap(&mut winner, &first, rental.version())
            .await?;
        InMemoryRentalRepository
            .compare_and_swap(&mut loser, &second, rental.version())
            .await?;
        winner.commit().await?;
        let result = loser.commit().await;
        assert!(matches!(
            result.map_err(|e| *e.current_context()),
            Err(KernelError::Concurrency)
        ));

        let mut con = db.transact().await?;
        let found = InMemoryRentalRepository
            .find_by_user_id(&mut con, rental.user_id())
            .await?
            .ok_or_else(|| error_stack::Report::new(KernelError::RecordNotFound))?;
        assert_eq!(found.rented_items()[0].title(), &ItemTitle::new("Book A"));
        Ok(())
    }
}
