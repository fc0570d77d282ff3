use error_stack::Report;
use kernel::interface::event::{RentalNotification, StagedNotification};
use kernel::interface::mq::ErroredInfo;
use kernel::interface::query::OutboxQuery;
use kernel::interface::update::OutboxModifier;
use kernel::KernelError;
use uuid::Uuid;

use crate::database::memory::{InMemoryTransaction, Write};

pub struct InMemoryOutboxRepository;

fn to_usize(value: i64) -> error_stack::Result<usize, KernelError> {
    usize::try_from(value).map_err(|_| {
        Report::new(KernelError::InvalidArgument).attach_printable(format!("value: {value}"))
    })
}

#[async_trait::async_trait]
impl OutboxQuery for InMemoryOutboxRepository {
    type Transaction = InMemoryTransaction;

    async fn find_pending(
        &self,
        con: &mut InMemoryTransaction,
        limit: i64,
    ) -> error_stack::Result<Vec<StagedNotification>, KernelError> {
        let limit = to_usize(limit)?;
        let store = con.store.read().await;
        Ok(store
            .outbox
            .values()
            .filter(|entry| !entry.stranded)
            .take(limit)
            .map(|entry| {
                StagedNotification::new(entry.id, entry.notification.clone(), entry.attempts)
            })
            .collect())
    }

    async fn count_pending(
        &self,
        con: &mut InMemoryTransaction,
    ) -> error_stack::Result<usize, KernelError> {
        let store = con.store.read().await;
        Ok(store.outbox.values().filter(|entry| !entry.stranded).count())
    }

    async fn find_stranded(
        &self,
        con: &mut InMemoryTransaction,
        size: i64,
        offset: i64,
    ) -> error_stack::Result<Vec<ErroredInfo<RentalNotification>>, KernelError> {
        let (size, offset) = (to_usize(size)?, to_usize(offset)?);
        let store = con.store.read().await;
        Ok(store
            .outbox
            .values()
            .filter(|entry| entry.stranded)
            .skip(offset)
            .take(size)
            .map(|entry| {
                ErroredInfo::new(
                    entry.id,
                    entry.notification.clone(),
                    entry.attempts,
                    entry.stack_trace.clone(),
                )
            })
            .collect())
    }

    async fn count_stranded(
        &self,
        con: &mut InMemoryTransaction,
    ) -> error_stack::Result<usize, KernelError> {
        let store = con.store.read().await;
        Ok(store.outbox.values().filter(|entry| entry.stranded).count())
    }
}

#[async_trait::async_trait]
impl OutboxModifier for InMemoryOutboxRepository {
    type Transaction = InMemoryTransaction;

    async fn stage(
        &self,
        con: &mut InMemoryTransaction,
        notifications: &[RentalNotification],
    ) -> error_stack::Result<(), KernelError> {
        let entries = notifications
            .iter()
            .map(|notification| (Uuid::new_v4(), notification.clone()))
            .collect();
        con.writes.push(Write::Stage(entries));
        Ok(())
    }

    async fn remove(
        &self,
        con: &mut InMemoryTransaction,
        id: &Uuid,
    ) -> error_stack::Result<(), KernelError> {
        con.writes.push(Write::Remove(*id));
        Ok(())
    }

    async fn record_failure(
        &self,
        con: &mut InMemoryTransaction,
        id: &Uuid,
        stack_trace: &str,
        strand: bool,
    ) -> error_stack::Result<(), KernelError> {
        con.writes.push(Write::Failure {
            id: *id,
            stack_trace: stack_trace.to_string(),
            strand,
        });
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use kernel::interface::database::{DatabaseConnection, Transaction};
    use kernel::interface::event::RentalNotification;
    use kernel::interface::query::OutboxQuery;
    use kernel::interface::update::OutboxModifier;
    use kernel::prelude::entity::ItemId;
    use kernel::KernelError;
    use uuid::Uuid;

    use crate::database::memory::{InMemoryDatabase, InMemoryOutboxRepository};

    #[tokio::test]
    async fn staged_entries_appear_on_commit_in_order() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let batch = RentalNotification::item_taken(ItemId::new(Uuid::new_v4()));

        let mut dropped = db.transact().await?;
        InMemoryOutboxRepository.stage(&mut dropped, &batch).await?;
        drop(dropped);

        let mut con = db.transact().await?;
        InMemoryOutboxRepository.stage(&mut con, &batch).await?;
        assert_eq!(InMemoryOutboxRepository.count_pending(&mut con).await?, 0);
        con.commit().await?;

        let mut con = db.transact().await?;
        let pending = InMemoryOutboxRepository.find_pending(&mut con, 10).await?;
        let staged = pending
            .iter()
            .map(|entry| entry.notification().clone())
            .collect::<Vec<_>>();
        assert_eq!(staged, batch.to_vec());

        let first = *pending[0].id();
        InMemoryOutboxRepository
            .record_failure(&mut con, &first, "refused", true)
            .await?;
        con.commit().await?;

        let mut con = db.transact().await?;
        assert_eq!(InMemoryOutboxRepository.count_pending(&mut con).await?, 1);
        let stranded = InMemoryOutboxRepository.find_stranded(&mut con, 10, 0).await?;
        assert_eq!(stranded.len(), 1);
        assert_eq!(*stranded[0].id(), first);
        assert_eq!(*stranded[0].attempts(), 1);
        assert_eq!(stranded[0].stack_trace(), "refused");
        Ok(())
    }
}
