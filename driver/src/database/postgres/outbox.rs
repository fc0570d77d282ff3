use error_stack::ResultExt;
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use kernel::interface::event::{RentalNotification, StagedNotification};
use kernel::interface::mq::ErroredInfo;
use kernel::interface::query::OutboxQuery;
use kernel::interface::update::OutboxModifier;
use kernel::KernelError;

use crate::database::postgres::PostgresTransaction;
use crate::error::ConvertError;

pub struct PostgresOutboxRepository;

#[async_trait::async_trait]
impl OutboxQuery for PostgresOutboxRepository {
    type Transaction = PostgresTransaction;

    async fn find_pending(
        &self,
        con: &mut PostgresTransaction,
        limit: i64,
    ) -> error_stack::Result<Vec<StagedNotification>, KernelError> {
        PgOutboxInternal::find_pending(con, limit).await
    }

    async fn count_pending(
        &self,
        con: &mut PostgresTransaction,
    ) -> error_stack::Result<usize, KernelError> {
        PgOutboxInternal::count(con, false).await
    }

    async fn find_stranded(
        &self,
        con: &mut PostgresTransaction,
        size: i64,
        offset: i64,
    ) -> error_stack::Result<Vec<ErroredInfo<RentalNotification>>, KernelError> {
        PgOutboxInternal::find_stranded(con, size, offset).await
    }

    async fn count_stranded(
        &self,
        con: &mut PostgresTransaction,
    ) -> error_stack::Result<usize, KernelError> {
        PgOutboxInternal::count(con, true).await
    }
}

#[async_trait::async_trait]
impl OutboxModifier for PostgresOutboxRepository {
    type Transaction = PostgresTransaction;

    async fn stage(
        &self,
        con: &mut PostgresTransaction,
        notifications: &[RentalNotification],
    ) -> error_stack::Result<(), KernelError> {
        PgOutboxInternal::stage(con, notifications).await
    }

    async fn remove(
        &self,
        con: &mut PostgresTransaction,
        id: &Uuid,
    ) -> error_stack::Result<(), KernelError> {
        PgOutboxInternal::remove(con, id).await
    }

    async fn record_failure(
        &self,
        con: &mut PostgresTransaction,
        id: &Uuid,
        stack_trace: &str,
        strand: bool,
    ) -> error_stack::Result<(), KernelError> {
        PgOutboxInternal::record_failure(con, id, stack_trace, strand).await
    }
}

#[derive(sqlx::FromRow)]
struct StagedRow {
    id: Uuid,
    notification: Json<RentalNotification>,
    attempts: i64,
}

impl From<StagedRow> for StagedNotification {
    fn from(row: StagedRow) -> Self {
        StagedNotification::new(row.id, row.notification.0, row.attempts)
    }
}

#[derive(sqlx::FromRow)]
struct StrandedRow {
    id: Uuid,
    notification: Json<RentalNotification>,
    attempts: i64,
    stack_trace: String,
}

impl From<StrandedRow> for ErroredInfo<RentalNotification> {
    fn from(row: StrandedRow) -> Self {
        ErroredInfo::new(row.id, row.notification.0, row.attempts, row.stack_trace)
    }
}

pub(in crate::database) struct PgOutboxInternal;

impl PgOutboxInternal {
    async fn stage(
        con: &mut PgConnection,
        notifications: &[RentalNotification],
    ) -> error_stack::Result<(), KernelError> {
        for notification in notifications {
            sqlx::query(
                // language=postgresql
                r#"
                INSERT INTO outbox (id, notification)
                VALUES ($1, $2)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(Json(notification))
            .execute(&mut *con)
            .await
            .convert_error()?;
        }
        Ok(())
    }

    // Rows stay locked until the relay's transaction ends, so concurrent
    // relays split the backlog instead of queueing it twice.
    async fn find_pending(
        con: &mut PgConnection,
        limit: i64,
    ) -> error_stack::Result<Vec<StagedNotification>, KernelError> {
        let rows = sqlx::query_as::<_, StagedRow>(
            // language=postgresql
            r#"
            SELECT id, notification, attempts
            FROM outbox
            WHERE NOT stranded
            ORDER BY seq
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(limit)
        .fetch_all(con)
        .await
        .convert_error()?;
        Ok(rows.into_iter().map(StagedNotification::from).collect())
    }

    async fn find_stranded(
        con: &mut PgConnection,
        size: i64,
        offset: i64,
    ) -> error_stack::Result<Vec<ErroredInfo<RentalNotification>>, KernelError> {
        let rows = sqlx::query_as::<_, StrandedRow>(
            // language=postgresql
            r#"
            SELECT id, notification, attempts, stack_trace
            FROM outbox
            WHERE stranded
            ORDER BY seq
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(size)
        .bind(offset)
        .fetch_all(con)
        .await
        .convert_error()?;
        Ok(rows.into_iter().map(ErroredInfo::from).collect())
    }

    async fn count(con: &mut PgConnection, stranded: bool) -> error_stack::Result<usize, KernelError> {
        let count: i64 = sqlx::query_scalar(
            // language=postgresql
            r#"
            SELECT COUNT(*) FROM outbox WHERE stranded = $1
            "#,
        )
        .bind(stranded)
        .fetch_one(con)
        .await
        .convert_error()?;
        usize::try_from(count).change_context_lazy(|| KernelError::Internal)
    }

    async fn remove(con: &mut PgConnection, id: &Uuid) -> error_stack::Result<(), KernelError> {
        sqlx::query(
            // language=postgresql
            r#"
            DELETE FROM outbox WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn record_failure(
        con: &mut PgConnection,
        id: &Uuid,
        stack_trace: &str,
        strand: bool,
    ) -> error_stack::Result<(), KernelError> {
        sqlx::query(
            // language=postgresql
            r#"
            UPDATE outbox
            SET attempts = attempts + 1, stack_trace = $2, stranded = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(stack_trace)
        .bind(strand)
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use kernel::interface::database::{DatabaseConnection, Transaction};
    use kernel::interface::event::RentalNotification;
    use kernel::interface::query::OutboxQuery;
    use kernel::interface::update::OutboxModifier;
    use kernel::prelude::entity::ItemId;
    use kernel::KernelError;

    use crate::database::postgres::{PostgresDatabase, PostgresOutboxRepository};

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn staged_rows_are_relayable_until_stranded() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        db.migrate().await?;
        let mut con = db.transact().await?;

        let before = PostgresOutboxRepository.count_pending(&mut con).await?;
        let batch = RentalNotification::item_back(ItemId::new(Uuid::new_v4()));
        PostgresOutboxRepository.stage(&mut con, &batch).await?;
        assert_eq!(
            PostgresOutboxRepository.count_pending(&mut con).await?,
            before + 2
        );

        let pending = PostgresOutboxRepository.find_pending(&mut con, 1000).await?;
        let ours = pending
            .iter()
            .filter(|entry| batch.contains(entry.notification()))
            .collect::<Vec<_>>();
        assert_eq!(ours.len(), 2);

        PostgresOutboxRepository
            .record_failure(&mut con, ours[0].id(), "refused", true)
            .await?;
        PostgresOutboxRepository.remove(&mut con, ours[1].id()).await?;
        assert_eq!(PostgresOutboxRepository.count_pending(&mut con).await?, before);

        let stranded = PostgresOutboxRepository
            .find_stranded(&mut con, 1000, 0)
            .await?;
        assert!(stranded.iter().any(|info| info.id() == ours[0].id()));

        con.roll_back().await?;
        Ok(())
    }
}
