use error_stack::Report;
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use kernel::interface::query::RentalQuery;
use kernel::interface::update::RentalModifier;
use kernel::prelude::entity::{
    LateFee, OverdueItem, Rental, RentalId, RentalStatus, RentedItem, ReturnedItem, UserId,
    Version,
};
use kernel::KernelError;

use crate::database::postgres::PostgresTransaction;
use crate::error::ConvertError;

pub struct PostgresRentalRepository;

#[async_trait::async_trait]
impl RentalQuery for PostgresRentalRepository {
    type Transaction = PostgresTransaction;

    async fn find_by_user_id(
        &self,
        con: &mut PostgresTransaction,
        user_id: &UserId,
    ) -> error_stack::Result<Option<Rental>, KernelError> {
        PgRentalInternal::find_by_user_id(con, user_id).await
    }
}

#[async_trait::async_trait]
impl RentalModifier for PostgresRentalRepository {
    type Transaction = PostgresTransaction;

    async fn create(
        &self,
        con: &mut PostgresTransaction,
        rental: &Rental,
    ) -> error_stack::Result<(), KernelError> {
        PgRentalInternal::create(con, rental).await
    }

    async fn compare_and_swap(
        &self,
        con: &mut PostgresTransaction,
        rental: &Rental,
        expected: &Version<Rental>,
    ) -> error_stack::Result<Rental, KernelError> {
        PgRentalInternal::compare_and_swap(con, rental, expected).await
    }
}

#[derive(sqlx::FromRow)]
struct RentalRow {
    id: Uuid,
    user_id: Uuid,
    status: String,
    late_fee: i64,
    rented_items: Json<Vec<RentedItem>>,
    overdue_items: Json<Vec<OverdueItem>>,
    returned_items: Json<Vec<ReturnedItem>>,
    version: i64,
}

impl TryFrom<RentalRow> for Rental {
    type Error = Report<KernelError>;
    fn try_from(row: RentalRow) -> Result<Self, Self::Error> {
        Ok(Rental::new(
            RentalId::new(row.id),
            UserId::new(row.user_id),
            RentalStatus::try_from(row.status.as_str())?,
            LateFee::new(row.late_fee),
            row.rented_items.0,
            row.overdue_items.0,
            row.returned_items.0,
            Version::new(row.version),
        ))
    }
}

pub(in crate::database) struct PgRentalInternal;

impl PgRentalInternal {
    async fn find_by_user_id(
        con: &mut PgConnection,
        user_id: &UserId,
    ) -> error_stack::Result<Option<Rental>, KernelError> {
        let row = sqlx::query_as::<_, RentalRow>(
            // language=postgresql
            r#"
            SELECT id, user_id, status, late_fee, rented_items, overdue_items, returned_items, version
            FROM rentals
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        row.map(Rental::try_from).transpose()
    }

    async fn create(con: &mut PgConnection, rental: &Rental) -> error_stack::Result<(), KernelError> {
        let result = sqlx::query(
            // language=postgresql
            r#"
            INSERT INTO rentals (id, user_id, status, late_fee, rented_items, overdue_items, returned_items, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(rental.id().as_ref())
        .bind(rental.user_id().as_ref())
        .bind(rental.status().as_str())
        .bind(rental.late_fee().as_ref())
        .bind(Json(rental.rented_items()))
        .bind(Json(rental.overdue_items()))
        .bind(Json(rental.returned_items()))
        .bind(rental.version().as_ref())
        .execute(con)
        .await
        .convert_error()?;
        if result.rows_affected() == 0 {
            return Err(Report::new(KernelError::Concurrency).attach_printable(format!(
                "Rental already exists for user: {}",
                rental.user_id().as_ref()
            )));
        }
        Ok(())
    }

    async fn compare_and_swap(
        con: &mut PgConnection,
        rental: &Rental,
        expected: &Version<Rental>,
    ) -> error_stack::Result<Rental, KernelError> {
        let next = expected.next();
        let result = sqlx::query(
            // language=postgresql
            r#"
            UPDATE rentals
            SET status = $3, late_fee = $4, rented_items = $5, overdue_items = $6, returned_items = $7, version = $8
            WHERE user_id = $1 AND version = $2
            "#,
        )
        .bind(rental.user_id().as_ref())
        .bind(expected.as_ref())
        .bind(rental.status().as_str())
        .bind(rental.late_fee().as_ref())
        .bind(Json(rental.rented_items()))
        .bind(Json(rental.overdue_items()))
        .bind(Json(rental.returned_items()))
        .bind(next.as_ref())
        .execute(&mut *con)
        .await
        .convert_error()?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar(
                // language=postgresql
                r#"
                SELECT EXISTS (SELECT 1 FROM rentals WHERE user_id = $1)
                "#,
            )
            .bind(rental.user_id().as_ref())
            .fetch_one(&mut *con)
            .await
            .convert_error()?;
            let context = if exists {
                KernelError::Concurrency
            } else {
                KernelError::RecordNotFound
            };
            return Err(Report::new(context).attach_printable(format!(
                "Expected version {} for user {}",
                expected.as_ref(),
                rental.user_id().as_ref()
            )));
        }

        let mut stored = rental.clone();
        stored.substitute(|rental| *rental.version = next);
        Ok(stored)
    }
}
