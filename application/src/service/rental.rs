use crate::service::transition::within;
use crate::service::ApplyTransition;
use crate::transfer::{
    ChargeLateFeeDto, CreateRentalDto, GetRentalDto, MarkOverdueDto, ReleaseDto, RentBookDto,
    RentalDto, ReturnBookDto, ReturnOverdueBookDto,
};
use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use kernel::interface::lookup::{DependOnItemLookup, ItemLookup};
use kernel::interface::query::{DependOnRentalQuery, RentalQuery};
use kernel::interface::update::{DependOnRentalModifier, RentalModifier};
use kernel::prelude::config::{DependOnRentalPolicy, DependOnUseCaseConfig};
use kernel::prelude::entity::{ItemId, LateFee, Rental, RentalId, UserId};
use kernel::KernelError;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait CreateRentalService:
    'static + Sync + Send + DependOnDatabaseConnection + DependOnRentalModifier + DependOnUseCaseConfig
{
    #[tracing::instrument(skip_all, fields(user_id = %dto.user_id))]
    async fn create_rental(&self, dto: CreateRentalDto) -> error_stack::Result<RentalDto, KernelError> {
        let rental = Rental::provision(RentalId::new(Uuid::new_v4()), UserId::new(dto.user_id));
        within(*self.use_case_config().persist_timeout(), async {
            let mut con = self.database_connection().transact().await?;
            self.rental_modifier().create(&mut con, &rental).await?;
            con.commit().await
        })
        .await?;
        Ok(RentalDto::from(rental))
    }
}

impl<T> CreateRentalService for T where
    T: DependOnDatabaseConnection + DependOnRentalModifier + DependOnUseCaseConfig
{
}

#[async_trait::async_trait]
pub trait GetRentalService:
    'static + Sync + Send + DependOnDatabaseConnection + DependOnRentalQuery + DependOnUseCaseConfig
{
    async fn get_rental(
        &self,
        dto: GetRentalDto,
    ) -> error_stack::Result<Option<RentalDto>, KernelError> {
        let user_id = UserId::new(dto.user_id);
        let rental = within(*self.use_case_config().persist_timeout(), async {
            let mut con = self.database_connection().transact().await?;
            self.rental_query().find_by_user_id(&mut con, &user_id).await
        })
        .await?;
        Ok(rental.map(RentalDto::from))
    }
}

impl<T> GetRentalService for T where
    T: DependOnDatabaseConnection + DependOnRentalQuery + DependOnUseCaseConfig
{
}

#[async_trait::async_trait]
pub trait RentBookService: ApplyTransition + DependOnItemLookup + DependOnRentalPolicy {
    #[tracing::instrument(skip_all, fields(user_id = %dto.user_id, item_id = %dto.item_id))]
    async fn rent_book(&self, dto: RentBookDto) -> error_stack::Result<RentalDto, KernelError> {
        let item = self
            .item_lookup()
            .find_item(&ItemId::new(dto.item_id))
            .await?;
        let policy = self.rental_policy();
        let rental = self
            .apply_transition(&UserId::new(dto.user_id), |rental| {
                rental.rent(policy, item.clone(), dto.today)
            })
            .await?;
        Ok(RentalDto::from(rental))
    }
}

impl<T> RentBookService for T where T: ApplyTransition + DependOnItemLookup + DependOnRentalPolicy {}

#[async_trait::async_trait]
pub trait ReturnBookService: ApplyTransition {
    #[tracing::instrument(skip_all, fields(user_id = %dto.user_id, item_id = %dto.item_id))]
    async fn return_book(&self, dto: ReturnBookDto) -> error_stack::Result<RentalDto, KernelError> {
        let item_id = ItemId::new(dto.item_id);
        let rental = self
            .apply_transition(&UserId::new(dto.user_id), |rental| {
                rental.return_item(&item_id, dto.today)
            })
            .await?;
        Ok(RentalDto::from(rental))
    }
}

impl<T> ReturnBookService for T where T: ApplyTransition {}

#[async_trait::async_trait]
pub trait MarkOverdueService: ApplyTransition {
    #[tracing::instrument(skip_all, fields(user_id = %dto.user_id, item_id = %dto.item_id))]
    async fn mark_overdue(&self, dto: MarkOverdueDto) -> error_stack::Result<RentalDto, KernelError> {
        let item_id = ItemId::new(dto.item_id);
        let rental = self
            .apply_transition(&UserId::new(dto.user_id), |rental| {
                rental.mark_overdue(&item_id)
            })
            .await?;
        Ok(RentalDto::from(rental))
    }
}

impl<T> MarkOverdueService for T where T: ApplyTransition {}

#[async_trait::async_trait]
pub trait ReturnOverdueBookService: ApplyTransition {
    #[tracing::instrument(skip_all, fields(user_id = %dto.user_id, item_id = %dto.item_id))]
    async fn return_overdue_book(
        &self,
        dto: ReturnOverdueBookDto,
    ) -> error_stack::Result<RentalDto, KernelError> {
        let item_id = ItemId::new(dto.item_id);
        let rental = self
            .apply_transition(&UserId::new(dto.user_id), |rental| {
                rental.return_overdue_item(&item_id, dto.today)
            })
            .await?;
        Ok(RentalDto::from(rental))
    }
}

impl<T> ReturnOverdueBookService for T where T: ApplyTransition {}

#[async_trait::async_trait]
pub trait ChargeLateFeeService: ApplyTransition {
    #[tracing::instrument(skip_all, fields(user_id = %dto.user_id, amount = dto.amount))]
    async fn charge_late_fee(
        &self,
        dto: ChargeLateFeeDto,
    ) -> error_stack::Result<RentalDto, KernelError> {
        let fee = LateFee::new(dto.amount);
        let rental = self
            .apply_transition(&UserId::new(dto.user_id), |rental| {
                rental.charge_late_fee(fee)
            })
            .await?;
        Ok(RentalDto::from(rental))
    }
}

impl<T> ChargeLateFeeService for T where T: ApplyTransition {}

#[async_trait::async_trait]
pub trait ReleaseService: ApplyTransition {
    #[tracing::instrument(skip_all, fields(user_id = %dto.user_id))]
    async fn release(&self, dto: ReleaseDto) -> error_stack::Result<RentalDto, KernelError> {
        let rental = self
            .apply_transition(&UserId::new(dto.user_id), |rental| Ok(rental.release()))
            .await?;
        Ok(RentalDto::from(rental))
    }
}

impl<T> ReleaseService for T where T: ApplyTransition {}
