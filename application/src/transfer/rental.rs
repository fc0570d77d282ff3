use kernel::prelude::entity::{
    DestructOverdueItem, DestructRental, DestructRentedItem, DestructReturnedItem, OverdueItem,
    Rental, RentedItem, ReturnedItem,
};
use time::Date;
use uuid::Uuid;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RentalDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub late_fee: i64,
    pub rented_items: Vec<RentedItemDto>,
    pub overdue_items: Vec<OverdueItemDto>,
    pub returned_items: Vec<ReturnedItemDto>,
    pub version: i64,
}

impl From<Rental> for RentalDto {
    fn from(value: Rental) -> Self {
        let DestructRental {
            id,
            user_id,
            status,
            late_fee,
            rented_items,
            overdue_items,
            returned_items,
            version,
        } = value.into_destruct();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            status: status.as_str().to_string(),
            late_fee: late_fee.into(),
            rented_items: rented_items.into_iter().map(RentedItemDto::from).collect(),
            overdue_items: overdue_items.into_iter().map(OverdueItemDto::from).collect(),
            returned_items: returned_items
                .into_iter()
                .map(ReturnedItemDto::from)
                .collect(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RentedItemDto {
    pub item_id: Uuid,
    pub title: String,
    pub rented_date: Date,
    pub due_date: Date,
}

impl From<RentedItem> for RentedItemDto {
    fn from(value: RentedItem) -> Self {
        let DestructRentedItem {
            item_id,
            title,
            rented_date,
            due_date,
        } = value.into_destruct();
        Self {
            item_id: item_id.into(),
            title: title.into(),
            rented_date,
            due_date,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OverdueItemDto {
    pub item_id: Uuid,
    pub title: String,
    pub original_due_date: Date,
}

impl From<OverdueItem> for OverdueItemDto {
    fn from(value: OverdueItem) -> Self {
        let DestructOverdueItem {
            item_id,
            title,
            original_due_date,
        } = value.into_destruct();
        Self {
            item_id: item_id.into(),
            title: title.into(),
            original_due_date,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReturnedItemDto {
    pub item_id: Uuid,
    pub returned_date: Date,
}

impl From<ReturnedItem> for ReturnedItemDto {
    fn from(value: ReturnedItem) -> Self {
        let DestructReturnedItem {
            item_id,
            returned_date,
        } = value.into_destruct();
        Self {
            item_id: item_id.into(),
            returned_date,
        }
    }
}

pub struct CreateRentalDto {
    pub user_id: Uuid,
}

pub struct GetRentalDto {
    pub user_id: Uuid,
}

pub struct RentBookDto {
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub today: Date,
}

pub struct ReturnBookDto {
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub today: Date,
}

pub struct MarkOverdueDto {
    pub user_id: Uuid,
    pub item_id: Uuid,
}

pub struct ReturnOverdueBookDto {
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub today: Date,
}

pub struct ChargeLateFeeDto {
    pub user_id: Uuid,
    pub amount: i64,
}

pub struct ReleaseDto {
    pub user_id: Uuid,
}
