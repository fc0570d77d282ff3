use application::transfer::{
    ChargeLateFeeDto, MarkOverdueDto, ReleaseDto, RentBookDto, ReturnBookDto,
    ReturnOverdueBookDto,
};
use serde::Deserialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ItemPath {
    pub user_id: Uuid,
    pub item_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ChargeRequest {
    pub amount: i64,
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

impl ItemPath {
    pub fn rent(self) -> RentBookDto {
        RentBookDto {
            user_id: self.user_id,
            item_id: self.item_id,
            today: today(),
        }
    }

    pub fn return_book(self) -> ReturnBookDto {
        ReturnBookDto {
            user_id: self.user_id,
            item_id: self.item_id,
            today: today(),
        }
    }

    pub fn mark_overdue(self) -> MarkOverdueDto {
        MarkOverdueDto {
            user_id: self.user_id,
            item_id: self.item_id,
        }
    }

    pub fn return_overdue(self) -> ReturnOverdueBookDto {
        ReturnOverdueBookDto {
            user_id: self.user_id,
            item_id: self.item_id,
            today: today(),
        }
    }
}

impl ChargeRequest {
    pub fn into_dto(self, user_id: Uuid) -> ChargeLateFeeDto {
        ChargeLateFeeDto {
            user_id,
            amount: self.amount,
        }
    }
}

pub fn release(user_id: Uuid) -> ReleaseDto {
    ReleaseDto { user_id }
}
