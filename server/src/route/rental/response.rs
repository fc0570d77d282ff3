use application::transfer::{OverdueItemDto, RentalDto, RentedItemDto, ReturnedItemDto};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use time::Date;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct RentalResponse {
    id: Uuid,
    user_id: Uuid,
    status: String,
    late_fee: i64,
    rented_items: Vec<RentedItemResponse>,
    overdue_items: Vec<OverdueItemResponse>,
    returned_items: Vec<ReturnedItemResponse>,
    version: i64,
}

#[derive(Debug, Serialize)]
pub struct RentedItemResponse {
    item_id: Uuid,
    title: String,
    rented_date: Date,
    due_date: Date,
}

#[derive(Debug, Serialize)]
pub struct OverdueItemResponse {
    item_id: Uuid,
    title: String,
    original_due_date: Date,
}

#[derive(Debug, Serialize)]
pub struct ReturnedItemResponse {
    item_id: Uuid,
    returned_date: Date,
}

impl From<RentalDto> for RentalResponse {
    fn from(dto: RentalDto) -> Self {
        Self {
            id: dto.id,
            user_id: dto.user_id,
            status: dto.status,
            late_fee: dto.late_fee,
            rented_items: dto.rented_items.into_iter().map(Into::into).collect(),
            overdue_items: dto.overdue_items.into_iter().map(Into::into).collect(),
            returned_items: dto.returned_items.into_iter().map(Into::into).collect(),
            version: dto.version,
        }
    }
}

impl From<RentedItemDto> for RentedItemResponse {
    fn from(dto: RentedItemDto) -> Self {
        Self {
            item_id: dto.item_id,
            title: dto.title,
            rented_date: dto.rented_date,
            due_date: dto.due_date,
        }
    }
}

impl From<OverdueItemDto> for OverdueItemResponse {
    fn from(dto: OverdueItemDto) -> Self {
        Self {
            item_id: dto.item_id,
            title: dto.title,
            original_due_date: dto.original_due_date,
        }
    }
}

impl From<ReturnedItemDto> for ReturnedItemResponse {
    fn from(dto: ReturnedItemDto) -> Self {
        Self {
            item_id: dto.item_id,
            returned_date: dto.returned_date,
        }
    }
}

impl IntoResponse for RentalResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, axum::Json(self)).into_response()
    }
}
