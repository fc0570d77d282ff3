mod request;
mod response;

use crate::error::ErrorStatus;
use crate::handler::AppModule;
use crate::route::rental::request::{release, ChargeRequest, ItemPath};
use crate::route::rental::response::RentalResponse;
use application::service::{
    ChargeLateFeeService, CreateRentalService, GetRentalService, MarkOverdueService,
    ReleaseService, RentBookService, ReturnBookService, ReturnOverdueBookService,
};
use application::transfer::{CreateRentalDto, GetRentalDto};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use uuid::Uuid;

pub trait RentalRouter {
    fn route_rental(self) -> Self;
}

impl RentalRouter for Router<AppModule> {
    fn route_rental(self) -> Self {
        self.route(
            "/rentals/:user_id",
            post(
                |State(handler): State<AppModule>, Path(user_id): Path<Uuid>| async move {
                    handler
                        .create_rental(CreateRentalDto { user_id })
                        .await
                        .map(|dto| (StatusCode::CREATED, Json(RentalResponse::from(dto))))
                        .map_err(ErrorStatus::from)
                },
            )
            .get(
                |State(handler): State<AppModule>, Path(user_id): Path<Uuid>| async move {
                    handler
                        .get_rental(GetRentalDto { user_id })
                        .await
                        .map_err(ErrorStatus::from)
                        .map(|dto| match dto {
                            Some(dto) => RentalResponse::from(dto).into_response(),
                            None => StatusCode::NOT_FOUND.into_response(),
                        })
                },
            ),
        )
        .route(
            "/rentals/:user_id/items/:item_id",
            post(
                |State(handler): State<AppModule>, Path(path): Path<ItemPath>| async move {
                    handler
                        .rent_book(path.rent())
                        .await
                        .map(RentalResponse::from)
                        .map_err(ErrorStatus::from)
                },
            )
            .delete(
                |State(handler): State<AppModule>, Path(path): Path<ItemPath>| async move {
                    handler
                        .return_book(path.return_book())
                        .await
                        .map(RentalResponse::from)
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/rentals/:user_id/overdue/:item_id",
            post(
                |State(handler): State<AppModule>, Path(path): Path<ItemPath>| async move {
                    handler
                        .mark_overdue(path.mark_overdue())
                        .await
                        .map(RentalResponse::from)
                        .map_err(ErrorStatus::from)
                },
            )
            .delete(
                |State(handler): State<AppModule>, Path(path): Path<ItemPath>| async move {
                    handler
                        .return_overdue_book(path.return_overdue())
                        .await
                        .map(RentalResponse::from)
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/rentals/:user_id/fee",
            post(
                |State(handler): State<AppModule>,
                 Path(user_id): Path<Uuid>,
                 Json(req): Json<ChargeRequest>| async move {
                    handler
                        .charge_late_fee(req.into_dto(user_id))
                        .await
                        .map(RentalResponse::from)
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/rentals/:user_id/release",
            post(
                |State(handler): State<AppModule>, Path(user_id): Path<Uuid>| async move {
                    handler
                        .release(release(user_id))
                        .await
                        .map(RentalResponse::from)
                        .map_err(ErrorStatus::from)
                },
            ),
        )
    }
}
