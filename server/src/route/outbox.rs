use crate::error::ErrorStatus;
use crate::handler::AppModule;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use kernel::interface::event::RentalNotification;
use kernel::interface::mq::{DestructErroredInfo, ErroredInfo, MessageQueue};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct OutboxStats {
    staged: usize,
    stranded: usize,
    queued: usize,
    delayed: usize,
    failed: usize,
}

#[derive(Debug, Deserialize)]
struct PageRequest {
    size: Option<i64>,
    offset: Option<i64>,
}

const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Serialize)]
struct ErroredResponse {
    id: Uuid,
    data: RentalNotification,
    attempts: i64,
    stack_trace: String,
}

impl From<ErroredInfo<RentalNotification>> for ErroredResponse {
    fn from(info: ErroredInfo<RentalNotification>) -> Self {
        let DestructErroredInfo {
            id,
            data,
            attempts,
            stack_trace,
        } = info.into_destruct();
        Self {
            id,
            data,
            attempts,
            stack_trace,
        }
    }
}

fn listing(infos: Vec<ErroredInfo<RentalNotification>>) -> Response {
    axum::Json(
        infos
            .into_iter()
            .map(ErroredResponse::from)
            .collect::<Vec<_>>(),
    )
    .into_response()
}

pub trait OutboxRouter {
    fn route_outbox(self) -> Self;
}

impl OutboxRouter for Router<AppModule> {
    fn route_outbox(self) -> Self {
        self.route(
            "/outbox",
            get(|State(module): State<AppModule>| async move {
                let outbox = module.outbox();
                let stats = OutboxStats {
                    staged: module.relay().pending_len().await?,
                    stranded: module.relay().stranded_len().await?,
                    queued: outbox.get_queued_len().await?,
                    delayed: outbox.get_delayed_len().await?,
                    failed: outbox.get_failed_len().await?,
                };
                Ok::<_, ErrorStatus>(axum::Json(stats))
            }),
        )
        .route(
            "/outbox/delayed",
            get(
                |State(module): State<AppModule>, Query(req): Query<PageRequest>| async move {
                    module
                        .outbox()
                        .get_delayed_infos(
                            &req.size.unwrap_or(DEFAULT_PAGE_SIZE),
                            &req.offset.unwrap_or(0),
                        )
                        .await
                        .map(listing)
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/outbox/failed",
            get(
                |State(module): State<AppModule>, Query(req): Query<PageRequest>| async move {
                    module
                        .outbox()
                        .get_failed_infos(
                            &req.size.unwrap_or(DEFAULT_PAGE_SIZE),
                            &req.offset.unwrap_or(0),
                        )
                        .await
                        .map(listing)
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/outbox/stranded",
            get(
                |State(module): State<AppModule>, Query(req): Query<PageRequest>| async move {
                    module
                        .relay()
                        .stranded_infos(
                            req.size.unwrap_or(DEFAULT_PAGE_SIZE),
                            req.offset.unwrap_or(0),
                        )
                        .await
                        .map(listing)
                        .map_err(ErrorStatus::from)
                },
            ),
        )
    }
}
