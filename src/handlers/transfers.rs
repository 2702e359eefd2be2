use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::{
    commands::transfers::{CreateTransferRequestCommand, TransferAction},
    errors::ServiceError,
    services::transfers::{
        StatusEntryView, TransferFilter, TransferRequestView, TransitionRequest,
    },
    ApiResponse, ApiResult, AppState,
};

pub fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transfers).post(create_transfer))
        .route("/tracking/:tracking_number", get(get_transfer_by_tracking))
        .route("/:id", get(get_transfer))
        .route("/:id/history", get(get_transfer_history))
        .route("/:id/approve", post(approve_transfer))
        .route("/:id/reject", post(reject_transfer))
        .route("/:id/ship", post(ship_transfer))
        .route("/:id/receive", post(receive_transfer))
        .route("/:id/cancel", post(cancel_transfer))
}

/// Request units from another center's listing. The units are reserved
/// immediately and the request starts out `pending`.
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = CreateTransferRequestCommand,
    responses(
        (status = 201, description = "Transfer request created", body = ApiResponse<TransferRequestView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item or center not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough available units", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    Json(command): Json<CreateTransferRequestCommand>,
) -> Result<(StatusCode, Json<ApiResponse<TransferRequestView>>), ServiceError> {
    let created = state.services.transfers.create(command).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/transfers",
    params(TransferFilter),
    responses(
        (status = 200, description = "Transfer requests returned, newest first", body = ApiResponse<Vec<TransferRequestView>>)
    ),
    tag = "transfers"
)]
pub async fn list_transfers(
    State(state): State<AppState>,
    Query(filter): Query<TransferFilter>,
) -> ApiResult<Vec<TransferRequestView>> {
    let transfers = state.services.transfers.list(filter).await?;
    Ok(Json(ApiResponse::success(transfers)))
}

#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    params(("id" = Uuid, Path, description = "Transfer request ID")),
    responses(
        (status = 200, description = "Transfer request returned", body = ApiResponse<TransferRequestView>),
        (status = 404, description = "Transfer request not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<TransferRequestView> {
    let transfer = state.services.transfers.get(id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

#[utoipa::path(
    get,
    path = "/api/v1/transfers/tracking/{tracking_number}",
    params(("tracking_number" = String, Path, description = "Tracking number, e.g. TRF-7Q2M9XK4D1AB")),
    responses(
        (status = 200, description = "Transfer request returned", body = ApiResponse<TransferRequestView>),
        (status = 404, description = "Transfer request not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn get_transfer_by_tracking(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> ApiResult<TransferRequestView> {
    let transfer = state
        .services
        .transfers
        .get_by_tracking_number(&tracking_number)
        .await?;
    Ok(Json(ApiResponse::success(transfer)))
}

#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}/history",
    params(("id" = Uuid, Path, description = "Transfer request ID")),
    responses(
        (status = 200, description = "Status history in sequence order", body = ApiResponse<Vec<StatusEntryView>>),
        (status = 404, description = "Transfer request not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn get_transfer_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<StatusEntryView>> {
    let history = state.services.transfers.history(id).await?;
    Ok(Json(ApiResponse::success(history)))
}

async fn transition(
    state: AppState,
    id: Uuid,
    action: TransferAction,
    body: Option<Json<TransitionRequest>>,
) -> ApiResult<TransferRequestView> {
    let note = body.and_then(|Json(req)| req.note);
    let transfer = state.services.transfers.transition(id, action, note).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/approve",
    params(("id" = Uuid, Path, description = "Transfer request ID")),
    request_body(content = TransitionRequest, description = "Optional note for the history entry"),
    responses(
        (status = 200, description = "Transfer request approved", body = ApiResponse<TransferRequestView>),
        (status = 404, description = "Transfer request not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed from the current status", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn approve_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<TransitionRequest>>,
) -> ApiResult<TransferRequestView> {
    transition(state, id, TransferAction::Approve, body).await
}

/// Reject a pending request and release its reservation
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/reject",
    params(("id" = Uuid, Path, description = "Transfer request ID")),
    request_body(content = TransitionRequest, description = "Optional note for the history entry"),
    responses(
        (status = 200, description = "Transfer request rejected", body = ApiResponse<TransferRequestView>),
        (status = 404, description = "Transfer request not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed from the current status", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn reject_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<TransitionRequest>>,
) -> ApiResult<TransferRequestView> {
    transition(state, id, TransferAction::Reject, body).await
}

#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/ship",
    params(("id" = Uuid, Path, description = "Transfer request ID")),
    request_body(content = TransitionRequest, description = "Optional note for the history entry"),
    responses(
        (status = 200, description = "Transfer request shipped", body = ApiResponse<TransferRequestView>),
        (status = 404, description = "Transfer request not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed from the current status", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn ship_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<TransitionRequest>>,
) -> ApiResult<TransferRequestView> {
    transition(state, id, TransferAction::Ship, body).await
}

/// Confirm delivery. Deducts the transferred units from the sender's stock.
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/receive",
    params(("id" = Uuid, Path, description = "Transfer request ID")),
    request_body(content = TransitionRequest, description = "Optional note for the history entry"),
    responses(
        (status = 200, description = "Transfer request received", body = ApiResponse<TransferRequestView>),
        (status = 404, description = "Transfer request not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed from the current status", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn receive_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<TransitionRequest>>,
) -> ApiResult<TransferRequestView> {
    transition(state, id, TransferAction::Receive, body).await
}

#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/cancel",
    params(("id" = Uuid, Path, description = "Transfer request ID")),
    request_body(content = TransitionRequest, description = "Optional note for the history entry"),
    responses(
        (status = 200, description = "Transfer request cancelled", body = ApiResponse<TransferRequestView>),
        (status = 404, description = "Transfer request not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed from the current status", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn cancel_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<TransitionRequest>>,
) -> ApiResult<TransferRequestView> {
    transition(state, id, TransferAction::Cancel, body).await
}
