use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    services::inventory::{
        AdjustQuantityRequest, CreateInventoryItemRequest, InventoryFilter, InventoryItemView,
        SurplusFilter,
    },
    ApiResponse, ApiResult, AppState,
};

/// Create the inventory router
pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_inventory).post(create_inventory_item))
        .route("/surplus", get(list_surplus))
        .route("/:id", get(get_inventory_item))
        .route("/:id/adjust", post(adjust_quantity))
}

/// List inventory items, soonest expiry first
#[utoipa::path(
    get,
    path = "/api/v1/inventory",
    params(InventoryFilter),
    responses(
        (status = 200, description = "Inventory list returned", body = ApiResponse<Vec<InventoryItemView>>,
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    Query(filter): Query<InventoryFilter>,
) -> ApiResult<Vec<InventoryItemView>> {
    let items = state.services.inventory.list(filter).await?;
    Ok(Json(ApiResponse::success(items)))
}

/// Items other centers can request right now
#[utoipa::path(
    get,
    path = "/api/v1/inventory/surplus",
    params(SurplusFilter),
    responses(
        (status = 200, description = "Surplus marketplace returned", body = ApiResponse<Vec<InventoryItemView>>),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn list_surplus(
    State(state): State<AppState>,
    Query(filter): Query<SurplusFilter>,
) -> ApiResult<Vec<InventoryItemView>> {
    let items = state.services.inventory.list_surplus(filter).await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}",
    params(("id" = Uuid, Path, description = "Inventory item ID")),
    responses(
        (status = 200, description = "Inventory item returned", body = ApiResponse<InventoryItemView>),
        (status = 404, description = "Inventory item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn get_inventory_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<InventoryItemView> {
    let item = state.services.inventory.get(id).await?;
    Ok(Json(ApiResponse::success(item)))
}

/// List a surplus item on behalf of a health center
#[utoipa::path(
    post,
    path = "/api/v1/inventory",
    request_body = CreateInventoryItemRequest,
    responses(
        (status = 201, description = "Inventory item created", body = ApiResponse<InventoryItemView>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Health center not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn create_inventory_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateInventoryItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InventoryItemView>>), ServiceError> {
    let item = state.services.inventory.create(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

/// Apply a signed correction to on-hand stock
#[utoipa::path(
    post,
    path = "/api/v1/inventory/{id}/adjust",
    params(("id" = Uuid, Path, description = "Inventory item ID")),
    request_body = AdjustQuantityRequest,
    responses(
        (status = 200, description = "Quantity adjusted", body = ApiResponse<InventoryItemView>),
        (status = 404, description = "Inventory item not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Adjustment would undercut reserved stock", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn adjust_quantity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustQuantityRequest>,
) -> ApiResult<InventoryItemView> {
    validator::Validate::validate(&payload)?;
    let item = state
        .services
        .inventory
        .adjust_quantity(id, payload.delta, payload.reason)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}
