use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    services::health_centers::{
        CreateHealthCenterRequest, HealthCenterView, SetCenterActiveRequest,
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CenterListQuery {
    #[serde(default)]
    pub active_only: bool,
}

pub fn health_center_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_centers).post(create_center))
        .route("/:id", get(get_center))
        .route("/:id/status", put(set_center_status))
}

#[utoipa::path(
    get,
    path = "/api/v1/health-centers",
    params(CenterListQuery),
    responses(
        (status = 200, description = "Health centers returned", body = ApiResponse<Vec<HealthCenterView>>)
    ),
    tag = "health-centers"
)]
pub async fn list_centers(
    State(state): State<AppState>,
    Query(query): Query<CenterListQuery>,
) -> ApiResult<Vec<HealthCenterView>> {
    let centers = state
        .services
        .health_centers
        .list_centers(query.active_only)
        .await?;
    Ok(Json(ApiResponse::success(
        centers.into_iter().map(HealthCenterView::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/health-centers/{id}",
    params(("id" = Uuid, Path, description = "Health center ID")),
    responses(
        (status = 200, description = "Health center returned", body = ApiResponse<HealthCenterView>),
        (status = 404, description = "Health center not found", body = crate::errors::ErrorResponse)
    ),
    tag = "health-centers"
)]
pub async fn get_center(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<HealthCenterView> {
    let center = state.services.health_centers.get_center(id).await?;
    Ok(Json(ApiResponse::success(center.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/health-centers",
    request_body = CreateHealthCenterRequest,
    responses(
        (status = 201, description = "Health center registered", body = ApiResponse<HealthCenterView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "health-centers"
)]
pub async fn create_center(
    State(state): State<AppState>,
    Json(payload): Json<CreateHealthCenterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<HealthCenterView>>), ServiceError> {
    let center = state.services.health_centers.create_center(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(center.into()))))
}

/// Activate or deactivate a center. Inactive centers cannot list items or
/// take part in new transfer requests.
#[utoipa::path(
    put,
    path = "/api/v1/health-centers/{id}/status",
    params(("id" = Uuid, Path, description = "Health center ID")),
    request_body = SetCenterActiveRequest,
    responses(
        (status = 200, description = "Health center updated", body = ApiResponse<HealthCenterView>),
        (status = 404, description = "Health center not found", body = crate::errors::ErrorResponse)
    ),
    tag = "health-centers"
)]
pub async fn set_center_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetCenterActiveRequest>,
) -> ApiResult<HealthCenterView> {
    let center = state
        .services
        .health_centers
        .set_center_active(id, payload.is_active)
        .await?;
    Ok(Json(ApiResponse::success(center.into())))
}
