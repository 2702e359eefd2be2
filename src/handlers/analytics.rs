use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    errors::ServiceError,
    services::analytics::{CategoryBreakdown, Dashboard, StatusCount, TopCenter, WastePrevention},
    ApiResponse, AppState,
};

/// Build the analytics Router scoped under `/api/v1/analytics`.
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/category-distribution", get(get_category_distribution))
        .route("/top-centers", get(get_top_centers))
        .route("/transfers-by-status", get(get_transfers_by_status))
        .route("/waste-prevention", get(get_waste_prevention))
}

/// Query parameters for the top-centers ranking
#[derive(Debug, Deserialize, IntoParams)]
pub struct TopCentersQuery {
    /// Number of centers to return (default from configuration)
    #[param(minimum = 1, maximum = 50)]
    pub limit: Option<u64>,
}

/// Every rollup in one response
#[utoipa::path(
    get,
    path = "/api/v1/analytics/dashboard",
    responses(
        (status = 200, description = "Dashboard retrieved successfully", body = ApiResponse<Dashboard>)
    ),
    tag = "Analytics"
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Dashboard>>, ServiceError> {
    let dashboard = state.services.analytics.dashboard().await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/category-distribution",
    responses(
        (status = 200, description = "Listings grouped by category", body = ApiResponse<Vec<CategoryBreakdown>>)
    ),
    tag = "Analytics"
)]
pub async fn get_category_distribution(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CategoryBreakdown>>>, ServiceError> {
    let distribution = state.services.analytics.category_distribution().await?;
    Ok(Json(ApiResponse::success(distribution)))
}

/// Centers ranked by completed transfers sent
#[utoipa::path(
    get,
    path = "/api/v1/analytics/top-centers",
    params(TopCentersQuery),
    responses(
        (status = 200, description = "Top centers retrieved successfully", body = ApiResponse<Vec<TopCenter>>),
        (status = 400, description = "Invalid limit", body = crate::errors::ErrorResponse)
    ),
    tag = "Analytics"
)]
pub async fn get_top_centers(
    State(state): State<AppState>,
    Query(params): Query<TopCentersQuery>,
) -> Result<Json<ApiResponse<Vec<TopCenter>>>, ServiceError> {
    let centers = state.services.analytics.top_centers(params.limit).await?;
    Ok(Json(ApiResponse::success(centers)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/transfers-by-status",
    responses(
        (status = 200, description = "Transfer requests counted per status", body = ApiResponse<Vec<StatusCount>>)
    ),
    tag = "Analytics"
)]
pub async fn get_transfers_by_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<StatusCount>>>, ServiceError> {
    let counts = state.services.analytics.transfers_by_status().await?;
    Ok(Json(ApiResponse::success(counts)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/waste-prevention",
    responses(
        (status = 200, description = "Value and units saved by completed transfers", body = ApiResponse<WastePrevention>)
    ),
    tag = "Analytics"
)]
pub async fn get_waste_prevention(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<WastePrevention>>, ServiceError> {
    let waste = state.services.analytics.waste_prevention().await?;
    Ok(Json(ApiResponse::success(waste)))
}
