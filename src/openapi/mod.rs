use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MedSurplus API",
        version = "1.0.0",
        description = r#"
# MedSurplus Redistribution API

Health centers list surplus medical supplies before they expire, and other
centers request them through a tracked transfer workflow.

## Features

- **Inventory**: Listings with a status derived from stock and expiry date
- **Surplus marketplace**: Items that are surplus or critical and still have free units
- **Transfers**: `pending -> approved -> shipped -> received`, with reject and cancel
- **Analytics**: Waste prevented, category distribution and top sharing centers

## Error Handling

Errors share one body format:

```json
{
  "error": "Unprocessable Entity",
  "code": "insufficient_quantity",
  "message": "requested 30 units but only 20 are available",
  "request_id": "7f1c...",
  "timestamp": "2025-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "inventory", description = "Surplus listings and stock corrections"),
        (name = "health-centers", description = "Participating health centers"),
        (name = "transfers", description = "Transfer request workflow"),
        (name = "Analytics", description = "Waste prevention rollups"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Inventory
        crate::handlers::inventory::list_inventory,
        crate::handlers::inventory::list_surplus,
        crate::handlers::inventory::get_inventory_item,
        crate::handlers::inventory::create_inventory_item,
        crate::handlers::inventory::adjust_quantity,

        // Health centers
        crate::handlers::health_centers::list_centers,
        crate::handlers::health_centers::get_center,
        crate::handlers::health_centers::create_center,
        crate::handlers::health_centers::set_center_status,

        // Transfers
        crate::handlers::transfers::create_transfer,
        crate::handlers::transfers::list_transfers,
        crate::handlers::transfers::get_transfer,
        crate::handlers::transfers::get_transfer_by_tracking,
        crate::handlers::transfers::get_transfer_history,
        crate::handlers::transfers::approve_transfer,
        crate::handlers::transfers::reject_transfer,
        crate::handlers::transfers::ship_transfer,
        crate::handlers::transfers::receive_transfer,
        crate::handlers::transfers::cancel_transfer,

        // Analytics
        crate::handlers::analytics::get_dashboard,
        crate::handlers::analytics::get_category_distribution,
        crate::handlers::analytics::get_top_centers,
        crate::handlers::analytics::get_transfers_by_status,
        crate::handlers::analytics::get_waste_prevention,
    ),
    components(
        schemas(
            crate::ResponseMeta,

            crate::entities::inventory_item::ItemCategory,
            crate::services::inventory_status::InventoryStatus,
            crate::services::inventory::InventoryItemView,
            crate::services::inventory::CreateInventoryItemRequest,
            crate::services::inventory::AdjustQuantityRequest,

            crate::services::health_centers::HealthCenterView,
            crate::services::health_centers::ContactInfo,
            crate::services::health_centers::CenterSummary,
            crate::services::health_centers::CreateHealthCenterRequest,
            crate::services::health_centers::SetCenterActiveRequest,

            crate::entities::transfer_request::TransferStatus,
            crate::entities::transfer_request::TransferPriority,
            crate::commands::transfers::CreateTransferRequestCommand,
            crate::services::transfers::TransferRequestView,
            crate::services::transfers::ItemSummary,
            crate::services::transfers::StatusEntryView,
            crate::services::transfers::TransitionRequest,

            crate::services::analytics::Dashboard,
            crate::services::analytics::Overview,
            crate::services::analytics::WastePrevention,
            crate::services::analytics::CategoryBreakdown,
            crate::services::analytics::StatusCount,
            crate::services::analytics::TopCenter,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_workflow_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("MedSurplus API"));
        assert!(json.contains("/api/v1/inventory/surplus"));
        assert!(json.contains("/api/v1/transfers/{id}/receive"));
        assert!(json.contains("/api/v1/analytics/top-centers"));
    }
}
