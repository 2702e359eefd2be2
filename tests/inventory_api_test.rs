mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn create_item_derives_status_and_embeds_center() {
    let app = TestApp::new().await;
    let center = app.create_center("Al Noor Primary Care", "Riyadh").await;

    let item_id = app.create_item(&center, 100, 10).await;
    let item = app.get_item(&item_id).await;

    assert_eq!(item["status"], "critical");
    assert_eq!(item["days_until_expiry"], 10);
    assert_eq!(item["available_quantity"], 100);
    assert_eq!(item["reserved_quantity"], 0);
    assert_eq!(item["health_center"]["city"], "Riyadh");
    assert_eq!(item["category"], "medications");
}

#[tokio::test]
async fn create_item_rejects_missing_or_bad_fields() {
    let app = TestApp::new().await;
    let center = app.create_center("Corniche Health Center", "Jeddah").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/inventory",
            Some(json!({
                "center_id": center,
                "item_name": "Gauze",
                "category": "consumables",
                "expiry_date": "2099-01-01"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/inventory",
            Some(json!({
                "center_id": center,
                "item_name": "Gauze",
                "category": "consumables",
                "quantity": 0,
                "expiry_date": "2099-01-01"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/inventory",
            Some(json!({
                "center_id": center,
                "item_name": "Gauze",
                "category": "consumables",
                "quantity": 5
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_item_for_unknown_center_is_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/inventory",
            Some(json!({
                "center_id": uuid::Uuid::new_v4(),
                "item_name": "Gauze",
                "category": "consumables",
                "quantity": 5,
                "expiry_date": "2099-01-01"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn inactive_center_cannot_list_items() {
    let app = TestApp::new().await;
    let center = app.create_center("Closed Clinic", "Riyadh").await;

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/v1/health-centers/{center}/status"),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/inventory",
            Some(json!({
                "center_id": center,
                "item_name": "Gauze",
                "category": "consumables",
                "quantity": 5,
                "expiry_date": "2099-01-01"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
}

#[tokio::test]
async fn list_filters_by_city_category_and_status() {
    let app = TestApp::new().await;
    let riyadh = app.create_center("Al Noor Primary Care", "Riyadh").await;
    let jeddah = app.create_center("Corniche Health Center", "Jeddah").await;

    app.create_item_with(&riyadh, "Insulin pens", "medications", 40, 20, None)
        .await;
    app.create_item_with(&riyadh, "Exam gloves", "consumables", 500, 60, None)
        .await;
    app.create_item_with(&jeddah, "Pulse oximeter", "medical_equipment", 3, 300, None)
        .await;

    let (status, body) = app
        .call(Method::GET, "/api/v1/inventory?city=Riyadh", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    // soonest expiry first
    assert_eq!(items[0]["item_name"], "Insulin pens");

    // city is an exact match, unlike search
    let (_, body) = app
        .call(Method::GET, "/api/v1/inventory?city=riyadh", None)
        .await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (_, body) = app
        .call(Method::GET, "/api/v1/inventory?category=consumables", None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = app
        .call(Method::GET, "/api/v1/inventory?status=available", None)
        .await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["item_name"], "Pulse oximeter");

    let (_, body) = app
        .call(Method::GET, "/api/v1/inventory?search=GLOVE", None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = app
        .call(
            Method::GET,
            &format!("/api/v1/inventory?center_id={jeddah}"),
            None,
        )
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn expired_items_are_listed_only_on_request() {
    let app = TestApp::new().await;
    let center = app.create_center("Al Noor Primary Care", "Riyadh").await;
    app.create_item_with(&center, "Expired saline", "consumables", 20, 0, None)
        .await;
    app.create_item_with(&center, "Fresh saline", "consumables", 20, 120, None)
        .await;

    let (_, body) = app.call(Method::GET, "/api/v1/inventory", None).await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["item_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Fresh saline"]);

    let (_, body) = app
        .call(Method::GET, "/api/v1/inventory?status=expired", None)
        .await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["item_name"], "Expired saline");

    let (_, body) = app
        .call(Method::GET, "/api/v1/inventory?include_retired=true", None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn surplus_marketplace_shows_only_offered_items_from_other_centers() {
    let app = TestApp::new().await;
    let mine = app.create_center("Al Noor Primary Care", "Riyadh").await;
    let other = app.create_center("King Fahd District Clinic", "Riyadh").await;

    app.create_item_with(&other, "Critical vaccine", "vaccines", 10, 5, None)
        .await;
    app.create_item_with(&other, "Surplus gauze", "consumables", 10, 80, None)
        .await;
    app.create_item_with(&other, "Long dated scanner", "medical_equipment", 1, 400, None)
        .await;
    app.create_item_with(&mine, "My own surplus", "consumables", 10, 80, None)
        .await;

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/v1/inventory/surplus?exclude_center_id={mine}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["item_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Critical vaccine", "Surplus gauze"]);
}

#[tokio::test]
async fn adjust_quantity_cannot_undercut_reservations() {
    let app = TestApp::new().await;
    let sender = app.create_center("Sender", "Riyadh").await;
    let receiver = app.create_center("Receiver", "Dammam").await;
    let item = app.create_item(&sender, 50, 40).await;
    app.create_transfer(&item, &sender, &receiver, 30).await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/inventory/{item}/adjust"),
            Some(json!({ "delta": -25, "reason": "breakage" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "insufficient_quantity");

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/inventory/{item}/adjust"),
            Some(json!({ "delta": -20, "reason": "breakage" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], 30);
    assert_eq!(body["data"]["available_quantity"], 0);
    assert_eq!(body["data"]["status"], "reserved");
}

#[tokio::test]
async fn unknown_item_is_not_found_with_request_id() {
    let app = TestApp::new().await;
    let response = app
        .request_with_headers(
            Method::GET,
            &format!("/api/v1/inventory/{}", uuid::Uuid::new_v4()),
            None,
            &[("x-request-id", "req-inventory-404")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "req-inventory-404"
    );
    let body = response_json(response).await;
    assert_eq!(body["request_id"], "req-inventory-404");
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn health_center_listing_and_lookup() {
    let app = TestApp::new().await;
    let a = app.create_center("Beta Clinic", "Riyadh").await;
    let b = app.create_center("Alpha Clinic", "Jeddah").await;
    app.call(
        Method::PUT,
        &format!("/api/v1/health-centers/{a}/status"),
        Some(json!({ "is_active": false })),
    )
    .await;

    let (_, body) = app.call(Method::GET, "/api/v1/health-centers", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = app
        .call(Method::GET, "/api/v1/health-centers?active_only=true", None)
        .await;
    let centers = body["data"].as_array().unwrap();
    assert_eq!(centers.len(), 1);
    assert_eq!(centers[0]["id"], b.as_str());

    let (status, body) = app
        .call(Method::GET, &format!("/api/v1/health-centers/{b}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["contact_info"]["email"],
        "manager@center.example.org"
    );
}

#[tokio::test]
async fn status_health_and_metrics_endpoints_respond() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::GET, "/api/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service"], "medsurplus-api");

    let (status, body) = app.call(Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["checks"]["database"], "healthy");

    let response = app.request(Method::GET, "/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = app
        .call(Method::GET, "/api-docs/openapi.json", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/inventory"].is_object());
}
