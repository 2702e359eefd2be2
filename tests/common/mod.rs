#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use medsurplus_api::{
    app_router,
    config::AppConfig,
    db,
    events::{self, EventSender},
    AppState,
};

/// Helper harness for spinning up an application backed by a fresh SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    db_file: Option<PathBuf>,
}

impl TestApp {
    /// Construct a new test application over an in-memory database.
    pub async fn new() -> Self {
        Self::with_database_url("sqlite::memory:".to_string(), None).await
    }

    /// Construct a test application over a temporary database file with a
    /// full connection pool, so transactions really overlap.
    pub async fn file_backed() -> Self {
        let path = std::env::temp_dir().join(format!("medsurplus-test-{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}?mode=rwc", path.display());
        Self::with_database_url(url, Some(path)).await
    }

    async fn with_database_url(database_url: String, db_file: Option<PathBuf>) -> Self {
        let mut cfg = AppConfig::new(
            database_url,
            "127.0.0.1".to_string(),
            18_080,
            "development".to_string(),
        );
        cfg.auto_migrate = true;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(1024);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = app_router(state.clone()).expect("router should build in development");

        Self {
            router,
            state,
            _event_task: event_task,
            db_file,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and returns the status with the parsed JSON body.
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    /// Registers a center and returns its id.
    pub async fn create_center(&self, name: &str, city: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/health-centers",
                Some(json!({
                    "name": name,
                    "city": city,
                    "manager_email": "manager@center.example.org"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create center failed: {body}");
        body["data"]["id"].as_str().expect("center id").to_string()
    }

    /// Lists an item expiring `days` from today and returns its id.
    pub async fn create_item(&self, center_id: &str, quantity: i32, days: i64) -> String {
        self.create_item_with(center_id, "Amoxicillin 500mg", "medications", quantity, days, Some("2.50"))
            .await
    }

    pub async fn create_item_with(
        &self,
        center_id: &str,
        name: &str,
        category: &str,
        quantity: i32,
        days: i64,
        unit_value: Option<&str>,
    ) -> String {
        let expiry = (Utc::now() + Duration::days(days)).date_naive();
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/inventory",
                Some(json!({
                    "center_id": center_id,
                    "item_name": name,
                    "category": category,
                    "quantity": quantity,
                    "unit": "boxes",
                    "expiry_date": expiry.to_string(),
                    "estimated_unit_value": unit_value,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create item failed: {body}");
        body["data"]["id"].as_str().expect("item id").to_string()
    }

    /// Opens a transfer request and returns the raw status and body.
    pub async fn request_transfer(
        &self,
        item_id: &str,
        sender: &str,
        receiver: &str,
        quantity: i32,
    ) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/api/v1/transfers",
            Some(json!({
                "item_id": item_id,
                "sender_center_id": sender,
                "receiver_center_id": receiver,
                "quantity": quantity,
                "priority": "high",
                "requester_name": "Dr. Layla Hassan",
                "requester_email": "layla@receiver.example.org",
                "reason": "Shortage during flu season"
            })),
        )
        .await
    }

    /// Opens a transfer request that must succeed and returns its id.
    pub async fn create_transfer(
        &self,
        item_id: &str,
        sender: &str,
        receiver: &str,
        quantity: i32,
    ) -> String {
        let (status, body) = self.request_transfer(item_id, sender, receiver, quantity).await;
        assert_eq!(status, StatusCode::CREATED, "create transfer failed: {body}");
        body["data"]["id"].as_str().expect("transfer id").to_string()
    }

    /// Posts a workflow action (`approve`, `ship`, ...) without a body.
    pub async fn transition(&self, transfer_id: &str, action: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            &format!("/api/v1/transfers/{transfer_id}/{action}"),
            None,
        )
        .await
    }

    pub async fn get_item(&self, item_id: &str) -> Value {
        let (status, body) = self
            .call(Method::GET, &format!("/api/v1/inventory/{item_id}"), None)
            .await;
        assert_eq!(status, StatusCode::OK, "get item failed: {body}");
        body["data"].clone()
    }

    pub async fn history(&self, transfer_id: &str) -> Vec<Value> {
        let (status, body) = self
            .call(
                Method::GET,
                &format!("/api/v1/transfers/{transfer_id}/history"),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "history failed: {body}");
        body["data"].as_array().cloned().unwrap_or_default()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
        if let Some(path) = self.db_file.take() {
            for suffix in ["", "-wal", "-shm", "-journal"] {
                let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
            }
        }
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    })
}
