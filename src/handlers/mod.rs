pub mod analytics;
pub mod health_centers;
pub mod inventory;
pub mod transfers;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    config::AppConfig,
    events::EventSender,
    services::{
        analytics::AnalyticsService, health_centers::HealthCenterService,
        inventory::InventoryService, transfers::TransferService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<InventoryService>,
    pub health_centers: Arc<HealthCenterService>,
    pub transfers: Arc<TransferService>,
    pub analytics: Arc<AnalyticsService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Self {
        let retries = config.transition_max_retries;
        Self {
            inventory: Arc::new(InventoryService::new(
                db.clone(),
                event_sender.clone(),
                retries,
            )),
            health_centers: Arc::new(HealthCenterService::new(db.clone(), event_sender.clone())),
            transfers: Arc::new(TransferService::new(db.clone(), event_sender, retries)),
            analytics: Arc::new(AnalyticsService::new(db, config.top_centers_default_limit)),
        }
    }
}
