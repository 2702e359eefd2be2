pub mod analytics;
pub mod health_centers;
pub mod inventory;
pub mod inventory_status;
pub mod transfers;
