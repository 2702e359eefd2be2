pub mod health_center;
pub mod inventory_item;
pub mod transfer_request;
pub mod transfer_status_history;
