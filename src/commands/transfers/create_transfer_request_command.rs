use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::Command,
    db::{begin_write, DbPool},
    entities::transfer_request::{
        self, Entity as TransferRequestEntity, TransferPriority, TransferStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        health_centers::find_center,
        inventory::{find_item, reserve_quantity},
        inventory_status::InventoryStatus,
    },
};

use super::append_status_entry;

const TRACKING_PREFIX: &str = "TRF-";
const TRACKING_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TRACKING_LENGTH: usize = 12;
const TRACKING_ATTEMPTS: usize = 5;

/// Opens a transfer request and reserves the requested units in one transaction.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTransferRequestCommand {
    pub item_id: Uuid,
    pub sender_center_id: Uuid,
    pub receiver_center_id: Uuid,
    pub quantity: i32,
    #[serde(default = "default_priority")]
    pub priority: TransferPriority,
    #[validate(length(
        min = 1,
        max = 200,
        message = "Requester name must be between 1 and 200 characters"
    ))]
    pub requester_name: String,
    #[validate(email(message = "Requester email must be a valid email address"))]
    pub requester_email: String,
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
    /// Attempts made when the database reports lock contention.
    #[serde(skip, default = "default_max_retries")]
    #[validate(range(min = 1, max = 10))]
    pub max_retries: u32,
}

fn default_priority() -> TransferPriority {
    TransferPriority::Medium
}

fn default_max_retries() -> u32 {
    3
}

/// `TRF-` followed by 12 random characters from `[A-Z0-9]`.
pub fn generate_tracking_number() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..TRACKING_LENGTH)
        .map(|_| TRACKING_ALPHABET[rng.gen_range(0..TRACKING_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", TRACKING_PREFIX, suffix)
}

#[async_trait]
impl Command for CreateTransferRequestCommand {
    type Result = transfer_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(item_id = %self.item_id, quantity = self.quantity))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let created = match self.create_with_retries(db_pool.as_ref()).await {
            Ok(created) => created,
            Err(e) => {
                metrics::record_failure("create", &e);
                error!(error = %e, "Failed to create transfer request");
                return Err(e);
            }
        };

        metrics::TRANSFER_REQUESTS_CREATED.inc();
        metrics::TRANSFER_TRANSITIONS
            .with_label_values(&[&TransferStatus::Pending.to_string()])
            .inc();
        info!(
            transfer_id = %created.id,
            tracking_number = %created.tracking_number,
            "Transfer request created"
        );

        event_sender
            .publish(Event::TransferRequested {
                transfer_id: created.id,
                tracking_number: created.tracking_number.clone(),
                item_id: created.item_id,
                quantity: created.quantity,
            })
            .await;

        Ok(created)
    }
}

impl CreateTransferRequestCommand {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn check_request(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.requester_name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Requester name must not be blank".to_string(),
            ));
        }
        if self.quantity < 1 {
            return Err(ServiceError::InsufficientQuantity(format!(
                "requested quantity must be at least 1, got {}",
                self.quantity
            )));
        }
        if self.sender_center_id == self.receiver_center_id {
            return Err(ServiceError::InvalidRequest(
                "sender and receiver must be different centers".to_string(),
            ));
        }
        Ok(())
    }

    async fn create_with_retries(
        &self,
        db: &DbPool,
    ) -> Result<transfer_request::Model, ServiceError> {
        self.check_request()?;

        for attempt in 1..=self.max_retries {
            match self.create_in_db(db).await {
                Err(e) if e.is_retryable() => {
                    metrics::WRITE_RETRIES.inc();
                    warn!(attempt, error = %e, "Database busy while creating transfer request, retrying");
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                }
                done => return done,
            }
        }

        Err(ServiceError::Conflict(format!(
            "item {} is busy; retries exhausted",
            self.item_id
        )))
    }

    async fn create_in_db(&self, db: &DbPool) -> Result<transfer_request::Model, ServiceError> {
        let txn = begin_write(db).await?;
        let created = self.create_in_txn(&txn).await?;
        txn.commit().await?;
        Ok(created)
    }

    async fn create_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<transfer_request::Model, ServiceError> {
        let now = Utc::now();

        let item = find_item(txn, self.item_id).await?;
        if item.center_id != self.sender_center_id {
            return Err(ServiceError::InvalidRequest(format!(
                "item {} is not owned by center {}",
                item.id, self.sender_center_id
            )));
        }
        let receiver = find_center(txn, self.receiver_center_id).await?;
        let sender = find_center(txn, self.sender_center_id).await?;
        if !sender.is_active || !receiver.is_active {
            return Err(ServiceError::InvalidRequest(
                "both sender and receiver centers must be active".to_string(),
            ));
        }
        if item.status_at(now) == InventoryStatus::Expired {
            return Err(ServiceError::InvalidRequest(format!(
                "item {} has expired and cannot be transferred",
                item.id
            )));
        }

        reserve_quantity(txn, item.id, self.quantity).await?;

        let tracking_number = unused_tracking_number(txn).await?;
        let created = transfer_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            tracking_number: Set(tracking_number),
            item_id: Set(item.id),
            sender_center_id: Set(self.sender_center_id),
            receiver_center_id: Set(self.receiver_center_id),
            quantity: Set(self.quantity),
            priority: Set(self.priority),
            requester_name: Set(self.requester_name.trim().to_string()),
            requester_email: Set(self.requester_email.trim().to_string()),
            reason: Set(self.reason.clone()),
            status: Set(TransferStatus::Pending),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await
        .map_err(ServiceError::db_error)?;

        append_status_entry(txn, created.id, TransferStatus::Pending, None, now).await?;
        Ok(created)
    }
}

async fn unused_tracking_number<C: ConnectionTrait>(conn: &C) -> Result<String, ServiceError> {
    for _ in 0..TRACKING_ATTEMPTS {
        let candidate = generate_tracking_number();
        let taken = TransferRequestEntity::find()
            .filter(transfer_request::Column::TrackingNumber.eq(candidate.as_str()))
            .count(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if taken == 0 {
            return Ok(candidate);
        }
    }
    Err(ServiceError::InternalError(
        "could not allocate a unique tracking number".to_string(),
    ))
}
