use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    commands::{
        transfers::{CreateTransferRequestCommand, TransferAction, TransitionTransferCommand},
        Command,
    },
    entities::{
        health_center::{self, Entity as HealthCenterEntity},
        inventory_item::{self, Entity as InventoryItemEntity, ItemCategory},
        transfer_request::{self, Entity as TransferRequestEntity, TransferPriority, TransferStatus},
        transfer_status_history::{self, Entity as TransferStatusHistoryEntity},
    },
    errors::ServiceError,
    events::EventSender,
    services::health_centers::CenterSummary,
};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    /// Matches requests where the center is sender or receiver
    pub center_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct TransitionRequest {
    /// Free-text note stored with the status history entry
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemSummary {
    pub id: Uuid,
    pub item_name: String,
    pub category: ItemCategory,
    pub unit: String,
}

impl From<&inventory_item::Model> for ItemSummary {
    fn from(item: &inventory_item::Model) -> Self {
        Self {
            id: item.id,
            item_name: item.item_name.clone(),
            category: item.category,
            unit: item.unit.clone(),
        }
    }
}

/// Transfer request with embedded item and center summaries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferRequestView {
    pub id: Uuid,
    pub tracking_number: String,
    pub item_id: Uuid,
    pub sender_center_id: Uuid,
    pub receiver_center_id: Uuid,
    pub quantity: i32,
    pub priority: TransferPriority,
    pub requester_name: String,
    pub requester_email: String,
    pub reason: Option<String>,
    pub status: TransferStatus,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub inventory_item: Option<ItemSummary>,
    pub sender_center: Option<CenterSummary>,
    pub receiver_center: Option<CenterSummary>,
}

impl TransferRequestView {
    fn assemble(
        request: transfer_request::Model,
        items: &HashMap<Uuid, inventory_item::Model>,
        centers: &HashMap<Uuid, health_center::Model>,
    ) -> Self {
        Self {
            inventory_item: items.get(&request.item_id).map(ItemSummary::from),
            sender_center: centers.get(&request.sender_center_id).map(CenterSummary::from),
            receiver_center: centers
                .get(&request.receiver_center_id)
                .map(CenterSummary::from),
            id: request.id,
            tracking_number: request.tracking_number,
            item_id: request.item_id,
            sender_center_id: request.sender_center_id,
            receiver_center_id: request.receiver_center_id,
            quantity: request.quantity,
            priority: request.priority,
            requester_name: request.requester_name,
            requester_email: request.requester_email,
            reason: request.reason,
            status: request.status,
            version: request.version,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusEntryView {
    pub sequence: i32,
    pub status: TransferStatus,
    pub changed_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl From<transfer_status_history::Model> for StatusEntryView {
    fn from(entry: transfer_status_history::Model) -> Self {
        Self {
            sequence: entry.sequence,
            status: entry.status,
            changed_at: entry.changed_at,
            note: entry.note,
        }
    }
}

/// Transfer workflow entry point used by the HTTP handlers.
#[derive(Clone)]
pub struct TransferService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    max_retries: u32,
}

impl TransferService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>, max_retries: u32) -> Self {
        Self {
            db,
            event_sender,
            max_retries,
        }
    }

    #[instrument(skip(self, command))]
    pub async fn create(
        &self,
        command: CreateTransferRequestCommand,
    ) -> Result<TransferRequestView, ServiceError> {
        let created = command
            .with_max_retries(self.max_retries)
            .execute(self.db.clone(), self.event_sender.clone())
            .await?;
        self.view(created).await
    }

    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        id: Uuid,
        action: TransferAction,
        note: Option<String>,
    ) -> Result<TransferRequestView, ServiceError> {
        let updated = TransitionTransferCommand::new(id, action, note, self.max_retries)
            .execute(self.db.clone(), self.event_sender.clone())
            .await?;
        self.view(updated).await
    }

    pub async fn approve(&self, id: Uuid, note: Option<String>) -> Result<TransferRequestView, ServiceError> {
        self.transition(id, TransferAction::Approve, note).await
    }

    pub async fn reject(&self, id: Uuid, note: Option<String>) -> Result<TransferRequestView, ServiceError> {
        self.transition(id, TransferAction::Reject, note).await
    }

    pub async fn ship(&self, id: Uuid, note: Option<String>) -> Result<TransferRequestView, ServiceError> {
        self.transition(id, TransferAction::Ship, note).await
    }

    pub async fn receive(&self, id: Uuid, note: Option<String>) -> Result<TransferRequestView, ServiceError> {
        self.transition(id, TransferAction::Receive, note).await
    }

    pub async fn cancel(&self, id: Uuid, note: Option<String>) -> Result<TransferRequestView, ServiceError> {
        self.transition(id, TransferAction::Cancel, note).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<TransferRequestView, ServiceError> {
        let request = TransferRequestEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer request {} not found", id)))?;
        self.view(request).await
    }

    #[instrument(skip(self))]
    pub async fn get_by_tracking_number(
        &self,
        tracking_number: &str,
    ) -> Result<TransferRequestView, ServiceError> {
        let request = TransferRequestEntity::find()
            .filter(transfer_request::Column::TrackingNumber.eq(tracking_number.trim()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Transfer request with tracking number {} not found",
                    tracking_number
                ))
            })?;
        self.view(request).await
    }

    /// Lists requests newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: TransferFilter) -> Result<Vec<TransferRequestView>, ServiceError> {
        let mut query = TransferRequestEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(transfer_request::Column::Status.eq(status));
        }
        if let Some(center_id) = filter.center_id {
            query = query.filter(
                Condition::any()
                    .add(transfer_request::Column::SenderCenterId.eq(center_id))
                    .add(transfer_request::Column::ReceiverCenterId.eq(center_id)),
            );
        }

        let requests = query
            .order_by_desc(transfer_request::Column::CreatedAt)
            .order_by_desc(transfer_request::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let (items, centers) = self.lookups().await?;
        Ok(requests
            .into_iter()
            .map(|r| TransferRequestView::assemble(r, &items, &centers))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn history(&self, id: Uuid) -> Result<Vec<StatusEntryView>, ServiceError> {
        let exists = TransferRequestEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .is_some();
        if !exists {
            return Err(ServiceError::NotFound(format!(
                "Transfer request {} not found",
                id
            )));
        }

        let entries = TransferStatusHistoryEntity::find()
            .filter(transfer_status_history::Column::TransferRequestId.eq(id))
            .order_by_asc(transfer_status_history::Column::Sequence)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(entries.into_iter().map(StatusEntryView::from).collect())
    }

    async fn view(&self, request: transfer_request::Model) -> Result<TransferRequestView, ServiceError> {
        let item = InventoryItemEntity::find_by_id(request.item_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        let centers = HealthCenterEntity::find()
            .filter(
                health_center::Column::Id
                    .is_in([request.sender_center_id, request.receiver_center_id]),
            )
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let items = item.into_iter().map(|i| (i.id, i)).collect();
        let centers = centers.into_iter().map(|c| (c.id, c)).collect();
        Ok(TransferRequestView::assemble(request, &items, &centers))
    }

    async fn lookups(
        &self,
    ) -> Result<
        (
            HashMap<Uuid, inventory_item::Model>,
            HashMap<Uuid, health_center::Model>,
        ),
        ServiceError,
    > {
        let items = InventoryItemEntity::find()
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        let centers = HealthCenterEntity::find()
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok((
            items.into_iter().map(|i| (i.id, i)).collect(),
            centers.into_iter().map(|c| (c.id, c)).collect(),
        ))
    }
}
