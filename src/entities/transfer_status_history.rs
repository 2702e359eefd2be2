use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transfer_request::TransferStatus;

/// Append-only log of transfer request status changes.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfer_status_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub transfer_request_id: Uuid,
    pub sequence: i32,
    pub status: TransferStatus,
    pub note: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transfer_request::Entity",
        from = "Column::TransferRequestId",
        to = "super::transfer_request::Column::Id"
    )]
    TransferRequest,
}

impl Related<super::transfer_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransferRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
