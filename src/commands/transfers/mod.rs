pub mod create_transfer_request_command;
pub mod transition_transfer_command;

pub use create_transfer_request_command::{generate_tracking_number, CreateTransferRequestCommand};
pub use transition_transfer_command::{TransferAction, TransitionTransferCommand};

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    entities::{
        transfer_request::TransferStatus,
        transfer_status_history::{self, Entity as TransferStatusHistoryEntity},
    },
    errors::ServiceError,
};

/// Appends the next status entry for a transfer request.
///
/// Sequence numbers are contiguous from 1 and `changed_at` never goes
/// backwards, even if the wall clock does.
pub(crate) async fn append_status_entry<C: ConnectionTrait>(
    conn: &C,
    transfer_request_id: Uuid,
    status: TransferStatus,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<transfer_status_history::Model, ServiceError> {
    let last = TransferStatusHistoryEntity::find()
        .filter(transfer_status_history::Column::TransferRequestId.eq(transfer_request_id))
        .order_by_desc(transfer_status_history::Column::Sequence)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let (sequence, changed_at) = match last {
        Some(last) => (last.sequence + 1, now.max(last.changed_at)),
        None => (1, now),
    };

    transfer_status_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        transfer_request_id: Set(transfer_request_id),
        sequence: Set(sequence),
        status: Set(status),
        note: Set(note),
        changed_at: Set(changed_at),
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)
}
