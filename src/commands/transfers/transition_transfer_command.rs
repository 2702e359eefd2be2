use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{sea_query::Expr, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::Command,
    db::{begin_write, DbPool},
    entities::transfer_request::{self, Entity as TransferRequestEntity, TransferStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::inventory::{consume_reservation, release_reservation},
};

use super::append_status_entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransferAction {
    Approve,
    Reject,
    Ship,
    Receive,
    Cancel,
}

impl TransferAction {
    pub fn target_status(self) -> TransferStatus {
        match self {
            Self::Approve => TransferStatus::Approved,
            Self::Reject => TransferStatus::Rejected,
            Self::Ship => TransferStatus::Shipped,
            Self::Receive => TransferStatus::Received,
            Self::Cancel => TransferStatus::Cancelled,
        }
    }
}

/// Moves a transfer request one step through its lifecycle.
///
/// The status update is guarded by the request's version. A lost race, or a
/// database too busy to take the write, rolls back and retries up to
/// `max_retries` times before reporting `Conflict`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransitionTransferCommand {
    pub transfer_id: Uuid,
    pub action: TransferAction,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub max_retries: u32,
}

enum Attempt {
    Applied {
        request: transfer_request::Model,
        from: TransferStatus,
    },
    LostRace,
}

#[async_trait]
impl Command for TransitionTransferCommand {
    type Result = transfer_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(transfer_id = %self.transfer_id, action = %self.action))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let (updated, from) = match self.transition_with_retries(db_pool.as_ref()).await {
            Ok(done) => done,
            Err(e) => {
                metrics::record_failure(&self.action.to_string(), &e);
                warn!(error = %e, "Transfer transition failed");
                return Err(e);
            }
        };

        let to = updated.status;
        metrics::TRANSFER_TRANSITIONS
            .with_label_values(&[&to.to_string()])
            .inc();
        info!(%from, %to, tracking_number = %updated.tracking_number, "Transfer request transitioned");

        event_sender
            .publish(Event::TransferStatusChanged {
                transfer_id: updated.id,
                tracking_number: updated.tracking_number.clone(),
                from,
                to,
            })
            .await;

        if to == TransferStatus::Received {
            metrics::UNITS_SAVED.inc_by(updated.quantity.max(0) as u64);
            event_sender
                .publish(Event::WastePrevented {
                    transfer_id: updated.id,
                    item_id: updated.item_id,
                    sender_center_id: updated.sender_center_id,
                    receiver_center_id: updated.receiver_center_id,
                    quantity: updated.quantity,
                })
                .await;
        }

        Ok(updated)
    }
}

impl TransitionTransferCommand {
    pub fn new(transfer_id: Uuid, action: TransferAction, note: Option<String>, max_retries: u32) -> Self {
        Self {
            transfer_id,
            action,
            note,
            max_retries,
        }
    }

    async fn transition_with_retries(
        &self,
        db: &DbPool,
    ) -> Result<(transfer_request::Model, TransferStatus), ServiceError> {
        self.validate()?;

        for attempt in 1..=self.max_retries {
            match self.attempt_in_db(db).await {
                Ok(Attempt::Applied { request, from }) => return Ok((request, from)),
                Ok(Attempt::LostRace) => {
                    metrics::TRANSITION_RETRIES.inc();
                    warn!(attempt, "Transfer request modified concurrently, retrying");
                }
                Err(e) if e.is_retryable() => {
                    metrics::WRITE_RETRIES.inc();
                    warn!(attempt, error = %e, "Database busy during transition, retrying");
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }

        error!(retries = self.max_retries, "Transition retries exhausted");
        Err(ServiceError::Conflict(format!(
            "Transfer request {} was modified concurrently; retries exhausted",
            self.transfer_id
        )))
    }

    async fn attempt_in_db(&self, db: &DbPool) -> Result<Attempt, ServiceError> {
        let txn = begin_write(db).await?;
        let attempt = self.attempt(&txn).await?;
        match attempt {
            Attempt::Applied { .. } => txn.commit().await?,
            Attempt::LostRace => txn.rollback().await?,
        }
        Ok(attempt)
    }

    async fn attempt(&self, txn: &DatabaseTransaction) -> Result<Attempt, ServiceError> {
        let request = TransferRequestEntity::find_by_id(self.transfer_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Transfer request {} not found", self.transfer_id))
            })?;

        let from = request.status;
        let to = self.action.target_status();
        if !from.can_transition_to(to) {
            return Err(ServiceError::InvalidTransition(format!(
                "cannot {} a transfer request that is {}",
                self.action, from
            )));
        }

        let now = Utc::now();
        let result = TransferRequestEntity::update_many()
            .col_expr(transfer_request::Column::Status, Expr::value(to))
            .col_expr(
                transfer_request::Column::Version,
                Expr::col(transfer_request::Column::Version).add(1),
            )
            .col_expr(transfer_request::Column::UpdatedAt, Expr::value(now))
            .filter(transfer_request::Column::Id.eq(request.id))
            .filter(transfer_request::Column::Version.eq(request.version))
            .exec(txn)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            return Ok(Attempt::LostRace);
        }

        match to {
            TransferStatus::Rejected | TransferStatus::Cancelled => {
                release_reservation(txn, request.item_id, request.quantity).await?;
            }
            TransferStatus::Received => {
                consume_reservation(txn, request.item_id, request.quantity).await?;
            }
            _ => {}
        }

        append_status_entry(txn, request.id, to, self.note.clone(), now).await?;

        let updated = transfer_request::Model {
            status: to,
            version: request.version + 1,
            updated_at: now,
            ..request
        };
        Ok(Attempt::Applied {
            request: updated,
            from,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TransferAction::Approve, TransferStatus::Approved)]
    #[case(TransferAction::Reject, TransferStatus::Rejected)]
    #[case(TransferAction::Ship, TransferStatus::Shipped)]
    #[case(TransferAction::Receive, TransferStatus::Received)]
    #[case(TransferAction::Cancel, TransferStatus::Cancelled)]
    fn action_targets(#[case] action: TransferAction, #[case] status: TransferStatus) {
        assert_eq!(action.target_status(), status);
    }

    #[test]
    fn zero_retries_fail_validation() {
        let cmd = TransitionTransferCommand::new(Uuid::new_v4(), TransferAction::Approve, None, 0);
        assert!(cmd.validate().is_err());
    }
}
