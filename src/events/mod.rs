use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::transfer_request::TransferStatus;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, waiting for channel capacity.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event after the triggering change is committed. A failure is
    /// logged and swallowed since the state change already happened.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping domain event");
        }
    }
}

/// Domain events emitted by the inventory and transfer workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    HealthCenterRegistered(Uuid),
    HealthCenterStatusChanged {
        center_id: Uuid,
        is_active: bool,
    },
    InventoryItemListed {
        item_id: Uuid,
        center_id: Uuid,
        quantity: i32,
    },
    InventoryQuantityAdjusted {
        item_id: Uuid,
        old_quantity: i32,
        new_quantity: i32,
        reason: Option<String>,
    },
    TransferRequested {
        transfer_id: Uuid,
        tracking_number: String,
        item_id: Uuid,
        quantity: i32,
    },
    TransferStatusChanged {
        transfer_id: Uuid,
        tracking_number: String,
        from: TransferStatus,
        to: TransferStatus,
    },
    WastePrevented {
        transfer_id: Uuid,
        item_id: Uuid,
        sender_center_id: Uuid,
        receiver_center_id: Uuid,
        quantity: i32,
    },
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::HealthCenterRegistered(center_id) => {
                info!(%center_id, "health center registered");
            }
            Event::HealthCenterStatusChanged {
                center_id,
                is_active,
            } => {
                info!(%center_id, is_active, "health center status changed");
            }
            Event::InventoryItemListed {
                item_id,
                center_id,
                quantity,
            } => {
                info!(%item_id, %center_id, quantity, "inventory item listed");
            }
            Event::InventoryQuantityAdjusted {
                item_id,
                old_quantity,
                new_quantity,
                reason,
            } => {
                info!(
                    %item_id,
                    old_quantity,
                    new_quantity,
                    reason = reason.as_deref().unwrap_or("unspecified"),
                    "inventory quantity adjusted"
                );
            }
            Event::TransferRequested {
                transfer_id,
                tracking_number,
                item_id,
                quantity,
            } => {
                info!(%transfer_id, %tracking_number, %item_id, quantity, "transfer requested");
            }
            Event::TransferStatusChanged {
                transfer_id,
                tracking_number,
                from,
                to,
            } => {
                info!(%transfer_id, %tracking_number, %from, %to, "transfer status changed");
            }
            Event::WastePrevented {
                transfer_id,
                item_id,
                sender_center_id,
                receiver_center_id,
                quantity,
            } => {
                info!(
                    %transfer_id,
                    %item_id,
                    %sender_center_id,
                    %receiver_center_id,
                    quantity,
                    "waste prevented"
                );
            }
        }
    }

    info!("Event channel closed, stopping event processing");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender.publish(Event::HealthCenterRegistered(id)).await;

        match rx.recv().await {
            Some(Event::HealthCenterRegistered(got)) => assert_eq!(got, id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn publish_after_receiver_dropped_does_not_fail() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender
            .send(Event::HealthCenterRegistered(Uuid::new_v4()))
            .await
            .is_err());
        sender
            .publish(Event::HealthCenterRegistered(Uuid::new_v4()))
            .await;
    }
}
