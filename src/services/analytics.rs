use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Iterable, PaginatorTrait, QueryFilter,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{
        health_center::{self, Entity as HealthCenterEntity},
        inventory_item::{self, Entity as InventoryItemEntity, ItemCategory},
        transfer_request::{self, Entity as TransferRequestEntity, TransferStatus},
    },
    errors::ServiceError,
    services::{
        health_centers::CenterSummary,
        inventory_status::{InventoryStatus, CRITICAL_WINDOW_DAYS},
    },
};

pub const TOP_CENTERS_MAX_LIMIT: u64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Overview {
    pub total_centers: u64,
    pub active_centers: u64,
    pub total_inventory_items: u64,
    pub total_transfer_requests: u64,
    pub items_expiring_soon: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WastePrevention {
    pub total_value_saved: Decimal,
    pub total_items_saved: i64,
    pub transfers_completed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CategoryBreakdown {
    pub category: ItemCategory,
    pub count: u64,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusCount {
    pub status: TransferStatus,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopCenter {
    #[serde(rename = "senderCenter")]
    pub sender_center: CenterSummary,
    /// Completed transfers this center sent
    pub transfers_sent: u64,
    /// Units delivered through those transfers
    pub items_shared: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Dashboard {
    pub overview: Overview,
    pub waste_prevention: WastePrevention,
    pub category_distribution: Vec<CategoryBreakdown>,
    pub surplus_by_category: Vec<CategoryBreakdown>,
    pub transfers_by_status: Vec<StatusCount>,
    pub top_centers: Vec<TopCenter>,
    pub generated_at: DateTime<Utc>,
}

/// Read-only rollups over inventory and transfer history, computed per call.
#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<DatabaseConnection>,
    default_top_centers: u64,
}

impl AnalyticsService {
    pub fn new(db: Arc<DatabaseConnection>, default_top_centers: u64) -> Self {
        Self {
            db,
            default_top_centers,
        }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<Dashboard, ServiceError> {
        info!("Generating dashboard analytics");
        let now = Utc::now();

        Ok(Dashboard {
            overview: self.overview_at(now).await?,
            waste_prevention: self.waste_prevention().await?,
            category_distribution: self.category_distribution().await?,
            surplus_by_category: self.surplus_by_category_at(now).await?,
            transfers_by_status: self.transfers_by_status().await?,
            top_centers: self.top_centers(None).await?,
            generated_at: now,
        })
    }

    pub async fn overview(&self) -> Result<Overview, ServiceError> {
        self.overview_at(Utc::now()).await
    }

    async fn overview_at(&self, now: DateTime<Utc>) -> Result<Overview, ServiceError> {
        let db = &*self.db;
        let total_centers = HealthCenterEntity::find()
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        let active_centers = HealthCenterEntity::find()
            .filter(health_center::Column::IsActive.eq(true))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        let total_transfer_requests = TransferRequestEntity::find()
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;

        let stocked = self.stocked_items(now).await?;
        let items_expiring_soon = stocked
            .iter()
            .filter(|item| {
                let days = item.days_until_expiry(now);
                days > 0 && days <= CRITICAL_WINDOW_DAYS
            })
            .count() as u64;

        Ok(Overview {
            total_centers,
            active_centers,
            total_inventory_items: stocked.len() as u64,
            total_transfer_requests,
            items_expiring_soon,
        })
    }

    /// Value and units moved by received transfers. Items without an
    /// estimated unit value contribute zero value.
    #[instrument(skip(self))]
    pub async fn waste_prevention(&self) -> Result<WastePrevention, ServiceError> {
        let db = &*self.db;
        let received = TransferRequestEntity::find()
            .filter(transfer_request::Column::Status.eq(TransferStatus::Received))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let values: HashMap<Uuid, Option<Decimal>> = InventoryItemEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|item| (item.id, item.estimated_unit_value))
            .collect();

        let total_value_saved = received
            .iter()
            .map(|r| {
                let unit_value = values.get(&r.item_id).copied().flatten().unwrap_or_default();
                unit_value * Decimal::from(r.quantity)
            })
            .sum();
        let total_items_saved = received.iter().map(|r| i64::from(r.quantity)).sum();

        Ok(WastePrevention {
            total_value_saved,
            total_items_saved,
            transfers_completed: received.len() as u64,
        })
    }

    /// Listing count and stock per category over non-depleted, unexpired items.
    #[instrument(skip(self))]
    pub async fn category_distribution(&self) -> Result<Vec<CategoryBreakdown>, ServiceError> {
        let items = self.stocked_items(Utc::now()).await?;
        Ok(group_by_category(items.iter()))
    }

    /// Same grouping restricted to items currently surplus or critical.
    pub async fn surplus_by_category(&self) -> Result<Vec<CategoryBreakdown>, ServiceError> {
        self.surplus_by_category_at(Utc::now()).await
    }

    async fn surplus_by_category_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CategoryBreakdown>, ServiceError> {
        let items = self.stocked_items(now).await?;
        Ok(group_by_category(
            items.iter().filter(|item| item.status_at(now).is_offered()),
        ))
    }

    #[instrument(skip(self))]
    pub async fn transfers_by_status(&self) -> Result<Vec<StatusCount>, ServiceError> {
        let requests = TransferRequestEntity::find()
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut counts: HashMap<TransferStatus, u64> = HashMap::new();
        for request in &requests {
            *counts.entry(request.status).or_default() += 1;
        }

        Ok(TransferStatus::iter()
            .filter_map(|status| {
                counts
                    .get(&status)
                    .map(|&count| StatusCount { status, count })
            })
            .collect())
    }

    /// Centers ranked by completed transfers sent, then units shared, then id.
    #[instrument(skip(self))]
    pub async fn top_centers(&self, limit: Option<u64>) -> Result<Vec<TopCenter>, ServiceError> {
        let limit = limit.unwrap_or(self.default_top_centers);
        if limit == 0 || limit > TOP_CENTERS_MAX_LIMIT {
            return Err(ServiceError::ValidationError(format!(
                "limit must be between 1 and {}",
                TOP_CENTERS_MAX_LIMIT
            )));
        }

        let db = &*self.db;
        let received = TransferRequestEntity::find()
            .filter(transfer_request::Column::Status.eq(TransferStatus::Received))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let centers: HashMap<Uuid, health_center::Model> = HealthCenterEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let mut totals: HashMap<Uuid, (u64, i64)> = HashMap::new();
        for request in &received {
            let entry = totals.entry(request.sender_center_id).or_default();
            entry.0 += 1;
            entry.1 += i64::from(request.quantity);
        }

        let mut ranked: Vec<(Uuid, u64, i64)> = totals
            .into_iter()
            .map(|(id, (sent, shared))| (id, sent, shared))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)).then(a.0.cmp(&b.0)));

        Ok(ranked
            .into_iter()
            .filter_map(|(id, transfers_sent, items_shared)| {
                centers.get(&id).map(|center| TopCenter {
                    sender_center: CenterSummary::from(center),
                    transfers_sent,
                    items_shared,
                })
            })
            .take(limit as usize)
            .collect())
    }

    /// Listings still on offer: some stock left and not yet expired.
    async fn stocked_items(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let items = InventoryItemEntity::find()
            .filter(inventory_item::Column::Quantity.gt(0))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(items
            .into_iter()
            .filter(|item| item.status_at(now) != InventoryStatus::Expired)
            .collect())
    }
}

/// Groups items by category in declaration order, omitting empty categories.
fn group_by_category<'a>(
    items: impl Iterator<Item = &'a inventory_item::Model>,
) -> Vec<CategoryBreakdown> {
    let mut totals: HashMap<ItemCategory, (u64, i64)> = HashMap::new();
    for item in items {
        let entry = totals.entry(item.category).or_default();
        entry.0 += 1;
        entry.1 += i64::from(item.quantity);
    }

    ItemCategory::iter()
        .filter_map(|category| {
            totals
                .get(&category)
                .map(|&(count, total_quantity)| CategoryBreakdown {
                    category,
                    count,
                    total_quantity,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(category: ItemCategory, quantity: i32) -> inventory_item::Model {
        let now = Utc::now();
        inventory_item::Model {
            id: Uuid::new_v4(),
            center_id: Uuid::new_v4(),
            item_name: "x".into(),
            category,
            quantity,
            reserved_quantity: 0,
            unit: "units".into(),
            batch_number: String::new(),
            manufacturer: None,
            expiry_date: now.date_naive() + Duration::days(60),
            estimated_unit_value: None,
            notes: None,
            retired_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn groups_in_category_declaration_order() {
        let items = vec![
            item(ItemCategory::Vaccines, 5),
            item(ItemCategory::Medications, 10),
            item(ItemCategory::Vaccines, 7),
        ];
        let grouped = group_by_category(items.iter());
        assert_eq!(
            grouped,
            vec![
                CategoryBreakdown {
                    category: ItemCategory::Medications,
                    count: 1,
                    total_quantity: 10
                },
                CategoryBreakdown {
                    category: ItemCategory::Vaccines,
                    count: 2,
                    total_quantity: 12
                },
            ]
        );
    }

    #[test]
    fn top_center_serializes_sender_center_key() {
        let center = TopCenter {
            sender_center: CenterSummary {
                id: Uuid::nil(),
                name: "North Clinic".into(),
                city: "Dammam".into(),
            },
            transfers_sent: 2,
            items_shared: 40,
        };
        let json = serde_json::to_value(&center).unwrap();
        assert_eq!(json["senderCenter"]["name"], "North Clinic");
        assert_eq!(json["items_shared"], 40);
    }
}
