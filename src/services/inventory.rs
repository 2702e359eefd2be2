//! Inventory store: surplus listings owned by health centers.
//!
//! `quantity` and `reserved_quantity` only move through conditional
//! `UPDATE ... WHERE` statements, so `0 <= reserved_quantity <= quantity`
//! holds without a global lock. The transfer workflow uses
//! [`reserve_quantity`], [`release_reservation`] and [`consume_reservation`]
//! inside its own transactions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::begin_write,
    entities::{
        health_center::{self, Entity as HealthCenterEntity},
        inventory_item::{self, Entity as InventoryItemEntity, ItemCategory},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        health_centers::{find_center, CenterSummary},
        inventory_status::InventoryStatus,
    },
};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InventoryFilter {
    /// Case-insensitive substring of the item name
    pub search: Option<String>,
    pub category: Option<ItemCategory>,
    /// Exact city of the owning center
    pub city: Option<String>,
    pub status: Option<InventoryStatus>,
    pub center_id: Option<Uuid>,
    /// Include depleted and expired items
    #[serde(default)]
    pub include_retired: bool,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SurplusFilter {
    pub search: Option<String>,
    pub category: Option<ItemCategory>,
    pub city: Option<String>,
    /// Hide listings owned by this center (usually the caller's own)
    pub exclude_center_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateInventoryItemRequest {
    pub center_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub item_name: String,
    pub category: ItemCategory,
    pub quantity: Option<i32>,
    #[validate(length(max = 32))]
    pub unit: Option<String>,
    #[validate(length(max = 64))]
    pub batch_number: Option<String>,
    #[validate(length(max = 200))]
    pub manufacturer: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub estimated_unit_value: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AdjustQuantityRequest {
    /// Signed change applied to the on-hand quantity
    pub delta: i32,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Inventory item with its derived fields, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryItemView {
    pub id: Uuid,
    pub center_id: Uuid,
    pub item_name: String,
    pub category: ItemCategory,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub available_quantity: i32,
    pub unit: String,
    pub batch_number: String,
    pub manufacturer: Option<String>,
    pub expiry_date: NaiveDate,
    pub days_until_expiry: i64,
    pub status: InventoryStatus,
    pub estimated_unit_value: Option<Decimal>,
    pub notes: Option<String>,
    pub retired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub health_center: Option<CenterSummary>,
}

impl InventoryItemView {
    pub fn from_model(
        model: inventory_item::Model,
        center: Option<&health_center::Model>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status: model.status_at(now),
            days_until_expiry: model.days_until_expiry(now),
            available_quantity: model.available_quantity(),
            health_center: center.map(CenterSummary::from),
            id: model.id,
            center_id: model.center_id,
            item_name: model.item_name,
            category: model.category,
            quantity: model.quantity,
            reserved_quantity: model.reserved_quantity,
            unit: model.unit,
            batch_number: model.batch_number,
            manufacturer: model.manufacturer,
            expiry_date: model.expiry_date,
            estimated_unit_value: model.estimated_unit_value,
            notes: model.notes,
            retired_at: model.retired_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Loads an item or fails with `NotFound`.
pub async fn find_item<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<inventory_item::Model, ServiceError> {
    InventoryItemEntity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Inventory item {} not found", id)))
}

/// Atomically holds `quantity` units of an item for a transfer request.
///
/// The availability check and the increment are one statement; zero rows
/// affected means another request got there first.
pub async fn reserve_quantity<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = InventoryItemEntity::update_many()
        .col_expr(
            inventory_item::Column::ReservedQuantity,
            Expr::col(inventory_item::Column::ReservedQuantity).add(quantity),
        )
        .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(inventory_item::Column::Id.eq(item_id))
        .filter(
            Expr::expr(
                Expr::col(inventory_item::Column::Quantity)
                    .sub(Expr::col(inventory_item::Column::ReservedQuantity)),
            )
            .gte(quantity),
        )
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        metrics::RESERVATION_CONFLICTS.inc();
        let item = find_item(conn, item_id).await?;
        return Err(ServiceError::InsufficientQuantity(format!(
            "requested {} but only {} available",
            quantity,
            item.available_quantity().max(0)
        )));
    }

    Ok(())
}

/// Returns held units to the available pool without touching on-hand stock.
pub async fn release_reservation<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = InventoryItemEntity::update_many()
        .col_expr(
            inventory_item::Column::ReservedQuantity,
            Expr::col(inventory_item::Column::ReservedQuantity).sub(quantity),
        )
        .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(inventory_item::Column::Id.eq(item_id))
        .filter(inventory_item::Column::ReservedQuantity.gte(quantity))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Err(ServiceError::InternalError(format!(
            "reservation of {} units on item {} is missing",
            quantity, item_id
        )));
    }
    Ok(())
}

/// Removes delivered units from stock and drops their reservation in one
/// statement. Retires the item when it runs out.
pub async fn consume_reservation<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
    quantity: i32,
) -> Result<inventory_item::Model, ServiceError> {
    let now = Utc::now();
    let result = InventoryItemEntity::update_many()
        .col_expr(
            inventory_item::Column::Quantity,
            Expr::col(inventory_item::Column::Quantity).sub(quantity),
        )
        .col_expr(
            inventory_item::Column::ReservedQuantity,
            Expr::col(inventory_item::Column::ReservedQuantity).sub(quantity),
        )
        .col_expr(inventory_item::Column::UpdatedAt, Expr::value(now))
        .filter(inventory_item::Column::Id.eq(item_id))
        .filter(inventory_item::Column::ReservedQuantity.gte(quantity))
        .filter(inventory_item::Column::Quantity.gte(quantity))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Err(ServiceError::InternalError(format!(
            "reservation of {} units on item {} is missing",
            quantity, item_id
        )));
    }

    let item = find_item(conn, item_id).await?;
    if item.quantity == 0 && item.retired_at.is_none() {
        let mut active: inventory_item::ActiveModel = item.into();
        active.retired_at = Set(Some(now));
        return active.update(conn).await.map_err(ServiceError::db_error);
    }
    Ok(item)
}

#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    max_retries: u32,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>, max_retries: u32) -> Self {
        Self {
            db,
            event_sender,
            max_retries: max_retries.max(1),
        }
    }

    async fn centers_by_id(&self) -> Result<HashMap<Uuid, health_center::Model>, ServiceError> {
        let centers = HealthCenterEntity::find()
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(centers.into_iter().map(|c| (c.id, c)).collect())
    }

    /// Lists items ordered by expiry date, soonest first.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: InventoryFilter) -> Result<Vec<InventoryItemView>, ServiceError> {
        let now = Utc::now();
        let mut query = InventoryItemEntity::find();
        if let Some(category) = filter.category {
            query = query.filter(inventory_item::Column::Category.eq(category));
        }
        if let Some(center_id) = filter.center_id {
            query = query.filter(inventory_item::Column::CenterId.eq(center_id));
        }
        if !filter.include_retired {
            query = query.filter(inventory_item::Column::Quantity.gt(0));
        }

        let items = query
            .order_by_asc(inventory_item::Column::ExpiryDate)
            .order_by_asc(inventory_item::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        let centers = self.centers_by_id().await?;

        let search = normalized(filter.search.as_deref());
        let city = filter.city.as_deref();
        // Expired listings are retired unless asked for explicitly
        let show_expired =
            filter.include_retired || filter.status == Some(InventoryStatus::Expired);

        Ok(items
            .into_iter()
            .filter(|item| matches_search(item, search.as_deref()))
            .filter(|item| matches_city(centers.get(&item.center_id), city))
            .filter(|item| {
                let status = item.status_at(now);
                filter.status.map_or(true, |s| status == s)
                    && (show_expired || status != InventoryStatus::Expired)
            })
            .map(|item| {
                let center = centers.get(&item.center_id);
                InventoryItemView::from_model(item, center, now)
            })
            .collect())
    }

    /// Items other centers can still request: surplus or critical with free units.
    #[instrument(skip(self))]
    pub async fn list_surplus(
        &self,
        filter: SurplusFilter,
    ) -> Result<Vec<InventoryItemView>, ServiceError> {
        let now = Utc::now();
        let mut query = InventoryItemEntity::find().filter(inventory_item::Column::Quantity.gt(0));
        if let Some(category) = filter.category {
            query = query.filter(inventory_item::Column::Category.eq(category));
        }
        if let Some(excluded) = filter.exclude_center_id {
            query = query.filter(inventory_item::Column::CenterId.ne(excluded));
        }

        let items = query
            .order_by_asc(inventory_item::Column::ExpiryDate)
            .order_by_asc(inventory_item::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        let centers = self.centers_by_id().await?;

        let search = normalized(filter.search.as_deref());

        Ok(items
            .into_iter()
            .filter(|item| item.status_at(now).is_offered() && item.available_quantity() > 0)
            .filter(|item| matches_search(item, search.as_deref()))
            .filter(|item| matches_city(centers.get(&item.center_id), filter.city.as_deref()))
            .map(|item| {
                let center = centers.get(&item.center_id);
                InventoryItemView::from_model(item, center, now)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<InventoryItemView, ServiceError> {
        let item = find_item(&*self.db, id).await?;
        let center = HealthCenterEntity::find_by_id(item.center_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(InventoryItemView::from_model(item, center.as_ref(), Utc::now()))
    }

    #[instrument(skip(self, request), fields(center_id = %request.center_id))]
    pub async fn create(
        &self,
        request: CreateInventoryItemRequest,
    ) -> Result<InventoryItemView, ServiceError> {
        request.validate()?;
        let quantity = request
            .quantity
            .ok_or_else(|| ServiceError::ValidationError("quantity is required".to_string()))?;
        let expiry_date = request
            .expiry_date
            .ok_or_else(|| ServiceError::ValidationError("expiry_date is required".to_string()))?;
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be greater than zero".to_string(),
            ));
        }
        if request.item_name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "item_name must not be blank".to_string(),
            ));
        }
        if request
            .estimated_unit_value
            .map_or(false, |v| v.is_sign_negative())
        {
            return Err(ServiceError::ValidationError(
                "estimated_unit_value must not be negative".to_string(),
            ));
        }

        let center = find_center(&*self.db, request.center_id).await?;
        if !center.is_active {
            return Err(ServiceError::InvalidRequest(format!(
                "Health center {} is inactive",
                center.id
            )));
        }

        let now = Utc::now();
        let item = inventory_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            center_id: Set(center.id),
            item_name: Set(request.item_name.trim().to_string()),
            category: Set(request.category),
            quantity: Set(quantity),
            reserved_quantity: Set(0),
            unit: Set(request
                .unit
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| "units".to_string())),
            batch_number: Set(request.batch_number.unwrap_or_default()),
            manufacturer: Set(request.manufacturer),
            expiry_date: Set(expiry_date),
            estimated_unit_value: Set(request.estimated_unit_value),
            notes: Set(request.notes),
            retired_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(item_id = %item.id, quantity, "Inventory item listed");
        self.event_sender
            .publish(Event::InventoryItemListed {
                item_id: item.id,
                center_id: item.center_id,
                quantity,
            })
            .await;

        Ok(InventoryItemView::from_model(item, Some(&center), now))
    }

    /// Applies a signed correction to on-hand stock. Stock may never drop
    /// below zero or below what open transfer requests hold.
    #[instrument(skip(self))]
    pub async fn adjust_quantity(
        &self,
        id: Uuid,
        delta: i32,
        reason: Option<String>,
    ) -> Result<InventoryItemView, ServiceError> {
        for attempt in 1..=self.max_retries {
            match self.try_adjust(id, delta).await {
                Ok(Some((before, updated, center))) => {
                    info!(item_id = %id, old = before, new = updated.quantity, "Inventory quantity adjusted");
                    self.event_sender
                        .publish(Event::InventoryQuantityAdjusted {
                            item_id: id,
                            old_quantity: before,
                            new_quantity: updated.quantity,
                            reason,
                        })
                        .await;
                    return Ok(InventoryItemView::from_model(updated, Some(&center), Utc::now()));
                }
                Ok(None) => {
                    warn!(item_id = %id, attempt, "Inventory item changed during adjustment, retrying");
                }
                Err(e) if e.is_retryable() => {
                    metrics::WRITE_RETRIES.inc();
                    warn!(item_id = %id, attempt, error = %e, "Database busy during adjustment, retrying");
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(ServiceError::Conflict(format!(
            "Inventory item {} was modified concurrently",
            id
        )))
    }

    /// One guarded adjustment. `None` means the on-hand quantity moved
    /// between the read and the update.
    async fn try_adjust(
        &self,
        id: Uuid,
        delta: i32,
    ) -> Result<Option<(i32, inventory_item::Model, health_center::Model)>, ServiceError> {
        let txn = begin_write(&self.db).await?;

        let item = find_item(&*txn, id).await?;
        let center = find_center(&*txn, item.center_id).await?;

        let new_quantity = item.quantity.checked_add(delta).ok_or_else(|| {
            ServiceError::ValidationError("quantity adjustment overflows".to_string())
        })?;
        if new_quantity < 0 || new_quantity < item.reserved_quantity {
            return Err(ServiceError::InsufficientQuantity(format!(
                "adjusting by {} would leave {} units with {} reserved",
                delta, new_quantity, item.reserved_quantity
            )));
        }

        let now = Utc::now();
        let retired_at = if new_quantity == 0 {
            item.retired_at.or(Some(now))
        } else {
            None
        };

        let result = InventoryItemEntity::update_many()
            .col_expr(inventory_item::Column::Quantity, Expr::value(new_quantity))
            .col_expr(inventory_item::Column::RetiredAt, Expr::value(retired_at))
            .col_expr(inventory_item::Column::UpdatedAt, Expr::value(now))
            .filter(inventory_item::Column::Id.eq(id))
            .filter(inventory_item::Column::Quantity.eq(item.quantity))
            .filter(inventory_item::Column::ReservedQuantity.lte(new_quantity))
            .exec(&*txn)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        let updated = find_item(&*txn, id).await?;
        txn.commit().await?;
        Ok(Some((item.quantity, updated, center)))
    }
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

fn matches_search(item: &inventory_item::Model, search: Option<&str>) -> bool {
    search.map_or(true, |needle| item.item_name.to_lowercase().contains(needle))
}

fn matches_city(center: Option<&health_center::Model>, city: Option<&str>) -> bool {
    match city {
        None => true,
        Some(city) => center.map_or(false, |c| c.city == city),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(name: &str, quantity: i32, reserved: i32, days: i64) -> inventory_item::Model {
        let now = Utc::now();
        inventory_item::Model {
            id: Uuid::new_v4(),
            center_id: Uuid::new_v4(),
            item_name: name.into(),
            category: ItemCategory::Medications,
            quantity,
            reserved_quantity: reserved,
            unit: "boxes".into(),
            batch_number: "B-1".into(),
            manufacturer: None,
            expiry_date: now.date_naive() + Duration::days(days),
            estimated_unit_value: None,
            notes: None,
            retired_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let amox = item("Amoxicillin 500mg", 10, 0, 40);
        let needle = normalized(Some("  AMOXI "));
        assert!(matches_search(&amox, needle.as_deref()));
        assert!(!matches_search(&amox, Some("ibuprofen")));
        assert!(matches_search(&amox, None));
    }

    #[test]
    fn city_filter_is_exact() {
        let now = Utc::now();
        let center = health_center::Model {
            id: Uuid::new_v4(),
            name: "Al Noor Primary Care".into(),
            name_ar: None,
            city: "Riyadh".into(),
            region: None,
            manager_email: None,
            contact_phone: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(matches_city(Some(&center), Some("Riyadh")));
        assert!(!matches_city(Some(&center), Some("riyadh")));
        assert!(!matches_city(None, Some("Riyadh")));
        assert!(matches_city(None, None));
    }

    #[test]
    fn view_carries_derived_fields() {
        let model = item("Gauze", 100, 30, 10);
        let view = InventoryItemView::from_model(model, None, Utc::now());
        assert_eq!(view.available_quantity, 70);
        assert_eq!(view.status, InventoryStatus::Critical);
        assert_eq!(view.days_until_expiry, 10);
    }
}
