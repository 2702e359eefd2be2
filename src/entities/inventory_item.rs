use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::inventory_status::{self, InventoryStatus};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemCategory {
    #[sea_orm(string_value = "medications")]
    Medications,
    #[sea_orm(string_value = "dental_supplies")]
    DentalSupplies,
    #[sea_orm(string_value = "medical_equipment")]
    MedicalEquipment,
    #[sea_orm(string_value = "consumables")]
    Consumables,
    #[sea_orm(string_value = "vaccines")]
    Vaccines,
    #[sea_orm(string_value = "other")]
    Other,
}

/// Stock listed by a single health center.
///
/// `reserved_quantity` is the running total held by open transfer requests and
/// is only ever changed through conditional updates.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub center_id: Uuid,
    pub item_name: String,
    pub category: ItemCategory,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub unit: String,
    pub batch_number: String,
    pub manufacturer: Option<String>,
    pub expiry_date: NaiveDate,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub estimated_unit_value: Option<Decimal>,
    pub notes: Option<String>,
    pub retired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn available_quantity(&self) -> i32 {
        self.quantity - self.reserved_quantity
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> InventoryStatus {
        inventory_status::derive_status(
            self.quantity,
            self.reserved_quantity,
            self.expiry_date,
            now,
        )
    }

    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        inventory_status::days_until_expiry(self.expiry_date, now)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::health_center::Entity",
        from = "Column::CenterId",
        to = "super::health_center::Column::Id"
    )]
    HealthCenter,
    #[sea_orm(has_many = "super::transfer_request::Entity")]
    TransferRequests,
}

impl Related<super::health_center::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::HealthCenter.def()
    }
}

impl Related<super::transfer_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransferRequests.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if !insert {
            active_model.updated_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
