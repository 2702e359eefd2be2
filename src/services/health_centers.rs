use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::health_center::{self, Entity as HealthCenterEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateHealthCenterRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 200))]
    pub name_ar: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    pub region: Option<String>,
    #[validate(email)]
    pub manager_email: Option<String>,
    #[validate(length(max = 32))]
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SetCenterActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Health center as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthCenterView {
    pub id: Uuid,
    pub name: String,
    pub name_ar: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub manager_email: Option<String>,
    pub contact_info: ContactInfo,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<health_center::Model> for HealthCenterView {
    fn from(model: health_center::Model) -> Self {
        Self {
            id: model.id,
            contact_info: ContactInfo {
                phone: model.contact_phone,
                email: model.manager_email.clone(),
            },
            name: model.name,
            name_ar: model.name_ar,
            city: model.city,
            region: model.region,
            manager_email: model.manager_email,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Compact center reference embedded in items and transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CenterSummary {
    pub id: Uuid,
    pub name: String,
    pub city: String,
}

impl From<&health_center::Model> for CenterSummary {
    fn from(model: &health_center::Model) -> Self {
        Self {
            id: model.id,
            name: model.name.clone(),
            city: model.city.clone(),
        }
    }
}

/// Loads a center or fails with `NotFound`.
pub async fn find_center<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<health_center::Model, ServiceError> {
    HealthCenterEntity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Health center {} not found", id)))
}

#[derive(Clone)]
pub struct HealthCenterService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl HealthCenterService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list_centers(
        &self,
        active_only: bool,
    ) -> Result<Vec<health_center::Model>, ServiceError> {
        let mut query = HealthCenterEntity::find();
        if active_only {
            query = query.filter(health_center::Column::IsActive.eq(true));
        }
        query
            .order_by_asc(health_center::Column::Name)
            .order_by_asc(health_center::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get_center(&self, id: Uuid) -> Result<health_center::Model, ServiceError> {
        find_center(&*self.db, id).await
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_center(
        &self,
        request: CreateHealthCenterRequest,
    ) -> Result<health_center::Model, ServiceError> {
        request.validate()?;
        if request.name.trim().is_empty() || request.city.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "name and city must not be blank".to_string(),
            ));
        }

        let now = Utc::now();
        let center = health_center::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            name_ar: Set(non_blank(request.name_ar)),
            city: Set(request.city.trim().to_string()),
            region: Set(non_blank(request.region)),
            manager_email: Set(non_blank(request.manager_email)),
            contact_phone: Set(non_blank(request.contact_phone)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(center_id = %center.id, "Health center registered");
        self.event_sender
            .publish(Event::HealthCenterRegistered(center.id))
            .await;

        Ok(center)
    }

    #[instrument(skip(self))]
    pub async fn set_center_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<health_center::Model, ServiceError> {
        let center = find_center(&*self.db, id).await?;
        if center.is_active == is_active {
            return Ok(center);
        }

        let mut active: health_center::ActiveModel = center.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        let updated = active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        info!(center_id = %id, is_active, "Health center status changed");
        self.event_sender
            .publish(Event::HealthCenterStatusChanged {
                center_id: id,
                is_active,
            })
            .await;

        Ok(updated)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_nests_contact_info() {
        let now = Utc::now();
        let view = HealthCenterView::from(health_center::Model {
            id: Uuid::new_v4(),
            name: "Al Noor Clinic".into(),
            name_ar: Some("عيادة النور".into()),
            city: "Riyadh".into(),
            region: None,
            manager_email: Some("manager@alnoor.example".into()),
            contact_phone: Some("+966-11-000-0000".into()),
            is_active: true,
            created_at: now,
            updated_at: now,
        });

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["contact_info"]["phone"], "+966-11-000-0000");
        assert_eq!(json["contact_info"]["email"], "manager@alnoor.example");
    }

    #[test]
    fn create_request_rejects_bad_email() {
        let request = CreateHealthCenterRequest {
            name: "Clinic".into(),
            name_ar: None,
            city: "Jeddah".into(),
            region: None,
            manager_email: Some("not-an-email".into()),
            contact_phone: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn blank_optionals_are_dropped() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" x ".into())), Some("x".into()));
    }
}
