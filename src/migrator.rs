use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_health_centers_table::Migration),
            Box::new(m20250101_000002_create_inventory_items_table::Migration),
            Box::new(m20250101_000003_create_transfer_requests_table::Migration),
            Box::new(m20250101_000004_create_transfer_status_history_table::Migration),
        ]
    }
}

mod m20250101_000001_create_health_centers_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_health_centers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(HealthCenters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(HealthCenters::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(HealthCenters::Name).string().not_null())
                        .col(ColumnDef::new(HealthCenters::NameAr).string().null())
                        .col(ColumnDef::new(HealthCenters::City).string().not_null())
                        .col(ColumnDef::new(HealthCenters::Region).string().null())
                        .col(ColumnDef::new(HealthCenters::ManagerEmail).string().null())
                        .col(ColumnDef::new(HealthCenters::ContactPhone).string().null())
                        .col(
                            ColumnDef::new(HealthCenters::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(HealthCenters::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(HealthCenters::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_health_centers_city")
                        .table(HealthCenters::Table)
                        .col(HealthCenters::City)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(HealthCenters::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum HealthCenters {
        Table,
        Id,
        Name,
        NameAr,
        City,
        Region,
        ManagerEmail,
        ContactPhone,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_inventory_items_table {
    use super::m20250101_000001_create_health_centers_table::HealthCenters;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_inventory_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::CenterId).uuid().not_null())
                        .col(ColumnDef::new(InventoryItems::ItemName).string().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::Category)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::ReservedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(InventoryItems::Unit).string().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::BatchNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::Manufacturer).string().null())
                        .col(ColumnDef::new(InventoryItems::ExpiryDate).date().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::EstimatedUnitValue)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(ColumnDef::new(InventoryItems::Notes).text().null())
                        .col(
                            ColumnDef::new(InventoryItems::RetiredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_items_center_id")
                                .from(InventoryItems::Table, InventoryItems::CenterId)
                                .to(HealthCenters::Table, HealthCenters::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_center_id")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::CenterId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_expiry_date")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::ExpiryDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum InventoryItems {
        Table,
        Id,
        CenterId,
        ItemName,
        Category,
        Quantity,
        ReservedQuantity,
        Unit,
        BatchNumber,
        Manufacturer,
        ExpiryDate,
        EstimatedUnitValue,
        Notes,
        RetiredAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000003_create_transfer_requests_table {
    use super::m20250101_000001_create_health_centers_table::HealthCenters;
    use super::m20250101_000002_create_inventory_items_table::InventoryItems;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_transfer_requests_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(TransferRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransferRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferRequests::TrackingNumber)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransferRequests::ItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(TransferRequests::SenderCenterId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferRequests::ReceiverCenterId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferRequests::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferRequests::Priority)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferRequests::RequesterName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferRequests::RequesterEmail)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransferRequests::Reason).text().null())
                        .col(
                            ColumnDef::new(TransferRequests::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferRequests::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(TransferRequests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferRequests::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_requests_item_id")
                                .from(TransferRequests::Table, TransferRequests::ItemId)
                                .to(InventoryItems::Table, InventoryItems::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_requests_sender_center_id")
                                .from(TransferRequests::Table, TransferRequests::SenderCenterId)
                                .to(HealthCenters::Table, HealthCenters::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_requests_receiver_center_id")
                                .from(TransferRequests::Table, TransferRequests::ReceiverCenterId)
                                .to(HealthCenters::Table, HealthCenters::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transfer_requests_tracking_number")
                        .table(TransferRequests::Table)
                        .col(TransferRequests::TrackingNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transfer_requests_item_id")
                        .table(TransferRequests::Table)
                        .col(TransferRequests::ItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transfer_requests_status")
                        .table(TransferRequests::Table)
                        .col(TransferRequests::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TransferRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum TransferRequests {
        Table,
        Id,
        TrackingNumber,
        ItemId,
        SenderCenterId,
        ReceiverCenterId,
        Quantity,
        Priority,
        RequesterName,
        RequesterEmail,
        Reason,
        Status,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000004_create_transfer_status_history_table {
    use super::m20250101_000003_create_transfer_requests_table::TransferRequests;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_transfer_status_history_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(TransferStatusHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransferStatusHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferStatusHistory::TransferRequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferStatusHistory::Sequence)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferStatusHistory::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransferStatusHistory::Note).text().null())
                        .col(
                            ColumnDef::new(TransferStatusHistory::ChangedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_status_history_request_id")
                                .from(
                                    TransferStatusHistory::Table,
                                    TransferStatusHistory::TransferRequestId,
                                )
                                .to(TransferRequests::Table, TransferRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One entry per (request, sequence); a racing writer fails here.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transfer_status_history_request_sequence")
                        .table(TransferStatusHistory::Table)
                        .col(TransferStatusHistory::TransferRequestId)
                        .col(TransferStatusHistory::Sequence)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TransferStatusHistory::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum TransferStatusHistory {
        Table,
        Id,
        TransferRequestId,
        Sequence,
        Status,
        Note,
        ChangedAt,
    }
}

/// Connects to `db_url` and applies all pending migrations.
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");
    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
