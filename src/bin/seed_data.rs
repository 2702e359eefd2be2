//! Seed data script - populates the database with demo centers and listings
//!
//! Run with: cargo run --bin seed-data -- --database-url sqlite://medsurplus.db?mode=rwc
//!
//! This creates:
//! - 4 health centers in three cities
//! - inventory spread across every status window (available, surplus, critical)

use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Parser;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::info;

use medsurplus_api::{
    db,
    entities::inventory_item::ItemCategory,
    events::{process_events, EventSender},
    services::{
        health_centers::{CreateHealthCenterRequest, HealthCenterService},
        inventory::{CreateInventoryItemRequest, InventoryService},
    },
};

#[derive(Parser, Debug)]
#[command(name = "seed-data", about = "Populate the database with demo data")]
struct Args {
    /// Database to seed; migrations are applied first
    #[arg(long, default_value = "sqlite://medsurplus.db?mode=rwc")]
    database_url: String,
}

struct CenterSeed {
    name: &'static str,
    name_ar: &'static str,
    city: &'static str,
    region: &'static str,
    email: &'static str,
}

const CENTERS: &[CenterSeed] = &[
    CenterSeed {
        name: "Al Noor Primary Care",
        name_ar: "مركز النور للرعاية الأولية",
        city: "Riyadh",
        region: "Central",
        email: "manager@alnoor.example.org",
    },
    CenterSeed {
        name: "King Fahd District Clinic",
        name_ar: "عيادة حي الملك فهد",
        city: "Riyadh",
        region: "Central",
        email: "supply@kfdc.example.org",
    },
    CenterSeed {
        name: "Corniche Health Center",
        name_ar: "مركز الكورنيش الصحي",
        city: "Jeddah",
        region: "Western",
        email: "stores@corniche.example.org",
    },
    CenterSeed {
        name: "Eastern Dental Center",
        name_ar: "مركز الشرقية لطب الأسنان",
        city: "Dammam",
        region: "Eastern",
        email: "admin@easterndental.example.org",
    },
];

/// (center index, name, category, quantity, unit, days until expiry, unit value in cents)
const ITEMS: &[(usize, &str, ItemCategory, i32, &str, i64, i64)] = &[
    (0, "Amoxicillin 500mg capsules", ItemCategory::Medications, 400, "capsules", 21, 35),
    (0, "Nitrile examination gloves (M)", ItemCategory::Consumables, 1200, "pairs", 75, 12),
    (1, "Insulin glargine pens", ItemCategory::Medications, 60, "pens", 14, 4200),
    (1, "Hepatitis B vaccine", ItemCategory::Vaccines, 80, "doses", 45, 1850),
    (2, "Portable pulse oximeter", ItemCategory::MedicalEquipment, 12, "units", 200, 9500),
    (2, "Sterile gauze pads 10x10", ItemCategory::Consumables, 900, "pads", 28, 8),
    (3, "Composite resin syringes", ItemCategory::DentalSupplies, 150, "syringes", 60, 2200),
    (3, "Lidocaine 2% cartridges", ItemCategory::DentalSupplies, 300, "cartridges", 9, 150),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    info!("=== MedSurplus Seed Data ===");

    info!("Connecting to database: {}", args.database_url);
    let pool = db::establish_connection(&args.database_url).await?;
    db::run_migrations(&pool).await?;
    let pool = Arc::new(pool);

    let (tx, rx) = mpsc::channel(256);
    let events = Arc::new(EventSender::new(tx));
    let consumer = tokio::spawn(process_events(rx));

    let centers = HealthCenterService::new(pool.clone(), events.clone());
    let inventory = InventoryService::new(pool.clone(), events.clone(), 3);

    info!("Creating health centers...");
    let mut center_ids = Vec::with_capacity(CENTERS.len());
    for seed in CENTERS {
        let center = centers
            .create_center(CreateHealthCenterRequest {
                name: seed.name.to_string(),
                name_ar: Some(seed.name_ar.to_string()),
                city: seed.city.to_string(),
                region: Some(seed.region.to_string()),
                manager_email: Some(seed.email.to_string()),
                contact_phone: None,
            })
            .await?;
        center_ids.push(center.id);
    }
    info!("  Created {} centers", center_ids.len());

    info!("Creating inventory...");
    let today = Utc::now().date_naive();
    for &(center, name, category, quantity, unit, days, cents) in ITEMS {
        let item = inventory
            .create(CreateInventoryItemRequest {
                center_id: center_ids[center],
                item_name: name.to_string(),
                category,
                quantity: Some(quantity),
                unit: Some(unit.to_string()),
                batch_number: None,
                manufacturer: None,
                expiry_date: Some(today + Duration::days(days)),
                estimated_unit_value: Some(Decimal::new(cents, 2)),
                notes: None,
            })
            .await?;
        info!("  {} -> {}", item.item_name, item.status);
    }

    drop(centers);
    drop(inventory);
    drop(events);
    consumer.await?;

    info!("=== Seed Data Complete ===");
    info!("Try: curl http://localhost:8080/api/v1/inventory/surplus");
    Ok(())
}
