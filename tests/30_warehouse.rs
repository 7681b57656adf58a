mod common;

use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crewplan_api::database::models::{NewReservation, NewWarehouseItem, WarehouseItem};
use crewplan_api::database::DatabaseManager;
use crewplan_api::services::warehouse;
use crewplan_api::types::Role;

async fn seed_item(db: &DatabaseManager, quantity_total: i32) -> Result<WarehouseItem> {
    let mut tx = db.service_tx().await?;
    let input = NewWarehouseItem {
        sku: common::unique("MH"),
        name: "Moving head".to_string(),
        category: Some("lights".to_string()),
        unit: None,
        quantity_total,
        replacement_value: None,
        notes: None,
    };
    let item = warehouse::create_item(&mut tx, &input).await?;
    tx.commit().await?;
    Ok(item)
}

fn reservation(item_id: Uuid, quantity: i32, start_at: DateTime<Utc>, hours: i64) -> NewReservation {
    NewReservation {
        event_id: None,
        item_id: Some(item_id),
        kit_id: None,
        quantity: Some(quantity),
        start_at: Some(start_at),
        end_at: Some(start_at + Duration::hours(hours)),
        notes: None,
    }
}

#[tokio::test]
async fn insufficient_stock_reports_availability() -> Result<()> {
    let Some(db) = common::database().await else { return Ok(()) };
    let owner = common::seed_user(&db, Role::Manager, &[], &[]).await?;
    let item = seed_item(&db, 5).await?;
    let start = Utc::now() + Duration::days(30);

    let mut tx = db.service_tx().await?;
    let created = warehouse::create_reservations(&mut tx, &reservation(item.id, 3, start, 8), owner.id).await?;
    assert_eq!(created.len(), 1);
    tx.commit().await?;

    let mut tx = db.service_tx().await?;
    let overlapping = reservation(item.id, 3, start + Duration::hours(4), 8);
    let err = warehouse::create_reservations(&mut tx, &overlapping, owner.id).await.unwrap_err();
    assert_eq!(err.status_code(), 409);
    let detail = &err.to_json()["detail"];
    assert_eq!(detail["item_id"], json!(item.id));
    assert_eq!(detail["requested"], 3);
    assert_eq!(detail["available"], 2);
    drop(tx);

    // windows are half-open, so a booking starting at the previous end fits
    let mut tx = db.service_tx().await?;
    let adjacent = reservation(item.id, 5, start + Duration::hours(8), 4);
    assert!(warehouse::create_reservations(&mut tx, &adjacent, owner.id).await.is_ok());
    tx.commit().await?;
    Ok(())
}

#[tokio::test]
async fn concurrent_reservations_wait_for_the_item_lock() -> Result<()> {
    let Some(db) = common::database().await else { return Ok(()) };
    let owner = common::seed_user(&db, Role::Manager, &[], &[]).await?;
    let item = seed_item(&db, 5).await?;
    let input = reservation(item.id, 3, Utc::now() + Duration::days(40), 6);

    let mut first = db.service_tx().await?;
    warehouse::create_reservations(&mut first, &input, owner.id).await?;

    let second = {
        let db = db.clone();
        let input = input.clone();
        let owner_id = owner.id;
        tokio::spawn(async move {
            let mut tx = db.service_tx().await?;
            let outcome = warehouse::create_reservations(&mut tx, &input, owner_id).await;
            if outcome.is_ok() {
                tx.commit().await?;
            }
            Ok::<_, anyhow::Error>(outcome.map(|created| created.len()).map_err(|e| e.status_code()))
        })
    };

    // the second writer blocks on the row lock until the first commits
    tokio::time::sleep(StdDuration::from_millis(300)).await;
    assert!(!second.is_finished());
    first.commit().await?;

    assert_eq!(second.await??, Err(409));
    Ok(())
}

#[tokio::test]
async fn duplicate_sku_conflicts() -> Result<()> {
    let Some(db) = common::database().await else { return Ok(()) };
    let item = seed_item(&db, 1).await?;

    let mut tx = db.service_tx().await?;
    let duplicate = NewWarehouseItem {
        sku: item.sku.to_lowercase(),
        name: "Another moving head".to_string(),
        category: None,
        unit: None,
        quantity_total: 2,
        replacement_value: None,
        notes: None,
    };
    let err = warehouse::create_item(&mut tx, &duplicate).await.unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert_eq!(err.to_json()["detail"]["sku"], json!(item.sku));
    Ok(())
}
