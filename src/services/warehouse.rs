//! Warehouse items, kits, reservations and availability.
//!
//! Availability of an item over [from, to) is its total stock minus the peak
//! quantity held concurrently by active reservations in that window. Writes
//! that can lower availability lock the item row first, so two concurrent
//! reservations cannot both pass the check.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::database::models::{
    KitItem, KitItemInput, NewKit, NewReservation, NewWarehouseItem, PicklistRow, Reservation,
    ReservationPatch, WarehouseItem, WarehouseItemPatch, WarehouseKit, WarehouseKitPatch,
};
use crate::database::{DatabaseError, Repository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::services::events;
use crate::types::ReservationStatus;

/// Stock held by one reservation
#[derive(Debug, Clone, Copy, FromRow)]
pub struct Booking {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub quantity: i32,
}

/// Maximum quantity held at any instant of [from, to).
///
/// Bookings are clipped to the window and swept by boundary; a booking that
/// ends exactly when another starts does not stack with it.
pub fn peak_concurrent(bookings: &[Booking], from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let mut edges: Vec<(DateTime<Utc>, i64)> = Vec::with_capacity(bookings.len() * 2);
    for booking in bookings {
        let start = booking.start_at.max(from);
        let end = booking.end_at.min(to);
        if start < end {
            edges.push((start, i64::from(booking.quantity)));
            edges.push((end, -i64::from(booking.quantity)));
        }
    }
    // releases sort before acquisitions at the same instant
    edges.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut current = 0i64;
    let mut peak = 0i64;
    for (_, delta) in edges {
        current += delta;
        peak = peak.max(current);
    }
    peak
}

pub fn normalize_sku(raw: &str) -> Result<String, ApiError> {
    let sku = raw.trim().to_uppercase();
    if sku.is_empty() {
        return Err(ApiError::invalid_field("sku", "must not be empty"));
    }
    Ok(sku)
}

fn validate_window(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Result<(), ApiError> {
    events::validate_window(start_at, end_at)
}

fn validate_quantity(quantity: i32) -> Result<(), ApiError> {
    if quantity <= 0 {
        return Err(ApiError::invalid_field("quantity", "must be greater than 0"));
    }
    Ok(())
}

// Items

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemListQuery {
    pub category: Option<String>,
    pub active: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl ItemListQuery {
    pub fn to_filter(&self) -> FilterData {
        let mut conditions = Map::new();
        if let Some(category) = &self.category {
            conditions.insert("category".into(), json!(category));
        }
        if let Some(active) = self.active {
            conditions.insert("is_active".into(), json!(active));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            conditions.insert(
                "$or".into(),
                json!([{ "name": { "$ilike": pattern } }, { "sku": { "$ilike": pattern } }]),
            );
        }
        FilterData {
            where_clause: Some(Value::Object(conditions)),
            order: Some(json!("category asc, name asc")),
            limit: self.limit,
            offset: self.offset,
            ..Default::default()
        }
    }
}

pub async fn list_items(conn: &mut PgConnection, query: &ItemListQuery) -> Result<Vec<WarehouseItem>, DatabaseError> {
    Repository::<WarehouseItem>::new("warehouse_items").select_any(conn, query.to_filter()).await
}

pub async fn get_item(conn: &mut PgConnection, id: Uuid) -> Result<WarehouseItem, DatabaseError> {
    Repository::<WarehouseItem>::new("warehouse_items").select_by_id(conn, id).await
}

fn map_duplicate_sku(err: sqlx::Error, sku: &str) -> ApiError {
    let duplicate = matches!(&err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"));
    if duplicate {
        ApiError::conflict_with(format!("SKU {} already exists", sku), json!({ "sku": sku }))
    } else {
        ApiError::from(err)
    }
}

fn validate_item_fields(name: &str, quantity_total: i32) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::invalid_field("name", "must not be empty"));
    }
    if quantity_total < 0 {
        return Err(ApiError::invalid_field("quantity_total", "must not be negative"));
    }
    Ok(())
}

pub async fn create_item(conn: &mut PgConnection, input: &NewWarehouseItem) -> Result<WarehouseItem, ApiError> {
    let sku = normalize_sku(&input.sku)?;
    validate_item_fields(&input.name, input.quantity_total)?;

    sqlx::query_as::<_, WarehouseItem>(
        "INSERT INTO warehouse_items (sku, name, category, unit, quantity_total, replacement_value, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(&sku)
    .bind(input.name.trim())
    .bind(&input.category)
    .bind(input.unit.as_deref().unwrap_or("pcs"))
    .bind(input.quantity_total)
    .bind(input.replacement_value)
    .bind(&input.notes)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_duplicate_sku(e, &sku))
}

pub async fn update_item(conn: &mut PgConnection, id: Uuid, patch: WarehouseItemPatch) -> Result<WarehouseItem, ApiError> {
    let mut item = get_item(conn, id).await?;
    patch.apply(&mut item);
    item.sku = normalize_sku(&item.sku)?;
    validate_item_fields(&item.name, item.quantity_total)?;

    sqlx::query_as::<_, WarehouseItem>(
        "UPDATE warehouse_items
         SET sku = $2, name = $3, category = $4, unit = $5, quantity_total = $6,
             replacement_value = $7, notes = $8, is_active = $9, updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(&item.sku)
    .bind(item.name.trim())
    .bind(&item.category)
    .bind(&item.unit)
    .bind(item.quantity_total)
    .bind(item.replacement_value)
    .bind(&item.notes)
    .bind(item.is_active)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_duplicate_sku(e, &item.sku))
}

/// Items referenced by reservations cannot be deleted (422); deactivate them instead
pub async fn delete_item(conn: &mut PgConnection, id: Uuid) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM warehouse_items WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Warehouse item not found"));
    }
    Ok(())
}

// Kits

#[derive(Debug, Serialize)]
pub struct KitDetail {
    #[serde(flatten)]
    pub kit: WarehouseKit,
    pub items: Vec<KitItem>,
}

pub async fn list_kits(conn: &mut PgConnection) -> Result<Vec<WarehouseKit>, DatabaseError> {
    Ok(sqlx::query_as::<_, WarehouseKit>("SELECT * FROM warehouse_kits ORDER BY name")
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn kit_items(conn: &mut PgConnection, kit_id: Uuid) -> Result<Vec<KitItem>, DatabaseError> {
    Ok(sqlx::query_as::<_, KitItem>(
        "SELECT ki.item_id, i.sku, i.name, ki.quantity
         FROM warehouse_kit_items ki
         JOIN warehouse_items i ON i.id = ki.item_id
         WHERE ki.kit_id = $1
         ORDER BY i.name",
    )
    .bind(kit_id)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn get_kit(conn: &mut PgConnection, id: Uuid) -> Result<KitDetail, DatabaseError> {
    let kit = Repository::<WarehouseKit>::new("warehouse_kits").select_by_id(conn, id).await?;
    let items = kit_items(conn, id).await?;
    Ok(KitDetail { kit, items })
}

pub async fn create_kit(conn: &mut PgConnection, input: &NewKit) -> Result<KitDetail, ApiError> {
    if input.name.trim().is_empty() {
        return Err(ApiError::invalid_field("name", "must not be empty"));
    }
    let kit = sqlx::query_as::<_, WarehouseKit>(
        "INSERT INTO warehouse_kits (name, description) VALUES ($1, $2) RETURNING *",
    )
    .bind(input.name.trim())
    .bind(&input.description)
    .fetch_one(&mut *conn)
    .await?;

    replace_kit_items(conn, kit.id, &input.items).await
}

pub async fn update_kit(conn: &mut PgConnection, id: Uuid, patch: WarehouseKitPatch) -> Result<KitDetail, ApiError> {
    let mut kit = Repository::<WarehouseKit>::new("warehouse_kits").select_by_id(conn, id).await?;
    if let Some(name) = patch.name {
        kit.name = name;
    }
    if let Some(description) = patch.description {
        kit.description = description;
    }
    if kit.name.trim().is_empty() {
        return Err(ApiError::invalid_field("name", "must not be empty"));
    }

    sqlx::query("UPDATE warehouse_kits SET name = $2, description = $3, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(kit.name.trim())
        .bind(&kit.description)
        .execute(&mut *conn)
        .await?;
    Ok(get_kit(conn, id).await?)
}

pub async fn delete_kit(conn: &mut PgConnection, id: Uuid) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM warehouse_kits WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Kit not found"));
    }
    Ok(())
}

/// Merge duplicate lines for the same item
fn merge_kit_lines(lines: &[KitItemInput]) -> Result<BTreeMap<Uuid, i32>, ApiError> {
    let mut merged = BTreeMap::new();
    for line in lines {
        validate_quantity(line.quantity)?;
        let total: &mut i32 = merged.entry(line.item_id).or_insert(0);
        *total = total
            .checked_add(line.quantity)
            .ok_or_else(|| ApiError::invalid_field("quantity", "is too large"))?;
    }
    Ok(merged)
}

pub async fn replace_kit_items(conn: &mut PgConnection, kit_id: Uuid, lines: &[KitItemInput]) -> Result<KitDetail, ApiError> {
    let merged = merge_kit_lines(lines)?;

    sqlx::query("DELETE FROM warehouse_kit_items WHERE kit_id = $1")
        .bind(kit_id)
        .execute(&mut *conn)
        .await?;
    for (item_id, quantity) in &merged {
        sqlx::query("INSERT INTO warehouse_kit_items (kit_id, item_id, quantity) VALUES ($1, $2, $3)")
            .bind(kit_id)
            .bind(item_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
    }
    Ok(get_kit(conn, kit_id).await?)
}

// Availability

#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub item_id: Uuid,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub quantity_total: i32,
    pub reserved_peak: i64,
    pub available: i64,
}

async fn active_bookings(
    conn: &mut PgConnection,
    item_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Result<Vec<Booking>, DatabaseError> {
    Ok(sqlx::query_as::<_, Booking>(
        "SELECT start_at, end_at, quantity
         FROM warehouse_reservations
         WHERE item_id = $1
           AND status IN ('reserved', 'picked')
           AND start_at < $3 AND $2 < end_at
           AND ($4::uuid IS NULL OR id <> $4)",
    )
    .bind(item_id)
    .bind(from)
    .bind(to)
    .bind(exclude)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn availability(
    conn: &mut PgConnection,
    item_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Availability, ApiError> {
    validate_window(from, to)?;
    let item = get_item(conn, item_id).await?;
    let bookings = active_bookings(conn, item_id, from, to, None).await?;
    let reserved_peak = peak_concurrent(&bookings, from, to);
    Ok(Availability {
        item_id,
        from,
        to,
        quantity_total: item.quantity_total,
        reserved_peak,
        available: i64::from(item.quantity_total) - reserved_peak,
    })
}

/// Lock the item and ensure `requested` more units fit in [from, to).
/// `exclude` skips the reservation being edited.
async fn ensure_available(
    conn: &mut PgConnection,
    item_id: Uuid,
    requested: i32,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Result<(), ApiError> {
    let (quantity_total,): (Option<i32>,) = sqlx::query_as("SELECT app_lock_warehouse_item($1)")
        .bind(item_id)
        .fetch_one(&mut *conn)
        .await?;
    let quantity_total = quantity_total.ok_or_else(|| ApiError::not_found("Warehouse item not found"))?;

    let bookings = active_bookings(conn, item_id, from, to, exclude).await?;
    let available = i64::from(quantity_total) - peak_concurrent(&bookings, from, to);
    if available < i64::from(requested) {
        tracing::info!(
            "Reservation of {} x {} rejected, {} available",
            requested,
            item_id,
            available
        );
        return Err(ApiError::conflict_with(
            "Insufficient stock for the requested window",
            json!({ "item_id": item_id, "requested": requested, "available": available.max(0) }),
        ));
    }
    Ok(())
}

// Reservations

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationListQuery {
    pub event_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub status: Option<ReservationStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl ReservationListQuery {
    pub fn to_filter(&self) -> FilterData {
        let mut conditions = Map::new();
        if let Some(event_id) = self.event_id {
            conditions.insert("event_id".into(), json!(event_id));
        }
        if let Some(item_id) = self.item_id {
            conditions.insert("item_id".into(), json!(item_id));
        }
        if let Some(status) = self.status {
            conditions.insert("status".into(), json!(status));
        }
        if let Some(from) = self.from {
            conditions.insert("end_at".into(), json!({ "$gt": from }));
        }
        if let Some(to) = self.to {
            conditions.insert("start_at".into(), json!({ "$lt": to }));
        }
        FilterData {
            where_clause: Some(Value::Object(conditions)),
            order: Some(json!("start_at asc")),
            limit: self.limit,
            offset: self.offset,
            ..Default::default()
        }
    }
}

pub async fn list_reservations(
    conn: &mut PgConnection,
    query: &ReservationListQuery,
) -> Result<Vec<Reservation>, DatabaseError> {
    Repository::<Reservation>::new("warehouse_reservations").select_any(conn, query.to_filter()).await
}

pub async fn get_reservation(conn: &mut PgConnection, id: Uuid) -> Result<Reservation, DatabaseError> {
    Repository::<Reservation>::new("warehouse_reservations").select_by_id(conn, id).await
}

/// Resolve the reservation window, defaulting to the event's window
async fn reservation_window(
    conn: &mut PgConnection,
    input: &NewReservation,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
    let (start_at, end_at) = match (input.start_at, input.end_at, input.event_id) {
        (Some(start), Some(end), _) => (start, end),
        (start, end, Some(event_id)) => {
            let event = events::get(conn, event_id).await?;
            (start.unwrap_or(event.start_at), end.unwrap_or(event.end_at))
        }
        _ => return Err(ApiError::invalid_field("start_at", "start_at and end_at are required without event_id")),
    };
    validate_window(start_at, end_at)?;
    Ok((start_at, end_at))
}

/// Lines to reserve: one item, or every item of a kit scaled by `quantity`
async fn reservation_lines(conn: &mut PgConnection, input: &NewReservation) -> Result<Vec<(Uuid, i32)>, ApiError> {
    let quantity = input.quantity.unwrap_or(1);
    validate_quantity(quantity)?;

    match (input.item_id, input.kit_id) {
        (Some(item_id), None) => Ok(vec![(item_id, quantity)]),
        (None, Some(kit_id)) => {
            let kit = get_kit(conn, kit_id).await?;
            if kit.items.is_empty() {
                return Err(ApiError::unprocessable_field("kit_id", "Kit has no items"));
            }
            scale_kit_lines(&kit.items, quantity)
        }
        _ => Err(ApiError::invalid_field("item_id", "exactly one of item_id or kit_id is required")),
    }
}

/// Kit lines multiplied by `quantity`, sorted by item so locks are taken in a stable order
fn scale_kit_lines(items: &[KitItem], quantity: i32) -> Result<Vec<(Uuid, i32)>, ApiError> {
    let mut lines = items
        .iter()
        .map(|line| {
            line.quantity
                .checked_mul(quantity)
                .map(|scaled| (line.item_id, scaled))
                .ok_or_else(|| ApiError::invalid_field("quantity", format!("too many {} kits requested", quantity)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    lines.sort_by_key(|(item_id, _)| *item_id);
    Ok(lines)
}

pub async fn create_reservations(
    conn: &mut PgConnection,
    input: &NewReservation,
    created_by: Uuid,
) -> Result<Vec<Reservation>, ApiError> {
    let (start_at, end_at) = reservation_window(conn, input).await?;
    let lines = reservation_lines(conn, input).await?;

    let mut created = Vec::with_capacity(lines.len());
    for (item_id, quantity) in lines {
        ensure_available(conn, item_id, quantity, start_at, end_at, None).await?;
        let reservation = sqlx::query_as::<_, Reservation>(
            "INSERT INTO warehouse_reservations (event_id, item_id, quantity, start_at, end_at, notes, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(input.event_id)
        .bind(item_id)
        .bind(quantity)
        .bind(start_at)
        .bind(end_at)
        .bind(&input.notes)
        .bind(created_by)
        .fetch_one(&mut *conn)
        .await?;
        created.push(reservation);
    }

    tracing::info!("Created {} reservation(s) for event {:?}", created.len(), input.event_id);
    Ok(created)
}

pub async fn update_reservation(
    conn: &mut PgConnection,
    id: Uuid,
    patch: ReservationPatch,
) -> Result<Reservation, ApiError> {
    let mut reservation = get_reservation(conn, id).await?;
    let check = patch.needs_availability_check();
    patch.apply(&mut reservation);
    validate_quantity(reservation.quantity)?;
    validate_window(reservation.start_at, reservation.end_at)?;

    if check && reservation.status.is_active() {
        ensure_available(
            conn,
            reservation.item_id,
            reservation.quantity,
            reservation.start_at,
            reservation.end_at,
            Some(id),
        )
        .await?;
    }

    Ok(sqlx::query_as::<_, Reservation>(
        "UPDATE warehouse_reservations
         SET status = $2, quantity = $3, start_at = $4, end_at = $5, notes = $6, updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(reservation.status)
    .bind(reservation.quantity)
    .bind(reservation.start_at)
    .bind(reservation.end_at)
    .bind(&reservation.notes)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn delete_reservation(conn: &mut PgConnection, id: Uuid) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM warehouse_reservations WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Reservation not found"));
    }
    Ok(())
}

/// Active reservations of an event aggregated per item, by category then name
pub async fn picklist(conn: &mut PgConnection, event_id: Uuid) -> Result<Vec<PicklistRow>, DatabaseError> {
    Ok(sqlx::query_as::<_, PicklistRow>(
        "SELECT i.id AS item_id, i.sku, i.name, i.category, i.unit,
                SUM(r.quantity)::BIGINT AS quantity,
                CASE WHEN bool_and(r.status = 'picked') THEN 'picked' ELSE 'reserved' END AS status,
                string_agg(r.notes, '; ' ORDER BY r.created_at) AS notes
         FROM warehouse_reservations r
         JOIN warehouse_items i ON i.id = r.item_id
         WHERE r.event_id = $1 AND r.status IN ('reserved', 'picked')
         GROUP BY i.id, i.sku, i.name, i.category, i.unit
         ORDER BY i.category NULLS LAST, i.name",
    )
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await?)
}
