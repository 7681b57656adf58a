// handlers/protected/warehouse.rs - /api/warehouse/* and the event pick-list

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{
    KitItemInput, NewKit, NewReservation, NewWarehouseItem, Reservation, ReservationPatch,
    WarehouseItem, WarehouseItemPatch, WarehouseKit, WarehouseKitPatch,
};
use crate::error::ApiError;
use crate::export::{self, XLSX_CONTENT_TYPE};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, FileDownload};
use crate::services::events;
use crate::services::warehouse::{
    self, Availability, ItemListQuery, KitDetail, ReservationListQuery,
};
use crate::state::AppState;

const WAREHOUSE_MANAGE: &str = "warehouse.manage";
const WAREHOUSE_RESERVE: &str = "warehouse.reserve";

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub item_id: Uuid,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

// Items

/// GET /api/warehouse/items
pub async fn items_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ItemListQuery>,
) -> ApiResult<Vec<WarehouseItem>> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let items = warehouse::list_items(&mut tx, &query).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(items))
}

/// POST /api/warehouse/items
pub async fn item_create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<NewWarehouseItem>,
) -> ApiResult<WarehouseItem> {
    auth.require_permission(WAREHOUSE_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let item = warehouse::create_item(&mut tx, &input).await?;
    tx.commit().await?;
    Ok(ApiResponse::created(item))
}

/// GET /api/warehouse/items/:id
pub async fn item_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<WarehouseItem> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let item = warehouse::get_item(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(item))
}

/// PATCH /api/warehouse/items/:id
pub async fn item_update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<WarehouseItemPatch>,
) -> ApiResult<WarehouseItem> {
    auth.require_permission(WAREHOUSE_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let item = warehouse::update_item(&mut tx, id, patch).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(item))
}

/// DELETE /api/warehouse/items/:id
pub async fn item_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_permission(WAREHOUSE_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    warehouse::delete_item(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::no_content())
}

// Kits

/// GET /api/warehouse/kits
pub async fn kits_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<WarehouseKit>> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let kits = warehouse::list_kits(&mut tx).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(kits))
}

/// POST /api/warehouse/kits
pub async fn kit_create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<NewKit>,
) -> ApiResult<KitDetail> {
    auth.require_permission(WAREHOUSE_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let kit = warehouse::create_kit(&mut tx, &input).await?;
    tx.commit().await?;
    Ok(ApiResponse::created(kit))
}

/// GET /api/warehouse/kits/:id
pub async fn kit_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<KitDetail> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let kit = warehouse::get_kit(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(kit))
}

/// PATCH /api/warehouse/kits/:id
pub async fn kit_update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<WarehouseKitPatch>,
) -> ApiResult<KitDetail> {
    auth.require_permission(WAREHOUSE_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let kit = warehouse::update_kit(&mut tx, id, patch).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(kit))
}

/// DELETE /api/warehouse/kits/:id
pub async fn kit_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_permission(WAREHOUSE_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    warehouse::delete_kit(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::no_content())
}

/// PUT /api/warehouse/kits/:id/items
pub async fn kit_items_replace(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(lines): Json<Vec<KitItemInput>>,
) -> ApiResult<KitDetail> {
    auth.require_permission(WAREHOUSE_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    warehouse::get_kit(&mut tx, id).await?;
    let kit = warehouse::replace_kit_items(&mut tx, id, &lines).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(kit))
}

// Reservations

/// GET /api/warehouse/reservations
pub async fn reservations_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ReservationListQuery>,
) -> ApiResult<Vec<Reservation>> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let reservations = warehouse::list_reservations(&mut tx, &query).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(reservations))
}

/// POST /api/warehouse/reservations
///
/// A kit reservation creates one row per kit item; all of them commit or none.
pub async fn reservation_create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<NewReservation>,
) -> ApiResult<Vec<Reservation>> {
    auth.require_permission(WAREHOUSE_RESERVE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let reservations = warehouse::create_reservations(&mut tx, &input, auth.id).await?;
    tx.commit().await?;
    Ok(ApiResponse::created(reservations))
}

/// PATCH /api/warehouse/reservations/:id
pub async fn reservation_update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ReservationPatch>,
) -> ApiResult<Reservation> {
    auth.require_permission(WAREHOUSE_RESERVE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let reservation = warehouse::update_reservation(&mut tx, id, patch).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(reservation))
}

/// DELETE /api/warehouse/reservations/:id
pub async fn reservation_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_permission(WAREHOUSE_RESERVE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    warehouse::delete_reservation(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/warehouse/availability?item_id&from&to
pub async fn availability(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<Availability> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let availability = warehouse::availability(&mut tx, query.item_id, query.from, query.to).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(availability))
}

/// GET /api/events/:id/picklist.xlsx
pub async fn picklist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(event_id): Path<Uuid>,
) -> Result<FileDownload, ApiError> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let event = events::get(&mut tx, event_id).await?;
    let rows = warehouse::picklist(&mut tx, event_id).await?;
    tx.commit().await?;

    let bytes = export::render_picklist(&event, &rows)?;
    let filename = format!("picklist-{}-{}.xlsx", event.start_at.format("%Y%m%d"), event.title);
    Ok(FileDownload::new(filename, XLSX_CONTENT_TYPE, bytes))
}
