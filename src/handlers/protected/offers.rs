// handlers/protected/offers.rs - /api/offers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::config::config;
use crate::database::models::{NewOffer, NewOfferItem, Offer, OfferItem, OfferItemPatch, OfferPatch};
use crate::error::ApiError;
use crate::export::{self, PDF_CONTENT_TYPE};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, FileDownload};
use crate::services::offers::{self, OfferDetail, OfferListQuery};
use crate::state::AppState;

const OFFERS_MANAGE: &str = "offers.manage";

/// GET /api/offers
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<OfferListQuery>,
) -> ApiResult<Vec<Offer>> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let offers = offers::list(&mut tx, &query).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(offers))
}

/// POST /api/offers
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<NewOffer>,
) -> ApiResult<Offer> {
    auth.require_permission(OFFERS_MANAGE)?;
    let today = chrono::Utc::now().date_naive();
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let offer = offers::create(&mut tx, &config().offers, &input, auth.id, today).await?;
    tx.commit().await?;
    Ok(ApiResponse::created(offer))
}

/// GET /api/offers/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<OfferDetail> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let detail = offers::detail(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(detail))
}

/// PATCH /api/offers/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<OfferPatch>,
) -> ApiResult<Offer> {
    auth.require_permission(OFFERS_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let offer = offers::update(&mut tx, id, patch).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(offer))
}

/// DELETE /api/offers/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_permission(OFFERS_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    offers::delete(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/offers/:id/items
pub async fn items_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<OfferItem>> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    offers::get(&mut tx, id).await?;
    let items = offers::items(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(items))
}

/// POST /api/offers/:id/items
pub async fn item_create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<NewOfferItem>,
) -> ApiResult<OfferItem> {
    auth.require_permission(OFFERS_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let item = offers::add_item(&mut tx, id, &input).await?;
    tx.commit().await?;
    Ok(ApiResponse::created(item))
}

/// PATCH /api/offers/:id/items/:item_id
pub async fn item_update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(patch): Json<OfferItemPatch>,
) -> ApiResult<OfferItem> {
    auth.require_permission(OFFERS_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let item = offers::update_item(&mut tx, id, item_id, patch).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(item))
}

/// DELETE /api/offers/:id/items/:item_id
pub async fn item_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    auth.require_permission(OFFERS_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    offers::delete_item(&mut tx, id, item_id).await?;
    tx.commit().await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/offers/:id/recalculate
pub async fn recalculate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Offer> {
    auth.require_permission(OFFERS_MANAGE)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let offer = offers::recalculate(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(offer))
}

/// GET /api/offers/:id/pdf
pub async fn pdf(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<FileDownload, ApiError> {
    auth.require_permission("offers.export")?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let detail = offers::detail(&mut tx, id).await?;
    tx.commit().await?;

    let bytes = export::render_offer_pdf(&detail.offer, &detail.items, &config().offers)?;
    let filename = format!("{}.pdf", detail.offer.offer_number.replace('/', "-"));
    Ok(FileDownload::new(filename, PDF_CONTENT_TYPE, bytes))
}
