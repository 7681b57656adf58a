// handlers/elevated/users.rs - user administration and access grants

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::database::models::{NewUser, User, UserGrants, UserPatch};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{access, users};
use crate::state::AppState;

/// POST /api/users
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<NewUser>,
) -> ApiResult<User> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let user = users::create(&mut tx, &input).await?;
    tx.commit().await?;
    Ok(ApiResponse::created(user))
}

/// PATCH /api/users/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserPatch>,
) -> ApiResult<User> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let user = users::update(&mut tx, id, patch).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(user))
}

/// DELETE /api/users/:id - deactivates the account
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let user = users::deactivate(&mut tx, auth.id, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(user))
}

/// GET /api/users/:id/modules and /api/users/:id/permissions
pub async fn grants(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<UserGrants> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    users::get(&mut tx, id).await?;
    let grants = access::user_grants(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(grants))
}

/// PUT /api/users/:id/modules
pub async fn modules_replace(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(codes): Json<Vec<String>>,
) -> ApiResult<UserGrants> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    users::get(&mut tx, id).await?;
    let grants = access::replace_modules(&mut tx, id, &codes).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(grants))
}

/// PUT /api/users/:id/permissions
pub async fn permissions_replace(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(codes): Json<Vec<String>>,
) -> ApiResult<UserGrants> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    users::get(&mut tx, id).await?;
    let grants = access::replace_permissions(&mut tx, id, &codes).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(grants))
}
