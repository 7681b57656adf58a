// handlers/protected/users.rs - user directory and access catalogue

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use uuid::Uuid;

use crate::database::models::{Module, Permission, User};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::access;
use crate::services::users::{self, UserListQuery, UserProfile};
use crate::state::AppState;

/// GET /api/users/me
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<UserProfile> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let user = users::get(&mut tx, auth.id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(UserProfile { user, grants: auth.access.grants() }))
}

/// GET /api/users
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Vec<User>> {
    auth.require_module("crew")?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let users = users::list(&mut tx, &query).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(users))
}

/// GET /api/users/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    auth.require_module("crew")?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let user = users::get(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(user))
}

/// GET /api/modules
pub async fn modules(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<Module>> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let modules = access::list_modules(&mut tx).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(modules))
}

/// GET /api/permissions
pub async fn permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<Permission>> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let permissions = access::list_permissions(&mut tx).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(permissions))
}
