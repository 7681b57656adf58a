// handlers/protected/crew.rs - positions, assignments and conflicts

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::database::models::{
    Assignment, AssignmentPatch, MyAssignment, NewAssignment, NewPosition, Position, PositionPatch,
};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::assignments::{self, AssignmentOutcome, Conflict};
use crate::services::positions;
use crate::state::AppState;

const CREW_ASSIGN: &str = "crew.assign";

/// GET /api/events/:id/positions
pub async fn positions_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Vec<Position>> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    crate::services::events::get(&mut tx, event_id).await?;
    let positions = positions::list(&mut tx, event_id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(positions))
}

/// POST /api/events/:id/positions
pub async fn positions_create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(event_id): Path<Uuid>,
    Json(input): Json<NewPosition>,
) -> ApiResult<Position> {
    auth.require_permission(CREW_ASSIGN)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let position = positions::create(&mut tx, event_id, &input).await?;
    tx.commit().await?;
    Ok(ApiResponse::created(position))
}

/// PATCH /api/positions/:id
pub async fn position_update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<PositionPatch>,
) -> ApiResult<Position> {
    auth.require_permission(CREW_ASSIGN)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let position = positions::update(&mut tx, id, patch).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(position))
}

/// DELETE /api/positions/:id
pub async fn position_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_permission(CREW_ASSIGN)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    positions::delete(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/positions/:id/assignments
pub async fn assign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(position_id): Path<Uuid>,
    Json(input): Json<NewAssignment>,
) -> ApiResult<AssignmentOutcome> {
    auth.require_permission(CREW_ASSIGN)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let outcome = assignments::assign(&mut tx, position_id, &input).await?;
    tx.commit().await?;
    Ok(ApiResponse::created(outcome))
}

/// GET /api/events/:id/conflicts
pub async fn conflicts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Vec<Conflict>> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let conflicts = assignments::event_conflicts(&mut tx, event_id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(conflicts))
}

/// GET /api/assignments/mine
pub async fn mine(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<MyAssignment>> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let mine = assignments::mine(&mut tx, auth.id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(mine))
}

/// PATCH /api/assignments/:id
pub async fn assignment_update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<AssignmentPatch>,
) -> ApiResult<Assignment> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let assignment = assignments::update(&mut tx, &auth, id, patch).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(assignment))
}

/// DELETE /api/assignments/:id
pub async fn assignment_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_permission(CREW_ASSIGN)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    assignments::delete(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::no_content())
}
