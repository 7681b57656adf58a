// handlers/protected/calendar.rs - calendar push and reconciliation

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::config;
use crate::database::models::Event;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::calendar_sync::{self, SyncStats};
use crate::state::AppState;

const EVENTS_SYNC: &str = "events.sync";

#[derive(Debug, Default, Deserialize)]
pub struct SyncQuery {
    pub days_back: Option<i64>,
}

/// POST /api/events/:id/calendar
pub async fn push(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Event> {
    auth.require_permission(EVENTS_SYNC)?;
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let event = calendar_sync::push_event(&mut tx, state.calendar.as_ref(), id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(event))
}

/// POST /api/calendar/sync
pub async fn sync(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<SyncQuery>,
) -> ApiResult<SyncStats> {
    auth.require_permission(EVENTS_SYNC)?;
    let days_back = query.days_back.unwrap_or(config().calendar.sync_days_back);
    tracing::info!("Calendar sync requested by {} ({} days back)", auth.email, days_back);
    let stats = calendar_sync::sync_all(&state.db, state.calendar.as_ref(), days_back).await?;
    Ok(ApiResponse::success(stats))
}
