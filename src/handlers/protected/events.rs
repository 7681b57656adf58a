// handlers/protected/events.rs - /api/events

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::config::config;
use crate::database::models::{Event, EventPatch, NewEvent};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::events::{self, EventDetail, EventListQuery};
use crate::services::{calendar_sync, folders};
use crate::state::AppState;

/// Result of one follow-up integration step after the event was saved
#[derive(Debug, Serialize)]
pub struct IntegrationStep {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IntegrationStep {
    fn done() -> Self {
        Self { ok: true, error: None }
    }

    fn failed(error: impl ToString) -> Self {
        Self { ok: false, error: Some(error.to_string()) }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct IntegrationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar: Option<IntegrationStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<IntegrationStep>,
}

#[derive(Debug, Serialize)]
pub struct EventCreated {
    #[serde(flatten)]
    pub event: Event,
    pub integrations: IntegrationReport,
}

/// GET /api/events
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<EventListQuery>,
) -> ApiResult<Vec<Event>> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let events = events::list(&mut tx, &query).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(events))
}

/// GET /api/events/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<EventDetail> {
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let detail = events::detail(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(detail))
}

/// POST /api/events
///
/// The event is committed first. Calendar and folder steps run afterwards in
/// their own transactions; a failure there is reported, not rolled back.
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<NewEvent>,
) -> ApiResult<EventCreated> {
    auth.require_permission("events.manage")?;

    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let mut event = events::create(&mut tx, &input, auth.id).await?;
    tx.commit().await?;

    let mut integrations = IntegrationReport::default();

    if input.sync_calendar {
        let step = if !auth.access.has_permission("events.sync") {
            IntegrationStep::failed("Missing permission: events.sync")
        } else {
            let mut tx = state.db.user_scope(auth.rls_claims()).await?;
            match calendar_sync::push_event(&mut tx, state.calendar.as_ref(), event.id).await {
                Ok(synced) => {
                    tx.commit().await?;
                    event = synced;
                    IntegrationStep::done()
                }
                Err(e) => {
                    tracing::warn!("Calendar push failed for new event {}: {}", event.id, e);
                    IntegrationStep::failed(e)
                }
            }
        };
        integrations.calendar = Some(step);
    }

    if input.create_folder {
        let mut tx = state.db.user_scope(auth.rls_claims()).await?;
        let step = match folders::provision(&mut tx, state.storage.as_ref(), &config().storage, event.id).await {
            Ok(provisioned) => {
                tx.commit().await?;
                event = provisioned;
                IntegrationStep::done()
            }
            Err(e) => {
                tracing::warn!("Folder creation failed for new event {}: {}", event.id, e);
                IntegrationStep::failed(e)
            }
        };
        integrations.folder = Some(step);
    }

    Ok(ApiResponse::created(EventCreated { event, integrations }))
}

/// PATCH /api/events/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<EventPatch>,
) -> ApiResult<Event> {
    auth.require_permission("events.manage")?;

    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let event = events::update(&mut tx, id, patch).await?;
    tx.commit().await?;

    if event.calendar_event_id.is_none() || !state.calendar.is_enabled() {
        return Ok(ApiResponse::success(event));
    }

    // keep the linked calendar copy current; the saved event stands either way
    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    match calendar_sync::push_event(&mut tx, state.calendar.as_ref(), id).await {
        Ok(synced) => {
            tx.commit().await?;
            Ok(ApiResponse::success(synced))
        }
        Err(e) => {
            tracing::warn!("Calendar update failed for event {}: {}", id, e);
            Ok(ApiResponse::success(event))
        }
    }
}

/// DELETE /api/events/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_permission("events.manage")?;

    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let event = events::delete(&mut tx, id).await?;
    tx.commit().await?;

    if state.calendar.is_enabled() {
        if let Err(e) = calendar_sync::remove_event(state.calendar.as_ref(), &event).await {
            tracing::warn!("Failed to remove calendar event for deleted event {}: {}", id, e);
        }
    }
    Ok(ApiResponse::no_content())
}

/// POST /api/events/:id/folder
pub async fn folder(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Event> {
    auth.require_permission("events.manage")?;

    let mut tx = state.db.user_scope(auth.rls_claims()).await?;
    let event = folders::provision(&mut tx, state.storage.as_ref(), &config().storage, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(event))
}
