use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::database::models::{Event, EventAssignee, EventPatch, NewEvent, Position};
use crate::database::{DatabaseError, Repository};
use crate::error::ApiError;
use crate::filter::filter_order::FilterOrder;
use crate::filter::{FilterData, FilterError};
use crate::types::EventStatus;

/// Query string accepted by `GET /api/events`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventListQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    pub order: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl EventListQuery {
    pub const SORTABLE: &'static [&'static str] = &["start_at", "end_at", "title", "status", "created_at"];

    /// Events overlapping [from, to) match; either bound may be open
    pub fn to_filter(&self) -> Result<FilterData, FilterError> {
        let mut conditions = Map::new();
        if let Some(from) = self.from {
            conditions.insert("end_at".into(), json!({ "$gt": from }));
        }
        if let Some(to) = self.to {
            conditions.insert("start_at".into(), json!({ "$lt": to }));
        }
        if let Some(status) = self.status {
            conditions.insert("status".into(), json!(status));
        }

        let order = FilterOrder::restrict(self.order.as_deref().unwrap_or("start_at asc"), Self::SORTABLE)?;
        Ok(FilterData {
            where_clause: Some(Value::Object(conditions)),
            order: Some(order),
            limit: self.limit,
            offset: self.offset,
            ..Default::default()
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PositionDetail {
    #[serde(flatten)]
    pub position: Position,
    pub assignments: Vec<EventAssignee>,
}

#[derive(Debug, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub positions: Vec<PositionDetail>,
}

pub fn validate_window(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Result<(), ApiError> {
    if end_at <= start_at {
        return Err(ApiError::invalid_field("end_at", "must be after start_at"));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::invalid_field("title", "must not be empty"));
    }
    Ok(())
}

pub fn validate_new(input: &NewEvent) -> Result<(), ApiError> {
    validate_title(&input.title)?;
    validate_window(input.start_at, input.end_at)
}

fn repository() -> Repository<Event> {
    Repository::new("events")
}

pub async fn list(conn: &mut PgConnection, query: &EventListQuery) -> Result<Vec<Event>, DatabaseError> {
    repository().select_any(conn, query.to_filter()?).await
}

pub async fn get(conn: &mut PgConnection, id: Uuid) -> Result<Event, DatabaseError> {
    repository().select_by_id(conn, id).await
}

/// Row-locked read; concurrent writers of the same event wait for this transaction
pub async fn get_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Event, DatabaseError> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("events record not found".to_string()))
}

pub async fn detail(conn: &mut PgConnection, id: Uuid) -> Result<EventDetail, DatabaseError> {
    let event = get(conn, id).await?;
    let positions = sqlx::query_as::<_, Position>(
        "SELECT * FROM positions WHERE event_id = $1 ORDER BY created_at, name",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    let mut assignees = assignees(conn, id).await?;

    let positions = positions
        .into_iter()
        .map(|position| {
            let (mine, rest): (Vec<_>, Vec<_>) =
                assignees.drain(..).partition(|a| a.position_id == position.id);
            assignees = rest;
            PositionDetail { position, assignments: mine }
        })
        .collect();

    Ok(EventDetail { event, positions })
}

/// Every assignment on the event with the technician's contact data
pub async fn assignees(conn: &mut PgConnection, event_id: Uuid) -> Result<Vec<EventAssignee>, DatabaseError> {
    Ok(sqlx::query_as::<_, EventAssignee>(
        "SELECT a.id AS assignment_id, a.position_id, p.name AS position_name,
                u.id AS technician_id, u.full_name, u.email, u.calendar_email,
                a.attendance_status
         FROM assignments a
         JOIN positions p ON p.id = a.position_id
         JOIN users u ON u.id = a.technician_id
         WHERE p.event_id = $1
         ORDER BY p.name, u.full_name",
    )
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn create(conn: &mut PgConnection, input: &NewEvent, created_by: Uuid) -> Result<Event, ApiError> {
    validate_new(input)?;

    let event = sqlx::query_as::<_, Event>(
        "INSERT INTO events (title, description, location, client_name, start_at, end_at, status, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
    )
    .bind(input.title.trim())
    .bind(&input.description)
    .bind(&input.location)
    .bind(&input.client_name)
    .bind(input.start_at)
    .bind(input.end_at)
    .bind(input.status.unwrap_or(EventStatus::Planned))
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!("Created event {} '{}'", event.id, event.title);
    Ok(event)
}

pub async fn update(conn: &mut PgConnection, id: Uuid, patch: EventPatch) -> Result<Event, ApiError> {
    let mut event = get(conn, id).await?;
    patch.apply(&mut event);
    validate_title(&event.title)?;
    validate_window(event.start_at, event.end_at)?;

    let event = sqlx::query_as::<_, Event>(
        "UPDATE events
         SET title = $2, description = $3, location = $4, client_name = $5,
             start_at = $6, end_at = $7, status = $8, updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(event.title.trim())
    .bind(&event.description)
    .bind(&event.location)
    .bind(&event.client_name)
    .bind(event.start_at)
    .bind(event.end_at)
    .bind(event.status)
    .fetch_one(&mut *conn)
    .await?;

    Ok(event)
}

/// Delete the event (positions, assignments and reservations cascade)
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<Event, ApiError> {
    sqlx::query_as::<_, Event>("DELETE FROM events WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))
}

pub async fn set_calendar_link(
    conn: &mut PgConnection,
    id: Uuid,
    calendar_event_id: Option<&str>,
) -> Result<Event, DatabaseError> {
    Ok(sqlx::query_as::<_, Event>(
        "UPDATE events
         SET calendar_event_id = $2, last_synced_at = now(), updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(calendar_event_id)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn set_storage_folder(
    conn: &mut PgConnection,
    id: Uuid,
    folder_id: &str,
    folder_url: &str,
) -> Result<Event, DatabaseError> {
    Ok(sqlx::query_as::<_, Event>(
        "UPDATE events
         SET storage_folder_id = $2, storage_folder_url = $3, updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(folder_id)
    .bind(folder_url)
    .fetch_one(&mut *conn)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn window_must_be_positive() {
        assert!(validate_window(at("2024-06-01T10:00:00Z"), at("2024-06-01T12:00:00Z")).is_ok());
        let err = validate_window(at("2024-06-01T10:00:00Z"), at("2024-06-01T10:00:00Z")).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn blank_titles_are_rejected() {
        let input = NewEvent {
            title: "   ".into(),
            description: None,
            location: None,
            client_name: None,
            start_at: at("2024-06-01T10:00:00Z"),
            end_at: at("2024-06-01T12:00:00Z"),
            status: None,
            sync_calendar: false,
            create_folder: false,
        };
        assert_eq!(validate_new(&input).unwrap_err().status_code(), 400);
    }

    #[test]
    fn list_query_builds_overlap_filter() {
        let query = EventListQuery {
            from: Some(at("2024-06-01T00:00:00Z")),
            to: Some(at("2024-07-01T00:00:00Z")),
            status: Some(EventStatus::Confirmed),
            ..Default::default()
        };
        let filter = query.to_filter().unwrap();
        let conditions = filter.where_clause.unwrap();
        assert!(conditions["end_at"]["$gt"].is_string());
        assert!(conditions["start_at"]["$lt"].is_string());
        assert_eq!(conditions["status"], "confirmed");
        assert_eq!(filter.order.unwrap(), "start_at asc");
    }

    #[test]
    fn list_query_rejects_unknown_order_column() {
        let query = EventListQuery { order: Some("bogus_column".into()), ..Default::default() };
        let err = ApiError::from(DatabaseError::from(query.to_filter().unwrap_err()));
        assert_eq!(err.status_code(), 400);

        let query = EventListQuery { order: Some("title desc".into()), ..Default::default() };
        assert_eq!(query.to_filter().unwrap().order.unwrap(), "title desc");
    }
}
