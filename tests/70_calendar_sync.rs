mod common;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crewplan_api::database::models::{Event, NewAssignment, User};
use crewplan_api::database::DatabaseManager;
use crewplan_api::integrations::calendar::{Attendee, CalendarEvent};
use crewplan_api::integrations::{CalendarClient, IntegrationError, NoopCalendarClient};
use crewplan_api::services::{assignments, calendar_sync, events};
use crewplan_api::types::{AttendanceStatus, Role};

enum Remote {
    Gone,
    Cancelled,
    Failing,
    Live(Vec<Attendee>),
}

/// Calendar that answers `get_event` from a fixed table; unknown ids fail
struct ScriptedCalendar {
    remote: HashMap<String, Remote>,
}

fn unused() -> IntegrationError {
    IntegrationError::Decode("not used by calendar sync".to_string())
}

#[async_trait]
impl CalendarClient for ScriptedCalendar {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn insert_event(&self, _event: &CalendarEvent) -> Result<CalendarEvent, IntegrationError> {
        Err(unused())
    }

    async fn update_event(&self, _event_id: &str, _event: &CalendarEvent) -> Result<CalendarEvent, IntegrationError> {
        Err(unused())
    }

    async fn delete_event(&self, _event_id: &str) -> Result<(), IntegrationError> {
        Err(unused())
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, IntegrationError> {
        match self.remote.get(event_id) {
            Some(Remote::Gone) => Ok(None),
            Some(Remote::Cancelled) => Ok(Some(CalendarEvent {
                id: Some(event_id.to_string()),
                status: Some("cancelled".to_string()),
                ..Default::default()
            })),
            Some(Remote::Live(attendees)) => Ok(Some(CalendarEvent {
                id: Some(event_id.to_string()),
                status: Some("confirmed".to_string()),
                attendees: attendees.clone(),
                ..Default::default()
            })),
            Some(Remote::Failing) | None => Err(IntegrationError::Status {
                status: 500,
                body: "backend error".to_string(),
            }),
        }
    }

    async fn list_events(
        &self,
        _time_min: DateTime<Utc>,
        _time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, IntegrationError> {
        Err(unused())
    }
}

async fn linked_event(db: &DatabaseManager, owner: &User, remote_id: &str) -> Result<Event> {
    let event = common::seed_event(db, owner, Utc::now() + Duration::days(5), 6).await?;
    let mut tx = db.service_tx().await?;
    let event = events::set_calendar_link(&mut tx, event.id, Some(remote_id)).await?;
    tx.commit().await?;
    Ok(event)
}

#[tokio::test]
async fn sync_unlinks_removed_events_and_counts_failures() -> Result<()> {
    let Some(db) = common::database().await else { return Ok(()) };
    let manager = common::seed_user(&db, Role::Manager, &[], &[]).await?;
    let tech = common::seed_user(&db, Role::Technician, &[], &[]).await?;

    let ids: Vec<String> = ["gone", "cancelled", "failing", "live"].iter().map(|k| common::unique(k)).collect();
    let gone = linked_event(&db, &manager, &ids[0]).await?;
    let cancelled = linked_event(&db, &manager, &ids[1]).await?;
    let failing = linked_event(&db, &manager, &ids[2]).await?;
    let live = linked_event(&db, &manager, &ids[3]).await?;

    let position = common::seed_position(&db, &live, "Lights").await?;
    let mut tx = db.service_tx().await?;
    let assignment = assignments::assign(&mut tx, position.id, &NewAssignment { technician_id: tech.id, notes: None })
        .await?
        .assignment;
    tx.commit().await?;
    assert_eq!(assignment.attendance_status, AttendanceStatus::Pending);

    let calendar = ScriptedCalendar {
        remote: HashMap::from([
            (ids[0].clone(), Remote::Gone),
            (ids[1].clone(), Remote::Cancelled),
            (ids[2].clone(), Remote::Failing),
            (
                ids[3].clone(),
                Remote::Live(vec![Attendee {
                    email: tech.email.to_uppercase(),
                    display_name: None,
                    response_status: Some("accepted".to_string()),
                }]),
            ),
        ]),
    };

    let stats = calendar_sync::sync_all(&db, &calendar, 1).await?;
    assert!(stats.events_checked >= 4);
    assert_eq!(stats.events_unlinked, 2);
    assert_eq!(stats.assignments_updated, 1);
    assert!(stats.errors >= 1);

    let mut conn = db.service().acquire().await?;
    assert_eq!(events::get(&mut conn, gone.id).await?.calendar_event_id, None);
    assert_eq!(events::get(&mut conn, cancelled.id).await?.calendar_event_id, None);
    assert_eq!(events::get(&mut conn, failing.id).await?.calendar_event_id.as_deref(), Some(ids[2].as_str()));
    let live_after = events::get(&mut conn, live.id).await?;
    assert_eq!(live_after.calendar_event_id.as_deref(), Some(ids[3].as_str()));
    assert!(live_after.last_synced_at > live.last_synced_at);
    assert_eq!(assignments::get(&mut conn, assignment.id).await?.attendance_status, AttendanceStatus::Accepted);

    // leave no linked rows behind for the next run
    sqlx::query("DELETE FROM events WHERE id = ANY($1)")
        .bind(vec![gone.id, cancelled.id, failing.id, live.id])
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[tokio::test]
async fn disabled_calendar_refuses_to_sync() -> Result<()> {
    let Some(db) = common::database().await else { return Ok(()) };
    let err = calendar_sync::sync_all(&db, &NoopCalendarClient, 1).await.unwrap_err();
    assert_eq!(err.status_code(), 503);
    Ok(())
}
