//! Pushing events to the external calendar and pulling attendee responses back.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::models::{Event, EventAssignee};
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::integrations::calendar::{
    Attendee, CalendarEvent, EventDateTime, ExtendedProperties, EVENT_ID_PROPERTY,
};
use crate::integrations::{CalendarClient, IntegrationError};
use crate::services::events;
use crate::types::AttendanceStatus;

/// Provider `responseStatus` to attendance status
pub fn map_response_status(status: &str) -> Option<AttendanceStatus> {
    match status {
        "accepted" => Some(AttendanceStatus::Accepted),
        "declined" => Some(AttendanceStatus::Declined),
        "tentative" => Some(AttendanceStatus::Tentative),
        "needsAction" => Some(AttendanceStatus::Pending),
        _ => None,
    }
}

fn response_status(status: AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::Accepted => "accepted",
        AttendanceStatus::Declined => "declined",
        AttendanceStatus::Tentative => "tentative",
        AttendanceStatus::Pending => "needsAction",
    }
}

/// Calendar payload for an event. Declined assignees stay on the list so the
/// provider keeps their answer.
pub fn build_calendar_event(event: &Event, assignees: &[EventAssignee]) -> CalendarEvent {
    let mut attendees: Vec<Attendee> = Vec::with_capacity(assignees.len());
    for assignee in assignees {
        let email = assignee.calendar_address();
        if attendees.iter().any(|a| a.email.eq_ignore_ascii_case(email)) {
            continue;
        }
        attendees.push(Attendee {
            email: email.to_string(),
            display_name: Some(assignee.full_name.clone()),
            response_status: Some(response_status(assignee.attendance_status).to_string()),
        });
    }

    let mut private = HashMap::new();
    private.insert(EVENT_ID_PROPERTY.to_string(), event.id.to_string());

    CalendarEvent {
        summary: Some(event.title.clone()),
        description: event.description.clone(),
        location: event.location.clone(),
        start: EventDateTime::at(event.start_at),
        end: EventDateTime::at(event.end_at),
        attendees,
        extended_properties: Some(ExtendedProperties { private }),
        ..Default::default()
    }
}

/// Assignments whose stored status differs from the attendee's answer.
/// Attendees are matched to assignees by email, ignoring case.
pub fn reconcile_attendees(
    assignees: &[EventAssignee],
    attendees: &[Attendee],
) -> Vec<(Uuid, AttendanceStatus)> {
    let mut changes = Vec::new();
    for attendee in attendees {
        let Some(status) = attendee.response_status.as_deref().and_then(map_response_status) else {
            continue;
        };
        for assignee in assignees
            .iter()
            .filter(|a| a.calendar_address().eq_ignore_ascii_case(&attendee.email))
        {
            if assignee.attendance_status != status {
                changes.push((assignee.assignment_id, status));
            }
        }
    }
    changes
}

fn is_gone_error(err: &IntegrationError) -> bool {
    matches!(err, IntegrationError::Status { status: 404 | 410, .. })
}

/// Insert or update the calendar copy of an event and store the link
pub async fn push_event(
    conn: &mut PgConnection,
    calendar: &dyn CalendarClient,
    event_id: Uuid,
) -> Result<Event, ApiError> {
    let event = events::get(conn, event_id).await?;
    let assignees = events::assignees(conn, event_id).await?;
    let payload = build_calendar_event(&event, &assignees);

    let remote = match event.calendar_event_id.as_deref() {
        Some(remote_id) => match calendar.update_event(remote_id, &payload).await {
            Ok(remote) => remote,
            Err(e) if is_gone_error(&e) => {
                info!("Calendar event {} is gone, re-creating for event {}", remote_id, event.id);
                calendar.insert_event(&payload).await?
            }
            Err(e) => return Err(e.into()),
        },
        None => calendar.insert_event(&payload).await?,
    };

    let remote_id = remote
        .id
        .ok_or_else(|| ApiError::bad_gateway("Calendar provider returned an event without id"))?;
    Ok(events::set_calendar_link(conn, event.id, Some(&remote_id)).await?)
}

/// Remove the calendar copy of a deleted event, if it had one
pub async fn remove_event(calendar: &dyn CalendarClient, event: &Event) -> Result<(), IntegrationError> {
    if let Some(remote_id) = event.calendar_event_id.as_deref() {
        calendar.delete_event(remote_id).await?;
        debug!("Removed calendar event {} for event {}", remote_id, event.id);
    }
    Ok(())
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SyncStats {
    pub events_checked: usize,
    pub assignments_updated: usize,
    pub events_unlinked: usize,
    pub errors: usize,
}

enum SyncOutcome {
    Updated(usize),
    Unlinked,
}

async fn sync_event(
    conn: &mut PgConnection,
    calendar: &dyn CalendarClient,
    event: &Event,
    remote_id: &str,
) -> Result<SyncOutcome, ApiError> {
    let remote = calendar.get_event(remote_id).await?;
    let remote = match remote {
        Some(remote) if !remote.is_cancelled() => remote,
        _ => {
            events::set_calendar_link(conn, event.id, None).await?;
            return Ok(SyncOutcome::Unlinked);
        }
    };

    let assignees = events::assignees(conn, event.id).await?;
    let changes = reconcile_attendees(&assignees, &remote.attendees);
    for (assignment_id, status) in &changes {
        sqlx::query(
            "UPDATE assignments
             SET attendance_status = $2, responded_at = now(), updated_at = now()
             WHERE id = $1",
        )
        .bind(assignment_id)
        .bind(status)
        .execute(&mut *conn)
        .await?;
    }
    events::set_calendar_link(conn, event.id, Some(remote_id)).await?;
    Ok(SyncOutcome::Updated(changes.len()))
}

/// Reconcile every linked event that ended less than `days_back` days ago or
/// is still to come. Runs with the service pool; each event commits on its own.
pub async fn sync_all(
    db: &DatabaseManager,
    calendar: &dyn CalendarClient,
    days_back: i64,
) -> Result<SyncStats, ApiError> {
    if !calendar.is_enabled() {
        return Err(IntegrationError::Disabled("Calendar").into());
    }

    let since = Utc::now() - Duration::days(days_back.max(0));
    let linked = sqlx::query_as::<_, Event>(
        "SELECT * FROM events
         WHERE calendar_event_id IS NOT NULL AND end_at > $1
         ORDER BY start_at",
    )
    .bind(since)
    .fetch_all(db.service())
    .await?;

    let mut stats = SyncStats::default();
    for event in &linked {
        let Some(remote_id) = event.calendar_event_id.as_deref() else {
            continue;
        };
        stats.events_checked += 1;

        let mut tx = db.service_tx().await?;
        match sync_event(&mut tx, calendar, event, remote_id).await {
            Ok(outcome) => {
                tx.commit().await?;
                match outcome {
                    SyncOutcome::Updated(n) => stats.assignments_updated += n,
                    SyncOutcome::Unlinked => {
                        info!("Unlinked event {} from removed calendar event {}", event.id, remote_id);
                        stats.events_unlinked += 1;
                    }
                }
            }
            Err(e) => {
                warn!("Calendar sync failed for event {}: {}", event.id, e);
                stats.errors += 1;
            }
        }
    }

    info!(
        "Calendar sync: {} checked, {} assignments updated, {} unlinked, {} errors",
        stats.events_checked, stats.assignments_updated, stats.events_unlinked, stats.errors
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn event() -> Event {
        let mut event = testing::event("Summer Gala", Utc::now(), 6);
        event.description = Some("Main stage".into());
        event.location = Some("City Hall".into());
        event
    }

    fn assignee(email: &str, calendar_email: Option<&str>, status: AttendanceStatus) -> EventAssignee {
        let mut assignee = testing::assignee(email, "FOH", status);
        assignee.calendar_email = calendar_email.map(str::to_string);
        assignee
    }

    fn attendee(email: &str, status: &str) -> Attendee {
        Attendee {
            email: email.into(),
            display_name: None,
            response_status: Some(status.into()),
        }
    }

    #[test]
    fn maps_provider_statuses() {
        assert_eq!(map_response_status("accepted"), Some(AttendanceStatus::Accepted));
        assert_eq!(map_response_status("declined"), Some(AttendanceStatus::Declined));
        assert_eq!(map_response_status("tentative"), Some(AttendanceStatus::Tentative));
        assert_eq!(map_response_status("needsAction"), Some(AttendanceStatus::Pending));
        assert_eq!(map_response_status("bogus"), None);
    }

    #[test]
    fn payload_carries_event_fields_and_attendees() {
        let event = event();
        let assignees = vec![
            assignee("anna@crew.test", Some("anna@gmail.test"), AttendanceStatus::Accepted),
            assignee("bob@crew.test", None, AttendanceStatus::Declined),
        ];
        let payload = build_calendar_event(&event, &assignees);

        assert_eq!(payload.summary.as_deref(), Some("Summer Gala"));
        assert_eq!(payload.start.date_time, Some(event.start_at));
        assert_eq!(payload.attendees.len(), 2);
        assert_eq!(payload.attendees[0].email, "anna@gmail.test");
        assert_eq!(payload.attendees[1].response_status.as_deref(), Some("declined"));
        let private = payload.extended_properties.unwrap().private;
        assert_eq!(private[EVENT_ID_PROPERTY], event.id.to_string());
    }

    #[test]
    fn payload_lists_each_address_once() {
        let assignees = vec![
            assignee("anna@crew.test", None, AttendanceStatus::Pending),
            assignee("ANNA@crew.test", None, AttendanceStatus::Pending),
        ];
        assert_eq!(build_calendar_event(&event(), &assignees).attendees.len(), 1);
    }

    #[test]
    fn reconcile_matches_emails_case_insensitively() {
        let anna = assignee("anna@crew.test", None, AttendanceStatus::Pending);
        let bob = assignee("bob@crew.test", None, AttendanceStatus::Accepted);
        let changes = reconcile_attendees(
            &[anna.clone(), bob],
            &[
                attendee("Anna@Crew.Test", "accepted"),
                attendee("bob@crew.test", "accepted"),
                attendee("stranger@crew.test", "declined"),
            ],
        );
        assert_eq!(changes, vec![(anna.assignment_id, AttendanceStatus::Accepted)]);
    }

    #[test]
    fn unknown_statuses_are_ignored() {
        let anna = assignee("anna@crew.test", None, AttendanceStatus::Pending);
        assert!(reconcile_attendees(&[anna], &[attendee("anna@crew.test", "maybe")]).is_empty());
    }

    #[test]
    fn gone_errors_are_detected() {
        assert!(is_gone_error(&IntegrationError::Status { status: 410, body: String::new() }));
        assert!(!is_gone_error(&IntegrationError::Status { status: 500, body: String::new() }));
    }
}
