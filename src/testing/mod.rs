//! Fixtures shared by unit tests

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::database::models::{Event, EventAssignee};
use crate::types::{AttendanceStatus, EventStatus};

/// Confirmed event starting at `start`, lasting `hours`
pub fn event(title: &str, start: DateTime<Utc>, hours: i64) -> Event {
    Event {
        id: Uuid::new_v4(),
        title: title.into(),
        description: None,
        location: None,
        client_name: None,
        start_at: start,
        end_at: start + Duration::hours(hours),
        status: EventStatus::Confirmed,
        calendar_event_id: None,
        storage_folder_id: None,
        storage_folder_url: None,
        last_synced_at: None,
        created_by: None,
        created_at: start,
        updated_at: start,
    }
}

pub fn assignee(email: &str, position: &str, status: AttendanceStatus) -> EventAssignee {
    EventAssignee {
        assignment_id: Uuid::new_v4(),
        position_id: Uuid::new_v4(),
        position_name: position.into(),
        technician_id: Uuid::new_v4(),
        full_name: email.split('@').next().unwrap_or_default().into(),
        email: email.into(),
        calendar_email: None,
        attendance_status: status,
    }
}
