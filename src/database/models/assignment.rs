use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::double_option;
use crate::types::{AttendanceStatus, EventStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub id: Uuid,
    pub position_id: Uuid,
    pub technician_id: Uuid,
    pub attendance_status: AttendanceStatus,
    pub notes: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    pub technician_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentPatch {
    pub attendance_status: Option<AttendanceStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

/// A technician's assignment joined with the event it belongs to
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MyAssignment {
    pub id: Uuid,
    pub position_id: Uuid,
    pub position_name: String,
    pub attendance_status: AttendanceStatus,
    pub notes: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub event_id: Uuid,
    pub event_title: String,
    pub event_location: Option<String>,
    pub event_status: EventStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

/// Assignment on an event joined with the technician's contact data
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventAssignee {
    pub assignment_id: Uuid,
    pub position_id: Uuid,
    pub position_name: String,
    pub technician_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub calendar_email: Option<String>,
    pub attendance_status: AttendanceStatus,
}

impl EventAssignee {
    pub fn calendar_address(&self) -> &str {
        self.calendar_email.as_deref().unwrap_or(&self.email)
    }
}
