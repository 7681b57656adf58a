use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::double_option;
use crate::types::EventStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub client_name: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: EventStatus,
    pub calendar_event_id: Option<String>,
    pub storage_folder_id: Option<String>,
    pub storage_folder_url: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub client_name: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: Option<EventStatus>,
    /// Push to the external calendar right after insert
    #[serde(default)]
    pub sync_calendar: bool,
    /// Provision the storage folder right after insert
    #[serde(default)]
    pub create_folder: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub client_name: Option<Option<String>>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
}

impl EventPatch {
    pub fn apply(self, event: &mut Event) {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(location) = self.location {
            event.location = location;
        }
        if let Some(client_name) = self.client_name {
            event.client_name = client_name;
        }
        if let Some(start_at) = self.start_at {
            event.start_at = start_at;
        }
        if let Some(end_at) = self.end_at {
            event.end_at = end_at;
        }
        if let Some(status) = self.status {
            event.status = status;
        }
    }
}
