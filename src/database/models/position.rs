use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::double_option;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Position {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub department: Option<String>,
    pub required_count: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPosition {
    pub name: String,
    pub department: Option<String>,
    pub required_count: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub department: Option<Option<String>>,
    pub required_count: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl PositionPatch {
    pub fn apply(self, position: &mut Position) {
        if let Some(name) = self.name {
            position.name = name;
        }
        if let Some(department) = self.department {
            position.department = department;
        }
        if let Some(required_count) = self.required_count {
            position.required_count = required_count;
        }
        if let Some(notes) = self.notes {
            position.notes = notes;
        }
    }
}
