use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::double_option;
use crate::types::Role;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub calendar_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Address used for calendar invitations and folder sharing
    pub fn calendar_address(&self) -> &str {
        self.calendar_email.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub calendar_email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub calendar_email: Option<Option<String>>,
}

impl UserPatch {
    pub fn apply(self, user: &mut User) {
        if let Some(full_name) = self.full_name {
            user.full_name = full_name;
        }
        if let Some(phone) = self.phone {
            user.phone = phone;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        if let Some(calendar_email) = self.calendar_email {
            user.calendar_email = calendar_email;
        }
    }
}
