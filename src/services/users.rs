use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::database::models::{NewUser, User, UserGrants, UserPatch};
use crate::database::{DatabaseError, Repository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::types::Role;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl UserListQuery {
    pub fn to_filter(&self) -> FilterData {
        let mut conditions = Map::new();
        if let Some(role) = self.role {
            conditions.insert("role".into(), json!(role));
        }
        if let Some(active) = self.active {
            conditions.insert("is_active".into(), json!(active));
        }
        FilterData {
            where_clause: Some(Value::Object(conditions)),
            order: Some(json!("full_name asc")),
            limit: self.limit,
            offset: self.offset,
            ..Default::default()
        }
    }
}

/// Caller profile returned by `/api/users/me`
#[derive(Debug, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub grants: UserGrants,
}

pub fn normalize_email(raw: &str, field: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(ApiError::invalid_field(field, "must be a valid email address"));
    }
    Ok(email)
}

fn normalize_optional_email(raw: Option<&str>, field: &str) -> Result<Option<String>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(email) => normalize_email(email, field).map(Some),
        None => Ok(None),
    }
}

fn map_duplicate_email(err: sqlx::Error) -> ApiError {
    let duplicate = matches!(&err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"));
    if duplicate {
        ApiError::conflict("A user with this email already exists")
    } else {
        ApiError::from(err)
    }
}

pub async fn list(conn: &mut PgConnection, query: &UserListQuery) -> Result<Vec<User>, DatabaseError> {
    Repository::<User>::new("users").select_any(conn, query.to_filter()).await
}

pub async fn get(conn: &mut PgConnection, id: Uuid) -> Result<User, DatabaseError> {
    Repository::<User>::new("users").select_by_id(conn, id).await
}

pub async fn create(conn: &mut PgConnection, input: &NewUser) -> Result<User, ApiError> {
    let email = normalize_email(&input.email, "email")?;
    let calendar_email = normalize_optional_email(input.calendar_email.as_deref(), "calendar_email")?;
    if input.full_name.trim().is_empty() {
        return Err(ApiError::invalid_field("full_name", "must not be empty"));
    }

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, full_name, phone, role, calendar_email)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(&email)
    .bind(input.full_name.trim())
    .bind(&input.phone)
    .bind(input.role.unwrap_or(Role::Technician))
    .bind(calendar_email)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_duplicate_email)?;

    tracing::info!("Created user {} ({})", user.id, user.role);
    Ok(user)
}

pub async fn update(conn: &mut PgConnection, id: Uuid, patch: UserPatch) -> Result<User, ApiError> {
    let mut user = get(conn, id).await?;
    patch.apply(&mut user);
    if user.full_name.trim().is_empty() {
        return Err(ApiError::invalid_field("full_name", "must not be empty"));
    }
    let calendar_email = normalize_optional_email(user.calendar_email.as_deref(), "calendar_email")?;

    sqlx::query_as::<_, User>(
        "UPDATE users
         SET full_name = $2, phone = $3, role = $4, is_active = $5, calendar_email = $6, updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(user.full_name.trim())
    .bind(&user.phone)
    .bind(user.role)
    .bind(user.is_active)
    .bind(calendar_email)
    .fetch_one(&mut *conn)
    .await
    .map_err(ApiError::from)
}

/// Users are never hard-deleted; assignments keep pointing at them
pub async fn deactivate(conn: &mut PgConnection, caller_id: Uuid, id: Uuid) -> Result<User, ApiError> {
    if caller_id == id {
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET is_active = false, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!("Deactivated user {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_lowercased_and_checked() {
        assert_eq!(normalize_email("  Anna@Crew.Test ", "email").unwrap(), "anna@crew.test");
        assert!(normalize_email("anna", "email").is_err());
        assert!(normalize_email("@crew.test", "email").is_err());
        assert!(normalize_email("anna@localhost", "email").is_err());
    }

    #[test]
    fn blank_calendar_email_clears_it() {
        assert_eq!(normalize_optional_email(Some("  "), "calendar_email").unwrap(), None);
        assert_eq!(
            normalize_optional_email(Some("A@B.io"), "calendar_email").unwrap().as_deref(),
            Some("a@b.io")
        );
    }

    #[test]
    fn list_filter_has_role_and_active() {
        let filter = UserListQuery { role: Some(Role::Technician), active: Some(true), ..Default::default() }
            .to_filter();
        let conditions = filter.where_clause.unwrap();
        assert_eq!(conditions["role"], "technician");
        assert_eq!(conditions["is_active"], true);
    }
}
