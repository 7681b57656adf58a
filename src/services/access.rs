//! Module/permission access layer.
//!
//! `admin` passes every check. Otherwise a module check needs the module
//! grant, and a permission check needs the permission grant together with a
//! grant for the module that owns the permission.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::database::models::{Module, Permission, UserGrants};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::types::Role;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AccessProfile {
    pub is_admin: bool,
    pub modules: HashSet<String>,
    /// Granted permission code -> owning module code
    pub permissions: HashMap<String, String>,
}

impl AccessProfile {
    pub fn new(role: Role, modules: HashSet<String>, permissions: HashMap<String, String>) -> Self {
        Self {
            is_admin: role == Role::Admin,
            modules,
            permissions,
        }
    }

    /// Load grants with the service client so the lookup itself is not
    /// filtered by row-level security
    pub async fn load(conn: &mut PgConnection, user_id: Uuid, role: Role) -> Result<Self, DatabaseError> {
        let modules: Vec<(String,)> =
            sqlx::query_as("SELECT module_code FROM user_modules WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&mut *conn)
                .await?;

        let permissions: Vec<(String, String)> = sqlx::query_as(
            "SELECT p.code, p.module_code
             FROM user_permissions up
             JOIN permissions p ON p.code = up.permission_code
             WHERE up.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Self::new(
            role,
            modules.into_iter().map(|(code,)| code).collect(),
            permissions.into_iter().collect(),
        ))
    }

    pub fn has_module(&self, code: &str) -> bool {
        self.is_admin || self.modules.contains(code)
    }

    pub fn has_permission(&self, code: &str) -> bool {
        if self.is_admin {
            return true;
        }
        match self.permissions.get(code) {
            Some(module) => self.modules.contains(module),
            None => false,
        }
    }

    pub fn require_module(&self, code: &str) -> Result<(), ApiError> {
        if self.has_module(code) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Module '{}' is not enabled for this user", code)))
        }
    }

    pub fn require_permission(&self, code: &str) -> Result<(), ApiError> {
        if self.has_permission(code) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Missing permission '{}'", code)))
        }
    }

    pub fn grants(&self) -> UserGrants {
        let mut modules: Vec<String> = self.modules.iter().cloned().collect();
        let mut permissions: Vec<String> = self.permissions.keys().cloned().collect();
        modules.sort();
        permissions.sort();
        UserGrants { modules, permissions }
    }
}

pub async fn list_modules(conn: &mut PgConnection) -> Result<Vec<Module>, DatabaseError> {
    Ok(sqlx::query_as::<_, Module>("SELECT code, name, description FROM modules ORDER BY code")
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn list_permissions(conn: &mut PgConnection) -> Result<Vec<Permission>, DatabaseError> {
    Ok(sqlx::query_as::<_, Permission>(
        "SELECT code, module_code, description FROM permissions ORDER BY module_code, code",
    )
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn user_grants(conn: &mut PgConnection, user_id: Uuid) -> Result<UserGrants, DatabaseError> {
    let modules: Vec<(String,)> =
        sqlx::query_as("SELECT module_code FROM user_modules WHERE user_id = $1 ORDER BY module_code")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
    let permissions: Vec<(String,)> = sqlx::query_as(
        "SELECT permission_code FROM user_permissions WHERE user_id = $1 ORDER BY permission_code",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(UserGrants {
        modules: modules.into_iter().map(|(c,)| c).collect(),
        permissions: permissions.into_iter().map(|(c,)| c).collect(),
    })
}

/// Codes in `requested` that are not in `known`, sorted and deduplicated
fn unknown_codes(requested: &[String], known: &HashSet<String>) -> Vec<String> {
    let mut unknown: Vec<String> = requested
        .iter()
        .filter(|code| !known.contains(code.as_str()))
        .cloned()
        .collect();
    unknown.sort();
    unknown.dedup();
    unknown
}

async fn known_codes(conn: &mut PgConnection, table: &str) -> Result<HashSet<String>, DatabaseError> {
    let rows: Vec<(String,)> = sqlx::query_as(&format!("SELECT code FROM {}", table))
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}

/// Replace a user's module grants. Unknown codes are rejected with 422.
pub async fn replace_modules(
    conn: &mut PgConnection,
    user_id: Uuid,
    codes: &[String],
) -> Result<UserGrants, ApiError> {
    let unknown = unknown_codes(codes, &known_codes(conn, "modules").await?);
    if !unknown.is_empty() {
        return Err(ApiError::unprocessable_field(
            "modules",
            format!("Unknown module codes: {}", unknown.join(", ")),
        ));
    }

    sqlx::query("DELETE FROM user_modules WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        "INSERT INTO user_modules (user_id, module_code)
         SELECT $1, code FROM UNNEST($2::text[]) AS code
         ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(codes)
    .execute(&mut *conn)
    .await?;

    tracing::info!("Replaced modules for user {}: {:?}", user_id, codes);
    Ok(user_grants(conn, user_id).await?)
}

/// Replace a user's permission grants. Unknown codes are rejected with 422.
pub async fn replace_permissions(
    conn: &mut PgConnection,
    user_id: Uuid,
    codes: &[String],
) -> Result<UserGrants, ApiError> {
    let unknown = unknown_codes(codes, &known_codes(conn, "permissions").await?);
    if !unknown.is_empty() {
        return Err(ApiError::unprocessable_field(
            "permissions",
            format!("Unknown permission codes: {}", unknown.join(", ")),
        ));
    }

    sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        "INSERT INTO user_permissions (user_id, permission_code)
         SELECT $1, code FROM UNNEST($2::text[]) AS code
         ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(codes)
    .execute(&mut *conn)
    .await?;

    tracing::info!("Replaced permissions for user {}: {:?}", user_id, codes);
    Ok(user_grants(conn, user_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(role: Role, modules: &[&str], permissions: &[(&str, &str)]) -> AccessProfile {
        AccessProfile::new(
            role,
            modules.iter().map(|m| m.to_string()).collect(),
            permissions.iter().map(|(p, m)| (p.to_string(), m.to_string())).collect(),
        )
    }

    #[test]
    fn admin_passes_everything() {
        let admin = profile(Role::Admin, &[], &[]);
        assert!(admin.has_module("warehouse"));
        assert!(admin.has_permission("offers.export"));
        assert!(admin.require_permission("users.manage").is_ok());
    }

    #[test]
    fn module_grant_is_required() {
        let tech = profile(Role::Technician, &["events"], &[]);
        assert!(tech.has_module("events"));
        assert!(!tech.has_module("offers"));
        assert_eq!(tech.require_module("offers").unwrap_err().status_code(), 403);
    }

    #[test]
    fn permission_needs_its_module_too() {
        let without_module = profile(Role::Manager, &["events"], &[("offers.manage", "offers")]);
        assert!(!without_module.has_permission("offers.manage"));

        let with_module = profile(Role::Manager, &["offers"], &[("offers.manage", "offers")]);
        assert!(with_module.has_permission("offers.manage"));
        assert!(!with_module.has_permission("offers.export"));
    }

    #[test]
    fn unknown_codes_are_reported_once() {
        let known: HashSet<String> = ["events", "crew"].iter().map(|s| s.to_string()).collect();
        let requested = vec!["crew".to_string(), "bogus".to_string(), "bogus".to_string()];
        assert_eq!(unknown_codes(&requested, &known), vec!["bogus".to_string()]);
    }

    #[test]
    fn grants_are_sorted() {
        let p = profile(Role::Manager, &["offers", "events"], &[("offers.manage", "offers")]);
        let grants = p.grants();
        assert_eq!(grants.modules, vec!["events", "offers"]);
        assert_eq!(grants.permissions, vec!["offers.manage"]);
    }
}
