#![allow(dead_code)]

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crewplan_api::auth::{generate_jwt, Claims};
use crewplan_api::config::config;
use crewplan_api::database::models::{Event, NewEvent, NewPosition, NewUser, Position, User};
use crewplan_api::database::DatabaseManager;
use crewplan_api::middleware::AuthUser;
use crewplan_api::routes;
use crewplan_api::services::access::{self, AccessProfile};
use crewplan_api::services::{events, positions, users};
use crewplan_api::state::AppState;
use crewplan_api::types::Role;

/// Router over a lazily connected pool; requests that never reach the
/// database run without one.
pub fn app() -> Result<Router> {
    let mut database = config().database.clone();
    database.acquire_timeout_secs = 3;
    let db = DatabaseManager::connect_lazy(&database)?;
    let state = AppState::with_database(db, config())?;
    Ok(routes::app(state))
}

pub fn token_for(user_id: Uuid) -> Result<String> {
    Ok(generate_jwt(&Claims::new(user_id, Some("tech@crew.test".into())))?)
}

pub fn expired_token() -> Result<String> {
    let mut claims = Claims::new(Uuid::new_v4(), None);
    claims.exp = Utc::now().timestamp() - 3600;
    Ok(generate_jwt(&claims)?)
}

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = builder.body(Body::empty())?;

    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

/// Migrated database from DATABASE_URL, or `None` when none is reachable.
/// Tests that need rows return early on `None`.
pub async fn database() -> Option<DatabaseManager> {
    let mut database = config().database.clone();
    database.acquire_timeout_secs = 3;
    database.max_connections = 4;
    let db = match DatabaseManager::connect(&database).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("skipping database test: {}", e);
            return None;
        }
    };
    if let Err(e) = db.migrate().await {
        eprintln!("skipping database test, migrations failed: {}", e);
        return None;
    }
    Some(db)
}

/// Short random suffix so rows from parallel tests and earlier runs never collide
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..10])
}

/// Insert a user with the given grants through the service client
pub async fn seed_user(
    db: &DatabaseManager,
    role: Role,
    modules: &[&str],
    permissions: &[&str],
) -> Result<User> {
    let mut tx = db.service_tx().await?;
    let input = NewUser {
        email: format!("{}@crew.test", unique("user")),
        full_name: "Test Crew".to_string(),
        phone: None,
        role: Some(role),
        calendar_email: None,
    };
    let user = users::create(&mut tx, &input).await?;
    let modules: Vec<String> = modules.iter().map(|m| m.to_string()).collect();
    let permissions: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
    access::replace_modules(&mut tx, user.id, &modules).await?;
    access::replace_permissions(&mut tx, user.id, &permissions).await?;
    tx.commit().await?;
    Ok(user)
}

/// The `AuthUser` the JWT middleware would build for `user`
pub async fn auth_user(db: &DatabaseManager, user: &User) -> Result<AuthUser> {
    let mut conn = db.service().acquire().await?;
    let profile = AccessProfile::load(&mut conn, user.id, user.role).await?;
    let claims = Claims::new(user.id, Some(user.email.clone()));
    Ok(AuthUser::new(&claims, user, profile))
}

/// Event of `hours` starting at `start_at`, created by `owner`
pub async fn seed_event(db: &DatabaseManager, owner: &User, start_at: DateTime<Utc>, hours: i64) -> Result<Event> {
    let mut tx = db.service_tx().await?;
    let input = NewEvent {
        title: unique("Gala"),
        description: None,
        location: Some("City Hall".to_string()),
        client_name: None,
        start_at,
        end_at: start_at + Duration::hours(hours),
        status: None,
        sync_calendar: false,
        create_folder: false,
    };
    let event = events::create(&mut tx, &input, owner.id).await?;
    tx.commit().await?;
    Ok(event)
}

pub async fn seed_position(db: &DatabaseManager, event: &Event, name: &str) -> Result<Position> {
    let mut tx = db.service_tx().await?;
    let input = NewPosition {
        name: name.to_string(),
        department: None,
        required_count: Some(1),
        notes: None,
    };
    let position = positions::create(&mut tx, event.id, &input).await?;
    tx.commit().await?;
    Ok(position)
}
