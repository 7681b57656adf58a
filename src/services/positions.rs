use sqlx::PgConnection;
use uuid::Uuid;

use crate::database::models::{NewPosition, Position, PositionPatch};
use crate::database::{DatabaseError, Repository};
use crate::error::ApiError;

fn validate(name: &str, required_count: i32) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::invalid_field("name", "must not be empty"));
    }
    if required_count < 1 {
        return Err(ApiError::invalid_field("required_count", "must be at least 1"));
    }
    Ok(())
}

pub async fn list(conn: &mut PgConnection, event_id: Uuid) -> Result<Vec<Position>, DatabaseError> {
    Ok(sqlx::query_as::<_, Position>(
        "SELECT * FROM positions WHERE event_id = $1 ORDER BY created_at, name",
    )
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn get(conn: &mut PgConnection, id: Uuid) -> Result<Position, DatabaseError> {
    Repository::<Position>::new("positions").select_by_id(conn, id).await
}

pub async fn create(conn: &mut PgConnection, event_id: Uuid, input: &NewPosition) -> Result<Position, ApiError> {
    let required_count = input.required_count.unwrap_or(1);
    validate(&input.name, required_count)?;

    // 404 rather than a foreign-key 422 when the event is missing or hidden
    crate::services::events::get(conn, event_id).await?;

    Ok(sqlx::query_as::<_, Position>(
        "INSERT INTO positions (event_id, name, department, required_count, notes)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(event_id)
    .bind(input.name.trim())
    .bind(&input.department)
    .bind(required_count)
    .bind(&input.notes)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn update(conn: &mut PgConnection, id: Uuid, patch: PositionPatch) -> Result<Position, ApiError> {
    let mut position = get(conn, id).await?;
    patch.apply(&mut position);
    validate(&position.name, position.required_count)?;

    Ok(sqlx::query_as::<_, Position>(
        "UPDATE positions SET name = $2, department = $3, required_count = $4, notes = $5
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(position.name.trim())
    .bind(&position.department)
    .bind(position.required_count)
    .bind(&position.notes)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM positions WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Position not found"));
    }
    Ok(())
}
