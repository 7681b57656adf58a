//! Technician assignments and scheduling conflicts

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::database::models::{Assignment, AssignmentPatch, MyAssignment, NewAssignment, User};
use crate::database::{DatabaseError, Repository};
use crate::error::ApiError;
use crate::middleware::AuthUser;

/// Half-open interval overlap: intervals that only touch do not overlap
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// One technician's non-declined assignment on one event
#[derive(Debug, Clone, FromRow)]
pub struct TechnicianSlot {
    pub technician_id: Uuid,
    pub technician_name: String,
    pub event_id: Uuid,
    pub event_title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub technician_id: Uuid,
    pub technician_name: String,
    pub event_id: Uuid,
    pub conflicting_event_id: Uuid,
    pub conflicting_event_title: String,
    pub conflicting_start_at: DateTime<Utc>,
    pub conflicting_end_at: DateTime<Utc>,
}

/// Pair every slot on `event_id` with the same technician's slots on other
/// overlapping events. Results are deduplicated per (technician, other event).
pub fn find_conflicts(event_id: Uuid, slots: &[TechnicianSlot]) -> Vec<Conflict> {
    let mut conflicts: Vec<Conflict> = Vec::new();
    for own in slots.iter().filter(|s| s.event_id == event_id) {
        for other in slots.iter().filter(|s| s.technician_id == own.technician_id && s.event_id != event_id) {
            if !intervals_overlap(own.start_at, own.end_at, other.start_at, other.end_at) {
                continue;
            }
            let duplicate = conflicts
                .iter()
                .any(|c| c.technician_id == own.technician_id && c.conflicting_event_id == other.event_id);
            if !duplicate {
                conflicts.push(Conflict {
                    technician_id: own.technician_id,
                    technician_name: own.technician_name.clone(),
                    event_id,
                    conflicting_event_id: other.event_id,
                    conflicting_event_title: other.event_title.clone(),
                    conflicting_start_at: other.start_at,
                    conflicting_end_at: other.end_at,
                });
            }
        }
    }
    conflicts.sort_by(|a, b| {
        a.technician_name
            .cmp(&b.technician_name)
            .then(a.conflicting_start_at.cmp(&b.conflicting_start_at))
    });
    conflicts
}

/// Non-declined slots of the technicians on `event_id` (optionally only one
/// technician), on the event itself and on every other overlapping event.
async fn load_slots(
    conn: &mut PgConnection,
    event_id: Uuid,
    technician_id: Option<Uuid>,
) -> Result<Vec<TechnicianSlot>, DatabaseError> {
    Ok(sqlx::query_as::<_, TechnicianSlot>(
        "WITH target AS (SELECT start_at, end_at FROM events WHERE id = $1),
              crew AS (
                  SELECT DISTINCT a.technician_id
                  FROM assignments a JOIN positions p ON p.id = a.position_id
                  WHERE p.event_id = $1 AND a.attendance_status <> 'declined'
                    AND ($2::uuid IS NULL OR a.technician_id = $2)
              )
         SELECT DISTINCT a.technician_id, u.full_name AS technician_name,
                e.id AS event_id, e.title AS event_title, e.start_at, e.end_at
         FROM assignments a
         JOIN crew c ON c.technician_id = a.technician_id
         JOIN positions p ON p.id = a.position_id
         JOIN events e ON e.id = p.event_id
         JOIN users u ON u.id = a.technician_id
         CROSS JOIN target t
         WHERE a.attendance_status <> 'declined'
           AND e.status <> 'cancelled'
           AND (e.id = $1 OR (e.start_at < t.end_at AND t.start_at < e.end_at))",
    )
    .bind(event_id)
    .bind(technician_id)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn event_conflicts(conn: &mut PgConnection, event_id: Uuid) -> Result<Vec<Conflict>, DatabaseError> {
    crate::services::events::get(conn, event_id).await?;
    let slots = load_slots(conn, event_id, None).await?;
    Ok(find_conflicts(event_id, &slots))
}

#[derive(Debug, Serialize)]
pub struct AssignmentOutcome {
    #[serde(flatten)]
    pub assignment: Assignment,
    /// More non-declined assignments than the position requires
    pub overbooked: bool,
    pub conflicts: Vec<Conflict>,
}

pub async fn get(conn: &mut PgConnection, id: Uuid) -> Result<Assignment, DatabaseError> {
    Repository::<Assignment>::new("assignments").select_by_id(conn, id).await
}

pub async fn assign(
    conn: &mut PgConnection,
    position_id: Uuid,
    input: &NewAssignment,
) -> Result<AssignmentOutcome, ApiError> {
    let position = crate::services::positions::get(conn, position_id).await?;

    let technician = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(input.technician_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::unprocessable_field("technician_id", "Technician does not exist"))?;
    if !technician.is_active {
        return Err(ApiError::unprocessable_field("technician_id", "Technician is inactive"));
    }
    if !technician.role.can_be_assigned() {
        return Err(ApiError::unprocessable_field(
            "technician_id",
            format!("Users with role '{}' cannot be assigned", technician.role),
        ));
    }

    let assignment = sqlx::query_as::<_, Assignment>(
        "INSERT INTO assignments (position_id, technician_id, notes)
         VALUES ($1, $2, $3)
         RETURNING *",
    )
    .bind(position_id)
    .bind(input.technician_id)
    .bind(&input.notes)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        let duplicate = matches!(&e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"));
        if duplicate {
            ApiError::conflict("Technician is already assigned to this position")
        } else {
            ApiError::from(e)
        }
    })?;

    let (filled,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM assignments WHERE position_id = $1 AND attendance_status <> 'declined'",
    )
    .bind(position_id)
    .fetch_one(&mut *conn)
    .await?;

    let slots = load_slots(conn, position.event_id, Some(input.technician_id)).await?;
    let conflicts = find_conflicts(position.event_id, &slots);
    if !conflicts.is_empty() {
        tracing::warn!(
            "Technician {} assigned to event {} with {} conflict(s)",
            technician.id,
            position.event_id,
            conflicts.len()
        );
    }

    Ok(AssignmentOutcome {
        assignment,
        overbooked: filled > i64::from(position.required_count),
        conflicts,
    })
}

/// Technicians may answer for themselves; `crew.assign` may edit anyone's.
pub async fn update(
    conn: &mut PgConnection,
    caller: &AuthUser,
    id: Uuid,
    patch: AssignmentPatch,
) -> Result<Assignment, ApiError> {
    let mut assignment = get(conn, id).await?;
    if assignment.technician_id != caller.id {
        caller.require_permission("crew.assign")?;
    }

    if let Some(status) = patch.attendance_status {
        assignment.attendance_status = status;
        assignment.responded_at = Some(Utc::now());
    }
    if let Some(notes) = patch.notes {
        assignment.notes = notes;
    }

    Ok(sqlx::query_as::<_, Assignment>(
        "UPDATE assignments
         SET attendance_status = $2, notes = $3, responded_at = $4, updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(assignment.attendance_status)
    .bind(&assignment.notes)
    .bind(assignment.responded_at)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM assignments WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Assignment not found"));
    }
    Ok(())
}

pub async fn mine(conn: &mut PgConnection, technician_id: Uuid) -> Result<Vec<MyAssignment>, DatabaseError> {
    Ok(sqlx::query_as::<_, MyAssignment>(
        "SELECT a.id, a.position_id, p.name AS position_name, a.attendance_status, a.notes,
                a.responded_at, e.id AS event_id, e.title AS event_title,
                e.location AS event_location, e.status AS event_status, e.start_at, e.end_at
         FROM assignments a
         JOIN positions p ON p.id = a.position_id
         JOIN events e ON e.id = p.event_id
         WHERE a.technician_id = $1
         ORDER BY e.start_at, p.name",
    )
    .bind(technician_id)
    .fetch_all(&mut *conn)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32) -> DateTime<Utc> {
        format!("2024-06-01T{:02}:00:00Z", h).parse().unwrap()
    }

    fn slot(tech: Uuid, name: &str, event: Uuid, start: u32, end: u32) -> TechnicianSlot {
        TechnicianSlot {
            technician_id: tech,
            technician_name: name.into(),
            event_id: event,
            event_title: format!("event {}", start),
            start_at: at(start),
            end_at: at(end),
        }
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        assert!(!intervals_overlap(at(8), at(12), at(12), at(16)));
        assert!(intervals_overlap(at(8), at(12), at(11), at(16)));
        assert!(intervals_overlap(at(8), at(16), at(10), at(11)));
        assert!(!intervals_overlap(at(12), at(16), at(8), at(12)));
    }

    #[test]
    fn finds_conflicts_per_technician() {
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let (gala, concert, later) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let slots = vec![
            slot(alice, "Alice", gala, 10, 14),
            slot(alice, "Alice", concert, 13, 18),
            slot(alice, "Alice", later, 14, 20),
            slot(bob, "Bob", gala, 10, 14),
        ];

        let conflicts = find_conflicts(gala, &slots);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].technician_id, alice);
        assert_eq!(conflicts[0].conflicting_event_id, concert);
    }

    #[test]
    fn double_positions_do_not_duplicate_conflicts() {
        let alice = Uuid::new_v4();
        let (gala, concert) = (Uuid::new_v4(), Uuid::new_v4());
        let slots = vec![
            slot(alice, "Alice", gala, 10, 14),
            slot(alice, "Alice", gala, 10, 14),
            slot(alice, "Alice", concert, 12, 13),
        ];
        assert_eq!(find_conflicts(gala, &slots).len(), 1);
    }
}
