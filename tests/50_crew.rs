mod common;

use anyhow::Result;
use chrono::{Duration, Utc};

use crewplan_api::database::models::{AssignmentPatch, NewAssignment, NewUser, User};
use crewplan_api::services::{assignments, users};
use crewplan_api::types::{AttendanceStatus, Role};

fn assignment_for(technician: &User) -> NewAssignment {
    NewAssignment { technician_id: technician.id, notes: None }
}

#[tokio::test]
async fn duplicate_assignment_conflicts() -> Result<()> {
    let Some(db) = common::database().await else { return Ok(()) };
    let manager = common::seed_user(&db, Role::Manager, &[], &[]).await?;
    let tech = common::seed_user(&db, Role::Technician, &[], &[]).await?;
    let event = common::seed_event(&db, &manager, Utc::now() + Duration::days(10), 6).await?;
    let position = common::seed_position(&db, &event, "FOH engineer").await?;

    let mut tx = db.service_tx().await?;
    let outcome = assignments::assign(&mut tx, position.id, &assignment_for(&tech)).await?;
    assert!(!outcome.overbooked);
    tx.commit().await?;

    let mut tx = db.service_tx().await?;
    let err = assignments::assign(&mut tx, position.id, &assignment_for(&tech)).await.unwrap_err();
    assert_eq!(err.status_code(), 409);
    Ok(())
}

#[tokio::test]
async fn duplicate_email_conflicts_case_insensitively() -> Result<()> {
    let Some(db) = common::database().await else { return Ok(()) };
    let existing = common::seed_user(&db, Role::Technician, &[], &[]).await?;

    let mut tx = db.service_tx().await?;
    let input = NewUser {
        email: existing.email.to_uppercase(),
        full_name: "Second Account".to_string(),
        phone: None,
        role: None,
        calendar_email: None,
    };
    let err = users::create(&mut tx, &input).await.unwrap_err();
    assert_eq!(err.status_code(), 409);
    Ok(())
}

#[tokio::test]
async fn technicians_answer_only_for_themselves() -> Result<()> {
    let Some(db) = common::database().await else { return Ok(()) };
    let manager = common::seed_user(&db, Role::Manager, &["crew"], &["crew.assign"]).await?;
    let tech = common::seed_user(&db, Role::Technician, &[], &[]).await?;
    let colleague = common::seed_user(&db, Role::Technician, &["crew"], &[]).await?;
    let event = common::seed_event(&db, &manager, Utc::now() + Duration::days(12), 8).await?;
    let position = common::seed_position(&db, &event, "Rigger").await?;

    let mut tx = db.service_tx().await?;
    let assignment = assignments::assign(&mut tx, position.id, &assignment_for(&tech)).await?.assignment;
    tx.commit().await?;

    let accept = || AssignmentPatch { attendance_status: Some(AttendanceStatus::Accepted), notes: None };

    // own assignment, no crew grants at all
    let caller = common::auth_user(&db, &tech).await?;
    let mut tx = db.user_scope(caller.rls_claims()).await?;
    let updated = assignments::update(&mut tx, &caller, assignment.id, accept()).await?;
    assert_eq!(updated.attendance_status, AttendanceStatus::Accepted);
    assert!(updated.responded_at.is_some());
    tx.commit().await?;

    // someone else's assignment needs crew.assign
    let caller = common::auth_user(&db, &colleague).await?;
    let mut tx = db.user_scope(caller.rls_claims()).await?;
    let err = assignments::update(&mut tx, &caller, assignment.id, accept()).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
    drop(tx);

    let caller = common::auth_user(&db, &manager).await?;
    let mut tx = db.user_scope(caller.rls_claims()).await?;
    let decline = AssignmentPatch { attendance_status: Some(AttendanceStatus::Declined), notes: None };
    let updated = assignments::update(&mut tx, &caller, assignment.id, decline).await?;
    assert_eq!(updated.attendance_status, AttendanceStatus::Declined);
    tx.commit().await?;
    Ok(())
}
