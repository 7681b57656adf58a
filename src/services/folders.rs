//! Per-event folders in the file-storage provider

use std::collections::HashSet;

use futures::future::join_all;
use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::database::models::{Event, EventAssignee};
use crate::error::ApiError;
use crate::integrations::{IntegrationError, StorageClient};
use crate::services::events;
use crate::types::AttendanceStatus;

const SHARE_ROLE: &str = "writer";

/// Path separators become `-`; surrounding whitespace is dropped
pub fn sanitize_folder_name(raw: &str) -> String {
    raw.replace(['/', '\\'], "-").trim().to_string()
}

/// `"{YYYY-MM-DD} {title}"` using the event's start date
pub fn folder_name(event: &Event) -> String {
    sanitize_folder_name(&format!("{} {}", event.start_at.format("%Y-%m-%d"), event.title.trim()))
}

/// Distinct addresses of non-declined assignees, in assignment order
pub fn share_targets(assignees: &[EventAssignee]) -> Vec<String> {
    let mut seen = HashSet::new();
    assignees
        .iter()
        .filter(|a| a.attendance_status != AttendanceStatus::Declined)
        .map(|a| a.calendar_address().to_string())
        .filter(|email| seen.insert(email.to_lowercase()))
        .collect()
}

/// Create the event folder, its subfolders and shares, once. An event that
/// already has a folder is returned unchanged.
///
/// The event row stays locked until the caller commits, so a second
/// provisioning request waits and then sees the stored folder.
pub async fn provision(
    conn: &mut PgConnection,
    storage: &dyn StorageClient,
    config: &StorageConfig,
    event_id: Uuid,
) -> Result<Event, ApiError> {
    let event = events::get_for_update(conn, event_id).await?;
    if event.storage_folder_id.is_some() {
        return Ok(event);
    }
    if !storage.is_enabled() {
        return Err(IntegrationError::Disabled("Storage").into());
    }

    let parent = Some(config.root_folder_id.as_str()).filter(|id| !id.is_empty());
    let folder = storage.create_folder(&folder_name(&event), parent).await?;
    for subfolder in &config.event_subfolders {
        storage
            .create_folder(&sanitize_folder_name(subfolder), Some(&folder.id))
            .await?;
    }

    let assignees = events::assignees(conn, event_id).await?;
    let targets = share_targets(&assignees);
    let shares = targets
        .iter()
        .map(|email| storage.share_with(&folder.id, email, SHARE_ROLE));
    // a failed share leaves the folder usable
    for (email, result) in targets.iter().zip(join_all(shares).await) {
        if let Err(e) = result {
            warn!("Failed to share folder {} with {}: {}", folder.id, email, e);
        }
    }

    info!("Created storage folder {} for event {}", folder.id, event.id);
    Ok(events::set_storage_folder(conn, event.id, &folder.id, &folder.url()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use chrono::{TimeZone, Utc};

    fn assignee(email: &str, status: AttendanceStatus) -> EventAssignee {
        testing::assignee(email, "Lights", status)
    }

    #[test]
    fn folder_names_are_sanitized() {
        assert_eq!(sanitize_folder_name("  AC/DC \\ tribute "), "AC-DC - tribute");
    }

    #[test]
    fn folder_name_uses_start_date() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();
        let event = testing::event("Gala / Night", start, 5);
        assert_eq!(folder_name(&event), "2024-06-01 Gala - Night");
    }

    #[test]
    fn shares_skip_declined_and_duplicates() {
        let targets = share_targets(&[
            assignee("anna@crew.test", AttendanceStatus::Accepted),
            assignee("Anna@crew.test", AttendanceStatus::Pending),
            assignee("bob@crew.test", AttendanceStatus::Declined),
            assignee("cleo@crew.test", AttendanceStatus::Tentative),
        ]);
        assert_eq!(targets, vec!["anna@crew.test", "cleo@crew.test"]);
    }
}
