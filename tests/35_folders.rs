mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};

use crewplan_api::config::{config, StorageConfig};
use crewplan_api::database::models::Event;
use crewplan_api::database::DatabaseManager;
use crewplan_api::integrations::storage::StorageFolder;
use crewplan_api::integrations::{IntegrationError, StorageClient};
use crewplan_api::services::folders;
use crewplan_api::types::Role;

/// Storage that records every folder it creates and answers slowly
#[derive(Default)]
struct RecordingStorage {
    created: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingStorage {
    fn top_level(&self) -> usize {
        self.created
            .lock()
            .map(|created| created.iter().filter(|(_, parent)| parent.is_none()).count())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageClient for RecordingStorage {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<StorageFolder, IntegrationError> {
        tokio::time::sleep(StdDuration::from_millis(200)).await;
        let id = format!("folder-{}", common::unique("f"));
        if let Ok(mut created) = self.created.lock() {
            created.push((name.to_string(), parent_id.map(str::to_string)));
        }
        Ok(StorageFolder { id, name: name.to_string(), web_view_link: None })
    }

    async fn share_with(&self, _folder_id: &str, _email: &str, _role: &str) -> Result<(), IntegrationError> {
        Ok(())
    }
}

fn storage_config() -> StorageConfig {
    let mut storage = config().storage.clone();
    storage.root_folder_id = String::new();
    storage.event_subfolders = vec!["Docs".to_string()];
    storage
}

async fn provision_and_commit(
    db: DatabaseManager,
    storage: Arc<RecordingStorage>,
    event_id: uuid::Uuid,
) -> Result<Event> {
    let mut tx = db.service_tx().await?;
    let event = folders::provision(&mut tx, storage.as_ref(), &storage_config(), event_id).await?;
    tx.commit().await?;
    Ok(event)
}

#[tokio::test]
async fn concurrent_provisioning_creates_one_folder() -> Result<()> {
    let Some(db) = common::database().await else { return Ok(()) };
    let owner = common::seed_user(&db, Role::Manager, &[], &[]).await?;
    let event = common::seed_event(&db, &owner, Utc::now() + Duration::days(20), 5).await?;
    let storage = Arc::new(RecordingStorage::default());

    let first = tokio::spawn(provision_and_commit(db.clone(), storage.clone(), event.id));
    tokio::time::sleep(StdDuration::from_millis(50)).await;
    let second = tokio::spawn(provision_and_commit(db.clone(), storage.clone(), event.id));

    let first = first.await??;
    let second = second.await??;
    assert!(first.storage_folder_id.is_some());
    assert_eq!(first.storage_folder_id, second.storage_folder_id);
    assert_eq!(storage.top_level(), 1);
    Ok(())
}

#[tokio::test]
async fn provisioning_is_idempotent() -> Result<()> {
    let Some(db) = common::database().await else { return Ok(()) };
    let owner = common::seed_user(&db, Role::Manager, &[], &[]).await?;
    let event = common::seed_event(&db, &owner, Utc::now() + Duration::days(21), 5).await?;
    let storage = Arc::new(RecordingStorage::default());

    let first = provision_and_commit(db.clone(), storage.clone(), event.id).await?;
    let again = provision_and_commit(db.clone(), storage.clone(), event.id).await?;
    assert_eq!(first.storage_folder_url, again.storage_folder_url);
    // the event folder plus its one subfolder
    assert_eq!(storage.created.lock().map(|c| c.len()).unwrap_or_default(), 2);
    Ok(())
}
