use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{DatabaseError, DatabaseManager};
use crate::integrations::{
    CalendarClient, DriveStorageClient, GoogleCalendarClient, IntegrationError, NoopCalendarClient,
    NoopStorageClient, StorageClient,
};

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseManager,
    pub calendar: Arc<dyn CalendarClient>,
    pub storage: Arc<dyn StorageClient>,
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

impl AppState {
    pub fn new(
        db: DatabaseManager,
        calendar: Arc<dyn CalendarClient>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self { db, calendar, storage }
    }

    /// Connect the pool and build the integration clients the config enables
    pub async fn from_config(config: &AppConfig) -> Result<Self, StateError> {
        let db = DatabaseManager::connect(&config.database).await?;
        Self::with_database(db, config)
    }

    pub fn with_database(db: DatabaseManager, config: &AppConfig) -> Result<Self, StateError> {
        let calendar: Arc<dyn CalendarClient> =
            if config.calendar.enabled && !config.calendar.access_token.is_empty() {
                tracing::info!("Calendar sync enabled for calendar '{}'", config.calendar.calendar_id);
                Arc::new(GoogleCalendarClient::new(config.calendar.clone())?)
            } else {
                Arc::new(NoopCalendarClient)
            };

        let storage: Arc<dyn StorageClient> =
            if config.storage.enabled && !config.storage.access_token.is_empty() {
                tracing::info!("Storage folders enabled");
                Arc::new(DriveStorageClient::new(config.storage.clone())?)
            } else {
                Arc::new(NoopStorageClient)
            };

        Ok(Self::new(db, calendar, storage))
    }
}
