pub mod calendar;
pub mod db;
pub mod offers;
pub mod token;

use crate::config::config;
use crate::database::DatabaseManager;
use crate::state::AppState;

/// Connect with the service role; CLI commands run outside any user scope
pub(crate) async fn connect() -> anyhow::Result<DatabaseManager> {
    Ok(DatabaseManager::connect(&config().database).await?)
}

pub(crate) async fn connect_state() -> anyhow::Result<AppState> {
    Ok(AppState::from_config(config()).await?)
}
