//! Google Drive v3 client for per-event folders

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{check_status, path_segment, IntegrationError};
use crate::config::StorageConfig;

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageFolder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub web_view_link: Option<String>,
}

impl StorageFolder {
    /// Link to open the folder; falls back to the canonical Drive URL
    pub fn url(&self) -> String {
        self.web_view_link
            .clone()
            .unwrap_or_else(|| format!("https://drive.google.com/drive/folders/{}", self.id))
    }
}

#[async_trait]
pub trait StorageClient: Send + Sync {
    fn is_enabled(&self) -> bool;
    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<StorageFolder, IntegrationError>;
    /// Grant `role` (`reader`, `writer`, ...) on the folder to `email`
    async fn share_with(&self, folder_id: &str, email: &str, role: &str) -> Result<(), IntegrationError>;
}

pub struct DriveStorageClient {
    client: Client,
    config: StorageConfig,
}

impl DriveStorageClient {
    pub fn new(config: StorageConfig) -> Result<Self, IntegrationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl StorageClient for DriveStorageClient {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<StorageFolder, IntegrationError> {
        let mut body = json!({ "name": name, "mimeType": FOLDER_MIME_TYPE });
        if let Some(parent) = parent_id.filter(|p| !p.is_empty()) {
            body["parents"] = json!([parent]);
        }

        let response = self
            .client
            .post(self.files_url())
            .bearer_auth(&self.config.access_token)
            .query(&[("fields", "id,name,webViewLink"), ("supportsAllDrives", "true")])
            .json(&body)
            .send()
            .await?;
        let folder: StorageFolder = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| IntegrationError::Decode(e.to_string()))?;

        debug!("Created storage folder {} ({})", folder.name, folder.id);
        Ok(folder)
    }

    async fn share_with(&self, folder_id: &str, email: &str, role: &str) -> Result<(), IntegrationError> {
        let url = format!("{}/{}/permissions", self.files_url(), path_segment(folder_id));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.access_token)
            .query(&[("sendNotificationEmail", "false"), ("supportsAllDrives", "true")])
            .json(&json!({ "type": "user", "role": role, "emailAddress": email }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

pub struct NoopStorageClient;

#[async_trait]
impl StorageClient for NoopStorageClient {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn create_folder(&self, _name: &str, _parent_id: Option<&str>) -> Result<StorageFolder, IntegrationError> {
        Err(IntegrationError::Disabled("Storage"))
    }

    async fn share_with(&self, _folder_id: &str, _email: &str, _role: &str) -> Result<(), IntegrationError> {
        Err(IntegrationError::Disabled("Storage"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_url_fallback() {
        let folder = StorageFolder { id: "f1".into(), name: "x".into(), web_view_link: None };
        assert_eq!(folder.url(), "https://drive.google.com/drive/folders/f1");
        let folder = StorageFolder { web_view_link: Some("https://link".into()), ..folder };
        assert_eq!(folder.url(), "https://link");
    }

    #[test]
    fn parses_drive_response() {
        let folder: StorageFolder = serde_json::from_str(
            r#"{"id":"1AbC","name":"2024-06-01 Gala","webViewLink":"https://drive.google.com/x"}"#,
        )
        .unwrap();
        assert_eq!(folder.id, "1AbC");
        assert_eq!(folder.web_view_link.as_deref(), Some("https://drive.google.com/x"));
    }
}
