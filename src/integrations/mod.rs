//! Clients for the external calendar and file-storage providers.
//!
//! Each provider sits behind a trait with an HTTP implementation and a no-op
//! implementation used when the integration is disabled.

pub mod calendar;
pub mod storage;

use thiserror::Error;

pub use calendar::{CalendarClient, GoogleCalendarClient, NoopCalendarClient};
pub use storage::{DriveStorageClient, NoopStorageClient, StorageClient};

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("{0} integration is disabled")]
    Disabled(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),
}

/// Turn a non-success response into `IntegrationError::Status`
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, IntegrationError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    Err(IntegrationError::Status { status, body })
}

/// Percent-encode one URL path segment (calendar ids are often email addresses)
pub(crate) fn path_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Provider answered "gone": 404 Not Found or 410 Gone
pub(crate) fn is_gone(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE
}
