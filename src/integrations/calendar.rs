//! Google Calendar v3 client

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_status, is_gone, path_segment, IntegrationError};
use crate::config::CalendarConfig;

/// Key under `extendedProperties.private` linking a provider event back to
/// our event id
pub const EVENT_ID_PROPERTY: &str = "crewplan_event_id";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub start: EventDateTime,
    #[serde(default)]
    pub end: EventDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Attendee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_properties: Option<ExtendedProperties>,
    #[serde(default, skip_serializing)]
    pub html_link: Option<String>,
}

impl CalendarEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
    /// All-day events carry a date instead of a dateTime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            date_time: Some(instant),
            date: None,
            time_zone: Some("UTC".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedProperties {
    #[serde(default)]
    pub private: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<CalendarEvent>,
    next_page_token: Option<String>,
}

#[async_trait]
pub trait CalendarClient: Send + Sync {
    fn is_enabled(&self) -> bool;
    async fn insert_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, IntegrationError>;
    async fn update_event(&self, event_id: &str, event: &CalendarEvent) -> Result<CalendarEvent, IntegrationError>;
    /// Deleting an event the provider no longer has is not an error
    async fn delete_event(&self, event_id: &str) -> Result<(), IntegrationError>;
    /// `None` when the provider reports the event as gone
    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, IntegrationError>;
    async fn list_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, IntegrationError>;
}

pub struct GoogleCalendarClient {
    client: Client,
    config: CalendarConfig,
}

impl GoogleCalendarClient {
    pub fn new(config: CalendarConfig) -> Result<Self, IntegrationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.config.api_base.trim_end_matches('/'),
            path_segment(&self.config.calendar_id)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), path_segment(event_id))
    }

    async fn decode(response: reqwest::Response) -> Result<CalendarEvent, IntegrationError> {
        check_status(response)
            .await?
            .json::<CalendarEvent>()
            .await
            .map_err(|e| IntegrationError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn insert_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, IntegrationError> {
        let response = self
            .client
            .post(self.events_url())
            .bearer_auth(&self.config.access_token)
            .query(&[("sendUpdates", self.config.send_updates.as_str())])
            .json(event)
            .send()
            .await?;
        let created = Self::decode(response).await?;
        debug!("Inserted calendar event {:?}", created.id);
        Ok(created)
    }

    async fn update_event(&self, event_id: &str, event: &CalendarEvent) -> Result<CalendarEvent, IntegrationError> {
        let response = self
            .client
            .patch(self.event_url(event_id))
            .bearer_auth(&self.config.access_token)
            .query(&[("sendUpdates", self.config.send_updates.as_str())])
            .json(event)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), IntegrationError> {
        let response = self
            .client
            .delete(self.event_url(event_id))
            .bearer_auth(&self.config.access_token)
            .query(&[("sendUpdates", self.config.send_updates.as_str())])
            .send()
            .await?;
        if is_gone(response.status()) {
            debug!("Calendar event {} already deleted", event_id);
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, IntegrationError> {
        let response = self
            .client
            .get(self.event_url(event_id))
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        if is_gone(response.status()) {
            return Ok(None);
        }
        Self::decode(response).await.map(Some)
    }

    async fn list_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, IntegrationError> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("maxResults", "250".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .client
                .get(self.events_url())
                .bearer_auth(&self.config.access_token)
                .query(&query)
                .send()
                .await?;
            let page: EventsPage = check_status(response)
                .await?
                .json()
                .await
                .map_err(|e| IntegrationError::Decode(e.to_string()))?;

            events.extend(page.items);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(events)
    }
}

/// Stand-in used when calendar sync is disabled
pub struct NoopCalendarClient;

#[async_trait]
impl CalendarClient for NoopCalendarClient {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn insert_event(&self, _event: &CalendarEvent) -> Result<CalendarEvent, IntegrationError> {
        Err(IntegrationError::Disabled("Calendar"))
    }

    async fn update_event(&self, _event_id: &str, _event: &CalendarEvent) -> Result<CalendarEvent, IntegrationError> {
        Err(IntegrationError::Disabled("Calendar"))
    }

    async fn delete_event(&self, _event_id: &str) -> Result<(), IntegrationError> {
        Err(IntegrationError::Disabled("Calendar"))
    }

    async fn get_event(&self, _event_id: &str) -> Result<Option<CalendarEvent>, IntegrationError> {
        Err(IntegrationError::Disabled("Calendar"))
    }

    async fn list_events(
        &self,
        _time_min: DateTime<Utc>,
        _time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, IntegrationError> {
        Err(IntegrationError::Disabled("Calendar"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_google_wire_format() {
        let start = "2024-06-01T18:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let event = CalendarEvent {
            summary: Some("Gala".into()),
            start: EventDateTime::at(start),
            end: EventDateTime::at(start),
            attendees: vec![Attendee { email: "a@example.com".into(), ..Default::default() }],
            ..Default::default()
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["start"]["dateTime"], "2024-06-01T18:00:00Z");
        assert_eq!(v["attendees"][0]["email"], "a@example.com");
        assert!(v.get("id").is_none());
        assert!(v.get("htmlLink").is_none());
    }

    #[test]
    fn parses_provider_event() {
        let event: CalendarEvent = serde_json::from_value(json!({
            "id": "abc",
            "status": "cancelled",
            "htmlLink": "https://calendar.example/abc",
            "start": { "date": "2024-06-01" },
            "end": { "date": "2024-06-02" },
            "attendees": [{ "email": "t@example.com", "responseStatus": "accepted" }]
        }))
        .unwrap();
        assert!(event.is_cancelled());
        assert_eq!(event.attendees[0].response_status.as_deref(), Some("accepted"));
        assert_eq!(event.html_link.as_deref(), Some("https://calendar.example/abc"));
    }

    #[test]
    fn builds_urls_from_config() {
        let mut config = crate::config::config().calendar.clone();
        config.api_base = "https://www.googleapis.com/calendar/v3/".into();
        config.calendar_id = "crew@example.com".into();
        let client = GoogleCalendarClient::new(config).unwrap();
        assert_eq!(
            client.event_url("e1"),
            "https://www.googleapis.com/calendar/v3/calendars/crew%40example.com/events/e1"
        );
    }

    #[tokio::test]
    async fn noop_reports_disabled() {
        let client = NoopCalendarClient;
        assert!(!client.is_enabled());
        assert!(matches!(client.get_event("x").await, Err(IntegrationError::Disabled(_))));
    }
}
