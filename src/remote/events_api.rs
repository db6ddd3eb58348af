use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

use crate::calendar::Event;
use crate::calendar::event::wire_datetime;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Request error: {0}")]
    Request(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Authentication failed")]
    Unauthorized,
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Client-side subset of an event sent on create/update. The recurrence
/// string is replaced wholesale on every save; the server never sees a
/// partial rule edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDraft {
    pub title: String,
    #[serde(with = "wire_datetime")]
    pub start: NaiveDateTime,
    #[serde(with = "wire_datetime")]
    pub end: NaiveDateTime,
    pub description: String,
    pub recurrence: Option<String>,
}

impl EventDraft {
    pub fn from_event(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            start: event.start,
            end: event.end,
            description: event.description.clone(),
            recurrence: event.recurrence.clone(),
        }
    }
}

#[async_trait]
pub trait EventsApi {
    /// Lists the user's events. With a date, the server expands recurring
    /// rules into per-day instances and applies any stored overrides.
    async fn list_events(&self, date: Option<NaiveDate>) -> Result<Vec<Event>, ApiError>;

    async fn create_event(&self, draft: &EventDraft) -> Result<Event, ApiError>;

    async fn update_event(&self, event_id: &str, draft: &EventDraft) -> Result<(), ApiError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), ApiError>;

    /// Replaces a single occurrence of a recurring event on `date`,
    /// leaving the template rule untouched.
    async fn override_instance(
        &self,
        original_id: &str,
        date: NaiveDate,
        draft: &EventDraft,
    ) -> Result<(), ApiError>;

    /// Removes a single occurrence of a recurring event on `date`.
    async fn delete_instance(&self, original_id: &str, date: NaiveDate) -> Result<(), ApiError>;
}

pub struct HttpEventsClient {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl HttpEventsClient {
    pub fn new(base_url: String, access_token: String) -> Self {
        Self {
            base_url,
            access_token,
            client: reqwest::Client::new(),
        }
    }

    fn events_url(&self) -> String {
        format!("{}/api/events", self.base_url)
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/api/events/{}", self.base_url, event_id)
    }

    fn override_url(&self, original_id: &str) -> String {
        format!("{}/api/events/{}/override", self.base_url, original_id)
    }

    async fn check_status(
        response: reqwest::Response,
        subject: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let status = response.status();

        if status == 401 {
            tracing::error!("Authentication failed ({})", subject);
            return Err(ApiError::Unauthorized);
        }

        if status == 404 {
            tracing::error!("Not found: {}", subject);
            return Err(ApiError::NotFound(subject.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await?;
            tracing::error!("Request failed ({}). Status: {}, Body: {}", subject, status, body);
            return Err(ApiError::Request(format!("Status {}: {}", status, body)));
        }

        Ok(response)
    }
}

#[async_trait]
impl EventsApi for HttpEventsClient {
    async fn list_events(&self, date: Option<NaiveDate>) -> Result<Vec<Event>, ApiError> {
        let mut request = self
            .client
            .get(self.events_url())
            .bearer_auth(&self.access_token);

        if let Some(date) = date {
            request = request.query(&[("date", date.format("%Y-%m-%d").to_string())]);
        }

        tracing::info!("Fetching events (date filter: {:?})", date);
        let response = request.send().await?;
        let response = Self::check_status(response, "event list").await?;

        let events: Vec<Event> = response.json().await?;
        tracing::info!("Fetched {} events", events.len());
        Ok(events)
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<Event, ApiError> {
        tracing::info!("Creating event: {} on {}", draft.title, draft.start);

        let response = self
            .client
            .post(self.events_url())
            .bearer_auth(&self.access_token)
            .json(draft)
            .send()
            .await?;
        let response = Self::check_status(response, "event create").await?;

        let created: Event = response.json().await?;
        tracing::info!("Event created with id {}", created.id);
        Ok(created)
    }

    async fn update_event(&self, event_id: &str, draft: &EventDraft) -> Result<(), ApiError> {
        tracing::info!("Updating event {}: {}", event_id, draft.title);

        let response = self
            .client
            .put(self.event_url(event_id))
            .bearer_auth(&self.access_token)
            .json(draft)
            .send()
            .await?;
        Self::check_status(response, event_id).await?;

        tracing::info!("Event {} updated", event_id);
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), ApiError> {
        tracing::info!("Deleting event {}", event_id);

        let response = self
            .client
            .delete(self.event_url(event_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Self::check_status(response, event_id).await?;

        Ok(())
    }

    async fn override_instance(
        &self,
        original_id: &str,
        date: NaiveDate,
        draft: &EventDraft,
    ) -> Result<(), ApiError> {
        tracing::info!("Overriding occurrence of {} on {}", original_id, date);

        let response = self
            .client
            .put(self.override_url(original_id))
            .bearer_auth(&self.access_token)
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .json(draft)
            .send()
            .await?;
        Self::check_status(response, original_id).await?;

        Ok(())
    }

    async fn delete_instance(&self, original_id: &str, date: NaiveDate) -> Result<(), ApiError> {
        tracing::info!("Deleting occurrence of {} on {}", original_id, date);

        let response = self
            .client
            .delete(self.override_url(original_id))
            .bearer_auth(&self.access_token)
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await?;
        Self::check_status(response, original_id).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn datetime(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").unwrap()
    }

    fn draft() -> EventDraft {
        EventDraft {
            title: "Standup".to_string(),
            start: datetime("2024-03-05T09:30"),
            end: datetime("2024-03-05T09:45"),
            description: String::new(),
            recurrence: Some("FREQ=DAILY;INTERVAL=1".to_string()),
        }
    }

    async fn client_for(server: &MockServer) -> HttpEventsClient {
        HttpEventsClient::new(server.uri(), "test-token".to_string())
    }

    #[tokio::test]
    async fn list_events_parses_instance_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/events"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": "abc_2024-03-05",
                    "title": "Standup",
                    "start": "2024-03-05T09:30:00",
                    "end": "2024-03-05T09:45:00",
                    "recurrence": "FREQ=DAILY;INTERVAL=1",
                    "isRecurringInstance": true,
                    "originalId": "abc"
                }
            ])))
            .mount(&server)
            .await;

        let events = client_for(&server).await.list_events(None).await.unwrap();

        assert_eq!(events.len(), 1);
        assert!(events[0].is_override_target());
        assert_eq!(events[0].original_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn list_events_passes_date_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/events"))
            .and(query_param("date", "2024-03-05"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let events = client_for(&server)
            .await
            .list_events(Some(date))
            .await
            .unwrap();

        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/events"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Unauthorized"})))
            .mount(&server)
            .await;

        let result = client_for(&server).await.list_events(None).await;

        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn create_event_sends_recurrence_and_returns_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/events"))
            .and(body_partial_json(json!({
                "title": "Standup",
                "recurrence": "FREQ=DAILY;INTERVAL=1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "new-id",
                "title": "Standup",
                "start": "2024-03-05T09:30:00",
                "end": "2024-03-05T09:45:00",
                "recurrence": "FREQ=DAILY;INTERVAL=1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = client_for(&server).await.create_event(&draft()).await.unwrap();

        assert_eq!(created.id, "new-id");
    }

    #[tokio::test]
    async fn delete_missing_event_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/events/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client_for(&server).await.delete_event("gone").await;

        assert!(matches!(result, Err(ApiError::NotFound(id)) if id == "gone"));
    }

    #[tokio::test]
    async fn override_instance_targets_override_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/events/abc/override"))
            .and(query_param("date", "2024-03-05"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Override saved"})))
            .expect(1)
            .mount(&server)
            .await;

        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        client_for(&server)
            .await
            .override_instance("abc", date, &draft())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_instance_targets_override_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/events/abc/override"))
            .and(query_param("date", "2024-03-05"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Instance marked as deleted"})))
            .expect(1)
            .mount(&server)
            .await;

        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        client_for(&server)
            .await
            .delete_instance("abc", date)
            .await
            .unwrap();
    }
}
