use chrono::NaiveDate;
use thiserror::Error;

use crate::calendar::Event;
use crate::remote::events_api::{ApiError, EventDraft, EventsApi, HttpEventsClient};
use crate::remote::identity::{IdentityClient, IdentityError};
use crate::storage::config::Config;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Authentication error: {0}")]
    Auth(#[from] IdentityError),
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

/// Front door for event operations: resolves a bearer token per call and
/// routes saves/deletes to the right endpoint depending on whether the
/// target is a template event or a single expanded occurrence.
pub struct Scheduler {
    config: Config,
    auth: IdentityClient,
}

impl Scheduler {
    pub fn new(config: Config) -> Self {
        let auth = IdentityClient::new(config.clone());
        Self { config, auth }
    }

    async fn client(&mut self) -> Result<HttpEventsClient, SchedulerError> {
        let token = self.auth.get_valid_token().await?;
        Ok(HttpEventsClient::new(
            self.config.api.base_url.clone(),
            token.id_token,
        ))
    }

    pub async fn list_events(
        &mut self,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Event>, SchedulerError> {
        let client = self.client().await?;
        Ok(client.list_events(date).await?)
    }

    pub async fn create_event(&mut self, draft: &EventDraft) -> Result<Event, SchedulerError> {
        let client = self.client().await?;
        Ok(client.create_event(draft).await?)
    }

    /// Saves changes to an existing record. A recurring instance goes to
    /// the override endpoint for its date; anything else updates the
    /// event itself. The draft's recurrence string replaces the stored
    /// one wholesale.
    pub async fn save_event(
        &mut self,
        event: &Event,
        draft: &EventDraft,
    ) -> Result<(), SchedulerError> {
        let client = self.client().await?;

        if let Some(original_id) = instance_target(event) {
            client
                .override_instance(original_id, event.start_date(), draft)
                .await?;
        } else {
            client.update_event(&event.id, draft).await?;
        }

        Ok(())
    }

    /// Deletes a record, with the same instance-vs-template routing as
    /// `save_event`. Deleting an instance only tombstones that one date.
    pub async fn delete_event(&mut self, event: &Event) -> Result<(), SchedulerError> {
        let client = self.client().await?;

        if let Some(original_id) = instance_target(event) {
            client
                .delete_instance(original_id, event.start_date())
                .await?;
        } else {
            client.delete_event(&event.id).await?;
        }

        Ok(())
    }
}

fn instance_target(event: &Event) -> Option<&str> {
    if event.is_recurring_instance {
        event.original_id.as_deref()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::identity::{TokenInfo, TokenStorage};
    use chrono::NaiveDateTime;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn datetime(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").unwrap()
    }

    fn scheduler_for(server: &MockServer, temp_dir: &TempDir) -> Scheduler {
        let token_path = temp_dir.path().join("token.json");
        TokenStorage::new(token_path.clone())
            .save_token(&TokenInfo::new("test-token".to_string(), 3600))
            .unwrap();

        let mut config = Config::default();
        config.api.base_url = server.uri();
        config.identity.token_cache = token_path;

        Scheduler::new(config)
    }

    fn event(id: &str, is_instance: bool, original_id: Option<&str>) -> Event {
        Event {
            id: id.to_string(),
            title: "Standup".to_string(),
            description: String::new(),
            start: datetime("2024-03-05T09:30"),
            end: datetime("2024-03-05T09:45"),
            recurrence: None,
            is_recurring_instance: is_instance,
            original_id: original_id.map(str::to_string),
        }
    }

    fn draft_for(event: &Event) -> EventDraft {
        EventDraft::from_event(event)
    }

    #[tokio::test]
    async fn save_routes_plain_event_to_update_endpoint() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        Mock::given(method("PUT"))
            .and(path("/api/events/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Event updated"})))
            .expect(1)
            .mount(&server)
            .await;

        let target = event("plain", false, None);
        scheduler_for(&server, &temp_dir)
            .save_event(&target, &draft_for(&target))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn save_routes_recurring_instance_to_override_endpoint() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        Mock::given(method("PUT"))
            .and(path("/api/events/template/override"))
            .and(query_param("date", "2024-03-05"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Override saved"})))
            .expect(1)
            .mount(&server)
            .await;

        let target = event("template_2024-03-05", true, Some("template"));
        scheduler_for(&server, &temp_dir)
            .save_event(&target, &draft_for(&target))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_routes_recurring_instance_to_override_endpoint() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        Mock::given(method("DELETE"))
            .and(path("/api/events/template/override"))
            .and(query_param("date", "2024-03-05"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Instance marked as deleted"})))
            .expect(1)
            .mount(&server)
            .await;

        let target = event("template_2024-03-05", true, Some("template"));
        scheduler_for(&server, &temp_dir)
            .delete_event(&target)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn instance_without_back_reference_falls_back_to_event_endpoint() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        Mock::given(method("DELETE"))
            .and(path("/api/events/odd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Event deleted"})))
            .expect(1)
            .mount(&server)
            .await;

        let target = event("odd", true, None);
        scheduler_for(&server, &temp_dir)
            .delete_event(&target)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_token_surfaces_auth_error() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();

        let mut config = Config::default();
        config.api.base_url = server.uri();
        config.identity.token_cache = temp_dir.path().join("missing.json");

        let result = Scheduler::new(config).list_events(None).await;

        assert!(matches!(result, Err(SchedulerError::Auth(_))));
    }
}
