//! Google Calendar v3 gateway implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{CalendarGateway, EventDraft, EventPatch, GatewayError, RemoteEvent};
use crate::session::SessionContext;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
const MAX_RESULTS: &str = "2500";

#[derive(Deserialize)]
struct EventsListResponse {
    #[serde(default)]
    items: Vec<RemoteEvent>,
}

/// Gateway backed by the Google Calendar v3 REST API. Performs the network
/// call and classifies the outcome; nothing else.
pub struct GoogleCalendarGateway {
    client: Client,
    base_url: String,
    calendar_id: String,
    session: SessionContext,
}

impl GoogleCalendarGateway {
    pub fn new(calendar_id: String, session: SessionContext) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), calendar_id, session)
    }

    /// Point the gateway at a different endpoint, e.g. a local test server.
    pub fn with_base_url(base_url: String, calendar_id: String, session: SessionContext) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            calendar_id,
            session,
        }
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/{}/events", self.base_url, self.calendar_id)
    }

    fn event_url(&self, id: &str) -> String {
        format!("{}/{}", self.events_url(), id)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, GatewayError> {
        let token = self
            .session
            .current_token()
            .ok_or(GatewayError::AuthExpired)?;
        Ok(request.bearer_auth(token))
    }

    async fn check(&self, response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

/// Classify an HTTP outcome into the gateway error taxonomy. This is the only
/// place classification happens.
fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return GatewayError::AuthExpired;
    }
    let detail = format!("HTTP {}: {}", status, truncate(body));
    if status.is_server_error() {
        GatewayError::Transient(detail)
    } else {
        GatewayError::Rejected(detail)
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    GatewayError::Transient(err.to_string())
}

fn truncate(body: &str) -> String {
    let mut out = body.trim().replace(['\n', '\r'], " ");
    if out.len() > 200 {
        out.truncate(200);
        out.push_str("...");
    }
    out
}

#[async_trait]
impl CalendarGateway for GoogleCalendarGateway {
    async fn list(&self, since: DateTime<Utc>) -> Result<Vec<RemoteEvent>, GatewayError> {
        let request = self.authorize(self.client.get(self.events_url()))?.query(&[
            ("timeMin", since.to_rfc3339().as_str()),
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
            ("showDeleted", "false"),
            ("maxResults", MAX_RESULTS),
        ]);
        let response = request.send().await.map_err(transport_error)?;
        let body: EventsListResponse = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(transport_error)?;
        debug!("listed {} remote events", body.items.len());
        Ok(body.items)
    }

    async fn create(&self, draft: &EventDraft) -> Result<RemoteEvent, GatewayError> {
        let request = self.authorize(self.client.post(self.events_url()))?.json(draft);
        let response = request.send().await.map_err(transport_error)?;
        self.check(response)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }

    async fn update(&self, id: &str, patch: &EventPatch) -> Result<(), GatewayError> {
        let request = self.authorize(self.client.patch(self.event_url(id)))?.json(patch);
        let response = request.send().await.map_err(transport_error)?;
        self.check(response).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        let request = self.authorize(self.client.delete(self.event_url(id)))?;
        let response = request.send().await.map_err(transport_error)?;
        self.check(response).await?;
        Ok(())
    }
}
