//! An event target that writes to a Google Calendar
//!
//! Managed events carry their external key as a private extended property (see [`MANAGED_KEY_PROPERTY`](crate::config::MANAGED_KEY_PROPERTY)),
//! which is only visible to the application that set it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use url::Url;

use crate::config;
use crate::error::SyncError;
use crate::event::{MappedEvent, TargetEvent};
use crate::traits::EventTarget;

pub mod wire;
use wire::{EventList, GoogleEvent};

static CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
/// The largest page `events.list` returns
const MAX_RESULTS: u32 = 2500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);


/// A calendar of a Google account, accessed with an OAuth access token
pub struct GoogleCalendarTarget {
    http: reqwest::Client,
    base_url: Url,
    access_token: String,
    calendar_id: String,
    key_property: String,
}

impl GoogleCalendarTarget {
    /// Create a target. This does not start a connection, see [`EventTarget::connect`]
    pub fn new<T: ToString, C: ToString>(access_token: T, calendar_id: C) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| SyncError::target_unavailable(format!("Unable to build an HTTP client: {}", err)))?;
        let base_url = Url::parse(CALENDAR_API_BASE)
            .map_err(|err| SyncError::config(format!("Invalid Calendar API URL: {}", err)))?;

        Ok(Self {
            http,
            base_url,
            access_token: access_token.to_string(),
            calendar_id: calendar_id.to_string(),
            key_property: config::current(&config::MANAGED_KEY_PROPERTY),
        })
    }

    /// Send the requests to another server (e.g. a local mock of the API)
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    /// The URL of `calendars/{calendar_id}/{segments...}`
    fn calendar_url(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::config(format!("{} cannot be used as a base URL", self.base_url)))?
            .pop_if_empty()
            .push("calendars")
            .push(&self.calendar_id)
            .extend(segments);
        Ok(url)
    }

    fn event_url(&self, event_id: &str) -> Result<Url, SyncError> {
        self.calendar_url(&["events", event_id])
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Response, SyncError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|err| SyncError::target_unavailable(format!("Unable to {}: {}", what, err)))?;
        check_status(response, what).await
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SyncError::target_unavailable(format!("Unable to {}: Google refused the access token (HTTP {})", what, status)));
    }
    let text = response.text().await.unwrap_or_default();
    Err(SyncError::target_unavailable(format!("Unable to {}: unexpected HTTP status code {}: {}", what, status, text)))
}

fn is_gone(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

#[async_trait]
impl EventTarget for GoogleCalendarTarget {
    async fn connect(&mut self) -> Result<(), SyncError> {
        let url = self.calendar_url(&[])?;
        self.send(self.http.get(url), &format!("open calendar {}", self.calendar_id)).await?;
        log::debug!("Connected to calendar {}", self.calendar_id);
        Ok(())
    }

    async fn list_managed_events(&mut self) -> Result<Vec<TargetEvent>, SyncError> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        let mut n_listed = 0;

        loop {
            let mut url = self.calendar_url(&["events"])?;
            url.query_pairs_mut()
                .append_pair("maxResults", &MAX_RESULTS.to_string())
                .append_pair("showDeleted", "false");
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            let page: EventList = self.send(self.http.get(url), "list calendar events").await?
                .json()
                .await
                .map_err(|err| SyncError::target_unavailable(format!("Invalid event list from Google: {}", err)))?;

            n_listed += page.items.len();
            for item in page.items {
                if item.is_cancelled() {
                    continue;
                }
                if let Some(event) = item.into_target_event(&self.key_property) {
                    if event.is_managed() {
                        events.push(event);
                    }
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        log::debug!("{} of the {} events of calendar {} are managed", events.len(), n_listed, self.calendar_id);
        Ok(events)
    }

    async fn create_event(&mut self, event: &MappedEvent) -> Result<TargetEvent, SyncError> {
        let url = self.calendar_url(&["events"])?;
        let body = GoogleEvent::from_mapped(event, &self.key_property);
        let what = format!("create an event for {}", event.external_key());

        let created: GoogleEvent = self.send(self.http.post(url).json(&body), &what).await?
            .json()
            .await
            .map_err(|err| SyncError::target_unavailable(format!("Invalid reply from Google: {}", err)))?;

        created.into_target_event(&self.key_property)
            .ok_or_else(|| SyncError::target_unavailable("Google created an event but returned no id"))
    }

    async fn update_event(&mut self, id: &str, event: &MappedEvent) -> Result<(), SyncError> {
        let url = self.event_url(id)?;
        let body = wire::patch_body(event);
        self.send(self.http.patch(url).json(&body), &format!("update event {}", id)).await?;
        Ok(())
    }

    async fn delete_event(&mut self, id: &str) -> Result<(), SyncError> {
        let url = self.event_url(id)?;
        let response = self.http
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|err| SyncError::target_unavailable(format!("Unable to delete event {}: {}", id, err)))?;

        if is_gone(response.status()) {
            log::debug!("Event {} was already deleted", id);
            return Ok(());
        }
        check_status(response, &format!("delete event {}", id)).await?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_urls() {
        let target = GoogleCalendarTarget::new("token", "team@group.calendar.google.com").unwrap();
        assert_eq!(
            target.calendar_url(&[]).unwrap().as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team@group.calendar.google.com"
        );
        assert_eq!(
            target.event_url("abc123").unwrap().as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team@group.calendar.google.com/events/abc123"
        );

        let target = GoogleCalendarTarget::new("token", "a/b").unwrap()
            .with_base_url(Url::parse("http://localhost:9000/").unwrap());
        assert_eq!(target.calendar_url(&["events"]).unwrap().as_str(), "http://localhost:9000/calendars/a%2Fb/events");
    }

    #[test]
    fn test_gone_statuses() {
        assert!(is_gone(StatusCode::NOT_FOUND));
        assert!(is_gone(StatusCode::GONE));
        assert!(is_gone(StatusCode::FORBIDDEN) == false);
    }
}
