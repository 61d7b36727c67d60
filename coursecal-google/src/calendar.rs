//! Calendar API v3.

use async_trait::async_trait;
use coursecal_core::date_range::DateRange;
use coursecal_core::services::{CalendarService, WatchChannel, WatchRequest};
use coursecal_core::{CalendarEvent, CourseCalResult};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::client::{GoogleClient, endpoint};

const SERVICE: &str = "calendar";

pub struct GoogleCalendar {
    client: GoogleClient,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<Value>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct CreatedCalendar {
    id: String,
}

impl GoogleCalendar {
    pub fn new(client: GoogleClient, base_url: impl Into<String>) -> Self {
        GoogleCalendar {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CalendarService for GoogleCalendar {
    #[instrument(skip(self, range), fields(from = %range.from, to = %range.to))]
    async fn list_events(&self, calendar_id: &str, range: &DateRange) -> CourseCalResult<Vec<CalendarEvent>> {
        let url = endpoint(&self.base_url, &["calendars", calendar_id, "events"])?;
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.http().get(url.clone()).query(&[
                ("timeMin", range.from_rfc3339()),
                ("timeMax", range.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "updated".to_string()),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: EventsPage = self.client.json(SERVICE, request).await?;

            for item in page.items {
                match serde_json::from_value::<CalendarEvent>(item) {
                    Ok(event) => events.push(event),
                    Err(e) => warn!(error = %e, "Skipping unreadable event"),
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = events.len(), "Listed events");
        Ok(events)
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn insert_event(&self, calendar_id: &str, event: &CalendarEvent) -> CourseCalResult<CalendarEvent> {
        let url = endpoint(&self.base_url, &["calendars", calendar_id, "events"])?;
        let request = self.client.http().post(url).json(event);
        Ok(self.client.json(SERVICE, request).await?)
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn update_event(&self, calendar_id: &str, event: &CalendarEvent) -> CourseCalResult<CalendarEvent> {
        let url = endpoint(&self.base_url, &["calendars", calendar_id, "events", event.id.as_str()])?;
        let request = self.client.http().put(url).json(event);
        Ok(self.client.json(SERVICE, request).await?)
    }

    #[instrument(skip(self))]
    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> CourseCalResult<()> {
        let url = endpoint(&self.base_url, &["calendars", calendar_id, "events", event_id])?;
        let request = self.client.http().delete(url);

        // Already deleted (410) or never there (404)
        let response = self
            .client
            .execute(SERVICE, request, &[StatusCode::NOT_FOUND, StatusCode::GONE])
            .await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "Event already gone");
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_calendar(&self, summary: &str, time_zone: &str) -> CourseCalResult<String> {
        let url = endpoint(&self.base_url, &["calendars"])?;
        let request = self
            .client
            .http()
            .post(url)
            .json(&json!({ "summary": summary, "timeZone": time_zone }));

        let created: CreatedCalendar = self.client.json(SERVICE, request).await?;
        Ok(created.id)
    }

    #[instrument(skip(self, request), fields(channel_id = %request.id))]
    async fn watch_events(&self, calendar_id: &str, request: &WatchRequest) -> CourseCalResult<WatchChannel> {
        let url = endpoint(&self.base_url, &["calendars", calendar_id, "events", "watch"])?;
        let http_request = self.client.http().post(url).json(request);
        Ok(self.client.json(SERVICE, http_request).await?)
    }

    #[instrument(skip(self, channel), fields(channel_id = ?channel.id))]
    async fn stop_channel(&self, channel: &WatchChannel) -> CourseCalResult<()> {
        let url = endpoint(&self.base_url, &["channels", "stop"])?;
        let request = self
            .client
            .http()
            .post(url)
            .json(&json!({ "id": channel.id, "resourceId": channel.resource_id }));

        self.client.execute(SERVICE, request, &[]).await?;
        Ok(())
    }
}
