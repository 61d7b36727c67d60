//! Seams to the managed services coursecal talks to.
//!
//! The Google implementations live in `coursecal-google`. Everything in this
//! crate only sees these traits, so orchestration can run against fakes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::date_range::DateRange;
use crate::error::CourseCalResult;
use crate::event::CalendarEvent;
use crate::mail::OutgoingEmail;

#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Single instances in `range`, in API order.
    async fn list_events(&self, calendar_id: &str, range: &DateRange) -> CourseCalResult<Vec<CalendarEvent>>;

    async fn insert_event(&self, calendar_id: &str, event: &CalendarEvent) -> CourseCalResult<CalendarEvent>;

    async fn update_event(&self, calendar_id: &str, event: &CalendarEvent) -> CourseCalResult<CalendarEvent>;

    /// Deleting an event that is already gone succeeds.
    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> CourseCalResult<()>;

    /// Returns the id of the new calendar.
    async fn create_calendar(&self, summary: &str, time_zone: &str) -> CourseCalResult<String>;

    async fn watch_events(&self, calendar_id: &str, request: &WatchRequest) -> CourseCalResult<WatchChannel>;

    async fn stop_channel(&self, channel: &WatchChannel) -> CourseCalResult<()>;
}

#[async_trait]
pub trait SheetService: Send + Sync {
    /// Cell values of `range` (A1 notation), row by row.
    async fn values(&self, range: &str) -> CourseCalResult<Vec<Vec<String>>>;

    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> CourseCalResult<()>;

    async fn sheet_titles(&self) -> CourseCalResult<Vec<String>>;
}

#[async_trait]
pub trait MailService: Send + Sync {
    /// Returns the id of the sent message.
    async fn send(&self, email: &OutgoingEmail) -> CourseCalResult<String>;

    /// First message recorded in the mailbox history after `history_id`.
    async fn message_after(&self, history_id: &str) -> CourseCalResult<Option<MailMessage>>;

    async fn watch(&self, label_ids: &[String], topic: &str) -> CourseCalResult<MailboxWatch>;

    async fn stop(&self) -> CourseCalResult<()>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `None` when the object does not exist.
    async fn get(&self, bucket: &str, name: &str) -> CourseCalResult<Option<Vec<u8>>>;

    /// Creates or fully overwrites the object.
    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>, content_type: &str) -> CourseCalResult<()>;
}

/// The full set of service handles.
#[derive(Clone)]
pub struct Services {
    pub calendar: Arc<dyn CalendarService>,
    pub sheets: Arc<dyn SheetService>,
    pub mail: Arc<dyn MailService>,
    pub blobs: Arc<dyn BlobStore>,
}

/// Body of a calendar `events.watch` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    pub params: WatchParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchParams {
    pub ttl: String,
}

/// A notification channel as returned by `events.watch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchChannel {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WatchChannel {
    /// A usable channel carries both ids needed to stop it later.
    pub fn is_active(&self) -> bool {
        self.id.is_some() && self.resource_id.is_some()
    }
}

/// Response of a mailbox `users.watch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxWatch {
    #[serde(default)]
    pub history_id: Option<String>,
    #[serde(default)]
    pub expiration: Option<String>,
}

/// An inbound message reduced to what registration handling needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MailMessage {
    pub id: String,
    pub headers: Vec<(String, String)>,
    pub snippet: String,
    /// Decoded text/plain body, when the message has one
    pub text_body: Option<String>,
}

impl MailMessage {
    /// Header lookup ignoring the case of the header name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> &str {
        self.text_body.as_deref().unwrap_or(&self.snippet)
    }
}
