//! In-memory service fakes for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::date_range::DateRange;
use crate::error::{CourseCalError, CourseCalResult};
use crate::event::{CalendarEvent, Moment};
use crate::mail::OutgoingEmail;
use crate::services::{
    BlobStore, CalendarService, MailMessage, MailService, MailboxWatch, Services, SheetService,
    WatchChannel, WatchRequest,
};

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn insert(&self, bucket: &str, name: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), name.to_string()), bytes);
    }

    pub fn read(&self, bucket: &str, name: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
    }

    pub fn read_json(&self, bucket: &str, name: &str) -> Option<serde_json::Value> {
        self.read(bucket, name)
            .map(|b| serde_json::from_slice(&b).unwrap())
    }

    pub fn contains(&self, bucket: &str, name: &str) -> bool {
        self.read(bucket, name).is_some()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, bucket: &str, name: &str) -> CourseCalResult<Option<Vec<u8>>> {
        Ok(self.read(bucket, name))
    }

    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>, _content_type: &str) -> CourseCalResult<()> {
        self.insert(bucket, name, bytes);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCalendar {
    events: Mutex<HashMap<String, Vec<CalendarEvent>>>,
    inserted: Mutex<Vec<(String, CalendarEvent)>>,
    updated: Mutex<Vec<(String, CalendarEvent)>>,
    deleted: Mutex<Vec<(String, String)>>,
    calendars: Mutex<Vec<(String, String)>>,
    watch_responses: Mutex<VecDeque<WatchChannel>>,
    watch_requests: Mutex<Vec<(String, WatchRequest)>>,
    stopped: Mutex<Vec<WatchChannel>>,
    fail_stop: AtomicBool,
}

impl FakeCalendar {
    pub fn set_events(&self, calendar_id: &str, events: Vec<CalendarEvent>) {
        self.events
            .lock()
            .unwrap()
            .insert(calendar_id.to_string(), events);
    }

    pub fn inserted(&self) -> Vec<(String, CalendarEvent)> {
        self.inserted.lock().unwrap().clone()
    }

    pub fn updated(&self) -> Vec<(String, CalendarEvent)> {
        self.updated.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn created_calendars(&self) -> Vec<(String, String)> {
        self.calendars.lock().unwrap().clone()
    }

    /// Queue a response for the next watch request. Without one, watches
    /// succeed with a channel echoing the request id.
    pub fn push_watch_response(&self, channel: WatchChannel) {
        self.watch_responses.lock().unwrap().push_back(channel);
    }

    pub fn watch_requests(&self) -> Vec<(String, WatchRequest)> {
        self.watch_requests.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> Vec<WatchChannel> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn fail_stops(&self) {
        self.fail_stop.store(true, Ordering::SeqCst);
    }
}

fn in_range(event: &CalendarEvent, range: &DateRange) -> bool {
    match event.start.moment() {
        Some(Moment::Instant(t)) => {
            let t = t.with_timezone(&chrono::Utc);
            range.from <= t && t < range.to
        }
        Some(Moment::Day(d)) => range.from.date_naive() <= d && d <= range.to.date_naive(),
        None => false,
    }
}

#[async_trait]
impl CalendarService for FakeCalendar {
    async fn list_events(&self, calendar_id: &str, range: &DateRange) -> CourseCalResult<Vec<CalendarEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .get(calendar_id)
            .map(|events| events.iter().filter(|e| in_range(e, range)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_event(&self, calendar_id: &str, event: &CalendarEvent) -> CourseCalResult<CalendarEvent> {
        self.inserted
            .lock()
            .unwrap()
            .push((calendar_id.to_string(), event.clone()));
        Ok(event.clone())
    }

    async fn update_event(&self, calendar_id: &str, event: &CalendarEvent) -> CourseCalResult<CalendarEvent> {
        self.updated
            .lock()
            .unwrap()
            .push((calendar_id.to_string(), event.clone()));
        Ok(event.clone())
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> CourseCalResult<()> {
        self.deleted
            .lock()
            .unwrap()
            .push((calendar_id.to_string(), event_id.to_string()));
        Ok(())
    }

    async fn create_calendar(&self, summary: &str, time_zone: &str) -> CourseCalResult<String> {
        let mut calendars = self.calendars.lock().unwrap();
        calendars.push((summary.to_string(), time_zone.to_string()));
        Ok(format!("cal-{}@group.calendar.google.com", calendars.len()))
    }

    async fn watch_events(&self, calendar_id: &str, request: &WatchRequest) -> CourseCalResult<WatchChannel> {
        self.watch_requests
            .lock()
            .unwrap()
            .push((calendar_id.to_string(), request.clone()));

        if let Some(queued) = self.watch_responses.lock().unwrap().pop_front() {
            return Ok(queued);
        }

        Ok(WatchChannel {
            id: Some(request.id.clone()),
            resource_id: Some(format!("res-{}", request.id)),
            extra: Default::default(),
        })
    }

    async fn stop_channel(&self, channel: &WatchChannel) -> CourseCalResult<()> {
        self.stopped.lock().unwrap().push(channel.clone());
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(CourseCalError::Api {
                service: "calendar",
                status: Some(404),
                message: "Channel not found".into(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSheets {
    values: Mutex<HashMap<String, Vec<Vec<String>>>>,
    titles: Mutex<Vec<String>>,
    appended: Mutex<Vec<(String, Vec<Vec<String>>)>>,
}

impl FakeSheets {
    pub fn set_values(&self, range: &str, rows: Vec<Vec<&str>>) {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(String::from).collect())
            .collect();
        self.values.lock().unwrap().insert(range.to_string(), rows);
    }

    pub fn set_titles(&self, titles: &[&str]) {
        *self.titles.lock().unwrap() = titles.iter().map(|t| t.to_string()).collect();
    }

    pub fn appended(&self) -> Vec<(String, Vec<Vec<String>>)> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl SheetService for FakeSheets {
    async fn values(&self, range: &str) -> CourseCalResult<Vec<Vec<String>>> {
        Ok(self
            .values
            .lock()
            .unwrap()
            .get(range)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> CourseCalResult<()> {
        self.appended
            .lock()
            .unwrap()
            .push((range.to_string(), rows));
        Ok(())
    }

    async fn sheet_titles(&self) -> CourseCalResult<Vec<String>> {
        Ok(self.titles.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeMail {
    sent: Mutex<Vec<OutgoingEmail>>,
    inbox: Mutex<HashMap<String, MailMessage>>,
    watch_responses: Mutex<VecDeque<MailboxWatch>>,
    watch_calls: Mutex<Vec<(Vec<String>, String)>>,
    stops: AtomicUsize,
    rejected_recipient: Mutex<Option<String>>,
}

impl FakeMail {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// The message returned for history ids after `history_id`.
    pub fn deliver(&self, history_id: &str, message: MailMessage) {
        self.inbox
            .lock()
            .unwrap()
            .insert(history_id.to_string(), message);
    }

    pub fn push_watch_response(&self, watch: MailboxWatch) {
        self.watch_responses.lock().unwrap().push_back(watch);
    }

    pub fn watch_calls(&self) -> Vec<(Vec<String>, String)> {
        self.watch_calls.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Make sends to `recipient` fail.
    pub fn reject(&self, recipient: &str) {
        *self.rejected_recipient.lock().unwrap() = Some(recipient.to_string());
    }
}

#[async_trait]
impl MailService for FakeMail {
    async fn send(&self, email: &OutgoingEmail) -> CourseCalResult<String> {
        if let Some(rejected) = self.rejected_recipient.lock().unwrap().as_ref() {
            if email.to.contains(rejected) {
                return Err(CourseCalError::Api {
                    service: "gmail",
                    status: Some(400),
                    message: format!("Invalid To header: {}", rejected),
                });
            }
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(format!("msg-{}", sent.len()))
    }

    async fn message_after(&self, history_id: &str) -> CourseCalResult<Option<MailMessage>> {
        Ok(self.inbox.lock().unwrap().get(history_id).cloned())
    }

    async fn watch(&self, label_ids: &[String], topic: &str) -> CourseCalResult<MailboxWatch> {
        self.watch_calls
            .lock()
            .unwrap()
            .push((label_ids.to_vec(), topic.to_string()));

        Ok(self
            .watch_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MailboxWatch {
                history_id: Some("1000".into()),
                expiration: Some("1700000000000".into()),
            }))
    }

    async fn stop(&self) -> CourseCalResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// All fakes wired into one [`Services`] bundle.
#[derive(Default, Clone)]
pub struct Fakes {
    pub calendar: Arc<FakeCalendar>,
    pub sheets: Arc<FakeSheets>,
    pub mail: Arc<FakeMail>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl Fakes {
    pub fn services(&self) -> Services {
        Services {
            calendar: self.calendar.clone(),
            sheets: self.sheets.clone(),
            mail: self.mail.clone(),
            blobs: self.blobs.clone(),
        }
    }
}
