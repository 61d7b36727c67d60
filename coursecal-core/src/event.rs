//! Calendar event payloads as delivered by the calendar API.
//!
//! Only the fields the diff and the notifications look at are typed. Everything
//! else is carried in `extra` so that a history snapshot holds the full payload
//! and an event can be re-inserted into another calendar unchanged.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CourseCalError, CourseCalResult};
use crate::tag::Tag;

/// A single calendar event (one instance, recurring events are expanded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    /// Creation timestamp as sent by the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<FixedOffset>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Start or end of an event: either an all-day `date` or a `dateTime`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// A resolved point in time of an [`EventTime`].
///
/// Instants compare by the moment they denote, regardless of offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moment {
    Day(NaiveDate),
    Instant(DateTime<FixedOffset>),
}

impl Moment {
    pub fn date(&self) -> NaiveDate {
        match self {
            Moment::Day(d) => *d,
            Moment::Instant(dt) => dt.date_naive(),
        }
    }

    /// Wall-clock time in the payload's own offset, midnight for all-day events.
    pub fn naive_local(&self) -> NaiveDateTime {
        match self {
            Moment::Day(d) => d.and_time(chrono::NaiveTime::MIN),
            Moment::Instant(dt) => dt.naive_local(),
        }
    }
}

impl EventTime {
    pub fn timed(date_time: DateTime<FixedOffset>) -> Self {
        EventTime {
            date: None,
            date_time: Some(date_time),
            time_zone: None,
        }
    }

    pub fn all_day(date: NaiveDate) -> Self {
        EventTime {
            date: Some(date),
            date_time: None,
            time_zone: None,
        }
    }

    pub fn moment(&self) -> Option<Moment> {
        match (self.date_time, self.date) {
            (Some(dt), _) => Some(Moment::Instant(dt)),
            (None, Some(d)) => Some(Moment::Day(d)),
            (None, None) => None,
        }
    }

    /// "HH:MM" as shown in notifications.
    pub fn clock(&self) -> Option<String> {
        self.moment()
            .map(|m| m.naive_local().format("%H:%M").to_string())
    }

    /// "DD.MM.YYYY" as shown in notifications.
    pub fn day_label(&self) -> Option<String> {
        self.moment()
            .map(|m| m.naive_local().format("%d.%m.%Y").to_string())
    }
}

impl CalendarEvent {
    pub fn new(id: impl Into<String>, summary: impl Into<String>, start: EventTime, end: EventTime) -> Self {
        CalendarEvent {
            id: id.into(),
            summary: summary.into(),
            start,
            end,
            created: None,
            extra: Map::new(),
        }
    }

    pub fn tag(&self) -> Option<Tag> {
        Tag::from_title(&self.summary)
    }

    pub fn start_moment(&self) -> CourseCalResult<Moment> {
        self.start.moment().ok_or_else(|| CourseCalError::InvalidEvent {
            id: self.id.clone(),
            reason: "start has neither date nor dateTime".into(),
        })
    }

    pub fn end_moment(&self) -> CourseCalResult<Moment> {
        self.end.moment().ok_or_else(|| CourseCalError::InvalidEvent {
            id: self.id.clone(),
            reason: "end has neither date nor dateTime".into(),
        })
    }

    /// Key used to order events chronologically in a schedule.
    pub fn start_sort_key(&self) -> Option<NaiveDateTime> {
        self.start.moment().map(|m| m.naive_local())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> CalendarEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn keeps_unknown_fields_through_a_roundtrip() {
        let payload = json!({
            "id": "abc123",
            "summary": "[Salsa1] Montag",
            "status": "confirmed",
            "htmlLink": "https://calendar.google.com/event?eid=abc",
            "created": "2025-01-10T08:00:00.000Z",
            "start": { "dateTime": "2025-03-03T19:00:00+01:00", "timeZone": "Europe/Vienna" },
            "end": { "dateTime": "2025-03-03T20:30:00+01:00", "timeZone": "Europe/Vienna" }
        });

        let event = parse(payload);
        assert_eq!(event.extra.get("status"), Some(&json!("confirmed")));
        assert_eq!(
            event.created,
            Some(DateTime::parse_from_rfc3339("2025-01-10T08:00:00Z").unwrap())
        );

        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back["htmlLink"], json!("https://calendar.google.com/event?eid=abc"));
        assert_eq!(back["start"]["timeZone"], json!("Europe/Vienna"));
    }

    #[test]
    fn created_orders_by_instant_across_offsets() {
        let earlier = parse(json!({
            "id": "a",
            "created": "2025-01-10T09:30:00+01:00",
            "start": { "date": "2025-03-03" },
            "end": { "date": "2025-03-04" }
        }));
        let later = parse(json!({
            "id": "b",
            "created": "2025-01-10T08:45:00.000Z",
            "start": { "date": "2025-03-03" },
            "end": { "date": "2025-03-04" }
        }));

        assert!(later.created > earlier.created);
    }

    #[test]
    fn instants_in_different_offsets_are_equal() {
        let a = parse(json!({
            "id": "a",
            "start": { "dateTime": "2025-03-03T19:00:00+01:00" },
            "end": { "dateTime": "2025-03-03T20:00:00+01:00" }
        }));
        let b = parse(json!({
            "id": "a",
            "start": { "dateTime": "2025-03-03T18:00:00Z" },
            "end": { "dateTime": "2025-03-03T19:00:00Z" }
        }));

        assert_eq!(a.start_moment().unwrap(), b.start_moment().unwrap());
    }

    #[test]
    fn all_day_events_render_midnight() {
        let event = parse(json!({
            "id": "d",
            "summary": "Workshop",
            "start": { "date": "2025-04-12" },
            "end": { "date": "2025-04-13" }
        }));

        assert_eq!(event.start.clock().as_deref(), Some("00:00"));
        assert_eq!(event.start.day_label().as_deref(), Some("12.04.2025"));
    }

    #[test]
    fn clock_uses_the_payload_offset() {
        let event = parse(json!({
            "id": "t",
            "start": { "dateTime": "2025-03-03T19:15:00+01:00" },
            "end": { "dateTime": "2025-03-03T20:45:00+01:00" }
        }));

        assert_eq!(event.start.clock().as_deref(), Some("19:15"));
        assert_eq!(event.end.clock().as_deref(), Some("20:45"));
    }

    #[test]
    fn missing_start_is_an_invalid_event() {
        let event = CalendarEvent::new("x", "broken", EventTime::default(), EventTime::default());
        assert!(matches!(
            event.start_moment(),
            Err(CourseCalError::InvalidEvent { .. })
        ));
    }
}
