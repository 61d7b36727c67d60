//! Classification of the current calendar snapshot against its history.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::diff::EventChange;
use crate::event::{CalendarEvent, Moment};
use crate::history::HistorySnapshot;

/// Partitions of a snapshot comparison.
///
/// Only changes worth telling participants about survive classification:
/// updates are kept when the start moved, deletions when the event has not
/// ended yet. Every partition is ordered by event id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryDiff {
    pub created: Vec<EventChange>,
    pub updated: Vec<EventChange>,
    pub deleted: Vec<EventChange>,
}

impl HistoryDiff {
    pub fn compute(
        current: &HistorySnapshot,
        history: &HistorySnapshot,
        now: DateTime<Utc>,
        zone: Tz,
    ) -> Self {
        let mut diff = HistoryDiff::default();

        for (id, event) in current.iter() {
            match history.get(id) {
                None => diff.created.push(EventChange::created(event.clone())),
                Some(old) => {
                    if start_moved(old, event) {
                        diff.updated
                            .push(EventChange::updated(old.clone(), event.clone()));
                    }
                }
            }
        }

        for (id, old) in history.iter() {
            if current.contains(id) {
                continue;
            }
            if not_yet_ended(old, now, zone) {
                diff.deleted.push(EventChange::deleted(old.clone()));
            }
        }

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn created_ids(&self) -> Vec<&str> {
        self.created.iter().map(|c| c.event().id.as_str()).collect()
    }

    pub fn updated_ids(&self) -> Vec<&str> {
        self.updated.iter().map(|c| c.event().id.as_str()).collect()
    }

    pub fn deleted_ids(&self) -> Vec<&str> {
        self.deleted.iter().map(|c| c.event().id.as_str()).collect()
    }

    /// New payloads of the rescheduled events.
    pub fn updated_events(&self) -> Vec<CalendarEvent> {
        self.updated.iter().map(|c| c.event().clone()).collect()
    }

    /// Last known payloads of the cancelled events.
    pub fn deleted_events(&self) -> Vec<CalendarEvent> {
        self.deleted.iter().map(|c| c.event().clone()).collect()
    }

    pub fn changes(&self) -> impl Iterator<Item = &EventChange> {
        self.created
            .iter()
            .chain(self.updated.iter())
            .chain(self.deleted.iter())
    }
}

fn start_moved(old: &CalendarEvent, new: &CalendarEvent) -> bool {
    match (old.start_moment(), new.start_moment()) {
        (Ok(before), Ok(after)) => before != after,
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Skipping update check");
            false
        }
    }
}

fn not_yet_ended(event: &CalendarEvent, now: DateTime<Utc>, zone: Tz) -> bool {
    match event.end_moment() {
        Ok(Moment::Day(end)) => end >= now.with_timezone(&zone).date_naive(),
        Ok(Moment::Instant(end)) => end.with_timezone(&Utc) > now,
        Err(e) => {
            warn!(error = %e, "Skipping deletion check");
            false
        }
    }
}
