//! Compare-and-notify runs triggered by calendar pushes and schedule requests.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::date_range::{DateRange, DayRange};
use crate::diff::{ChangeKind, HistoryDiff};
use crate::error::CourseCalResult;
use crate::event::CalendarEvent;
use crate::history::{HistorySnapshot, HistoryStore};
use crate::mapping::CalendarMapping;
use crate::notifier::Notifier;
use crate::schedule::group_by_tag;
use crate::services::Services;
use crate::tag::{HistoryScope, Tag, TagKey};
use crate::templates::NoticeKind;

/// Outcome of one compare-and-notify run for one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub scope: String,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// History entries dropped because the events are long past
    pub pruned: usize,
    /// Changes written to the tag calendar
    pub mirrored: usize,
    pub notices: usize,
}

impl SyncReport {
    pub fn has_changes(&self) -> bool {
        self.created > 0 || self.updated > 0 || self.deleted > 0
    }
}

pub struct CalendarSync {
    services: Services,
    config: AppConfig,
    zone: Tz,
    history: HistoryStore,
    notifier: Notifier,
}

impl CalendarSync {
    pub fn new(services: Services, config: AppConfig) -> CourseCalResult<Self> {
        let zone = config.calendar.zone()?;
        let history = HistoryStore::new(services.blobs.clone(), &config.storage.bucket);
        let notifier = Notifier::new(&services, &config);

        Ok(CalendarSync {
            services,
            config,
            zone,
            history,
            notifier,
        })
    }

    /// Diff the admin calendar against history and tell participants.
    ///
    /// Runs once for the whole calendar, or once per tag when `per_tag` is
    /// set. Per tag, every tag seen now or known from the calendar mapping is
    /// compared, so a tag whose events all disappeared still reports them.
    pub async fn handle_calendar_change(&self, now: DateTime<Utc>) -> CourseCalResult<Vec<SyncReport>> {
        let events = self.fetch_upcoming(now).await?;
        info!(events = events.len(), per_tag = self.config.calendar.per_tag, "Calendar changed");

        if !self.config.calendar.per_tag {
            let admin = self.config.calendar.admin_calendar_id.clone();
            let report = self
                .compare_and_notify(events, &HistoryScope::Admin, Some(&admin), now)
                .await?;
            return Ok(vec![report]);
        }

        let mut per_tag: BTreeMap<Tag, Vec<CalendarEvent>> = BTreeMap::new();
        for (key, group) in group_by_tag(events) {
            match key {
                TagKey::Tagged(tag) => {
                    per_tag.insert(tag, group);
                }
                TagKey::Untagged => {
                    let ids: Vec<&str> = group.iter().map(|e| e.id.as_str()).collect();
                    warn!(?ids, "Skipping events without a tag");
                }
            }
        }

        let mut mapping =
            CalendarMapping::load(self.services.blobs.clone(), &self.config.storage.bucket).await?;
        let sheet_titles = self.services.sheets.sheet_titles().await?;

        let tags: BTreeSet<Tag> = per_tag.keys().cloned().chain(mapping.tags()).collect();
        let mut reports = Vec::with_capacity(tags.len());

        for tag in tags {
            let calendar_id = mapping
                .ensure_calendar(
                    &tag,
                    &sheet_titles,
                    self.services.calendar.as_ref(),
                    &self.config.calendar.time_zone,
                )
                .await?;
            let current = per_tag.remove(&tag).unwrap_or_default();

            let report = self
                .compare_and_notify(current, &HistoryScope::Tag(tag), calendar_id.as_deref(), now)
                .await?;
            reports.push(report);
        }

        Ok(reports)
    }

    /// Compare `current` with the stored history of `scope`, save the new
    /// history, mirror changes into the tag calendar and send notices.
    ///
    /// `calendar_id` is the scope's own calendar: the admin calendar for
    /// [`HistoryScope::Admin`], the tag calendar (if any) otherwise.
    pub async fn compare_and_notify(
        &self,
        current: Vec<CalendarEvent>,
        scope: &HistoryScope,
        calendar_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> CourseCalResult<SyncReport> {
        let history = self.history.load(scope).await?;
        let snapshot = HistorySnapshot::from_events(current);
        let diff = HistoryDiff::compute(&snapshot, &history, now, self.zone);

        if matches!(scope, HistoryScope::Admin) {
            info!(created = ?diff.created_ids(), "Created");
            info!(updated = ?diff.updated_ids(), "To notify updated");
            info!(deleted = ?diff.deleted_ids(), "Deleted");
        } else {
            for change in diff.changes() {
                debug!(%scope, %change, "Change");
            }
        }

        let mut report = SyncReport {
            scope: scope.to_string(),
            created: diff.created.len(),
            updated: diff.updated.len(),
            deleted: diff.deleted.len(),
            ..Default::default()
        };

        let mut retained = snapshot.clone();
        if !retained.is_empty() {
            if let Some(calendar_id) = calendar_id {
                let retired = self.retired_ids(calendar_id, now).await?;
                report.pruned = retained.prune(&retired);
            }
        }
        self.history.save(scope, &retained).await?;

        if let (HistoryScope::Tag(_), Some(calendar_id)) = (scope, calendar_id) {
            report.mirrored = self.mirror(calendar_id, &diff).await;
        }

        let only_tag = scope.tag();
        let notify = &self.config.notify;

        if notify.send_created && !diff.created.is_empty() {
            report.notices += self
                .notifier
                .notify(snapshot.into_events(), NoticeKind::Schedule, only_tag)
                .await;
        }
        if notify.send_updated && !diff.updated.is_empty() {
            report.notices += self
                .notifier
                .notify(diff.updated_events(), NoticeKind::Update, only_tag)
                .await;
        }
        if notify.send_deleted && !diff.deleted.is_empty() {
            report.notices += self
                .notifier
                .notify(diff.deleted_events(), NoticeKind::Delete, only_tag)
                .await;
        }

        Ok(report)
    }

    /// Send the schedule of the upcoming events, optionally for one tag and
    /// narrowed to the days in `days`. Returns the number of messages sent.
    pub async fn send_schedule(
        &self,
        tag: Option<&Tag>,
        days: Option<DayRange>,
        now: DateTime<Utc>,
    ) -> CourseCalResult<usize> {
        let events: Vec<CalendarEvent> = self
            .fetch_upcoming(now)
            .await?
            .into_iter()
            .filter(|event| match (days, event.start.moment()) {
                (None, _) => true,
                (Some(days), Some(start)) => days.contains(start.date()),
                (Some(_), None) => false,
            })
            .collect();

        info!(events = events.len(), tag = ?tag.map(Tag::as_str), ?days, "Sending schedule");
        Ok(self.notifier.notify(events, NoticeKind::Schedule, tag).await)
    }

    /// Admin calendar events in the lookahead window, newest first.
    async fn fetch_upcoming(&self, now: DateTime<Utc>) -> CourseCalResult<Vec<CalendarEvent>> {
        let range = DateRange::upcoming(now, self.config.calendar.lookahead_days)?;
        let mut events = self
            .services
            .calendar
            .list_events(&self.config.calendar.admin_calendar_id, &range)
            .await?;

        events.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(events)
    }

    /// Ids of events in the retention window, which leave history.
    async fn retired_ids(&self, calendar_id: &str, now: DateTime<Utc>) -> CourseCalResult<HashSet<String>> {
        let calendar = &self.config.calendar;
        let range = DateRange::past(now, calendar.retention_min_days, calendar.retention_max_days)?;

        Ok(self
            .services
            .calendar
            .list_events(calendar_id, &range)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect())
    }

    /// Apply `diff` to a tag calendar. Failures are logged per event.
    async fn mirror(&self, calendar_id: &str, diff: &HistoryDiff) -> usize {
        let calendar = self.services.calendar.as_ref();
        let mut applied = 0;

        for change in diff.changes() {
            let event = change.event();
            let result = match change.kind {
                ChangeKind::Create => calendar.insert_event(calendar_id, event).await.map(|_| ()),
                ChangeKind::Update => calendar.update_event(calendar_id, event).await.map(|_| ()),
                ChangeKind::Delete => calendar.delete_event(calendar_id, &event.id).await,
            };

            match result {
                Ok(()) => applied += 1,
                Err(e) => warn!(%calendar_id, event_id = %event.id, kind = %change.kind, error = %e, "Could not mirror change"),
            }
        }

        applied
    }
}
