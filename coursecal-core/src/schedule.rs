//! Grouping events per tag and rendering them as a plain-text schedule.

use std::collections::BTreeMap;

use crate::event::CalendarEvent;
use crate::tag::TagKey;

/// Group events by the tag in their title. Order inside a group is kept.
pub fn group_by_tag(events: impl IntoIterator<Item = CalendarEvent>) -> BTreeMap<TagKey, Vec<CalendarEvent>> {
    let mut groups: BTreeMap<TagKey, Vec<CalendarEvent>> = BTreeMap::new();

    for event in events {
        groups
            .entry(TagKey::of_title(&event.summary))
            .or_default()
            .push(event);
    }

    groups
}

/// Render events as day blocks:
///
/// ```text
/// 03.03.2025
/// [Salsa1] Montag: 19:00 - 20:30
///
/// 05.03.2025
/// [Salsa1] Mittwoch: 19:00 - 20:30
/// ```
///
/// Events without a readable start are left out.
pub fn render_schedule(events: &[CalendarEvent]) -> String {
    let mut sorted: Vec<&CalendarEvent> = events
        .iter()
        .filter(|e| e.start_sort_key().is_some())
        .collect();
    sorted.sort_by_key(|e| e.start_sort_key());

    let mut days: Vec<(String, Vec<String>)> = Vec::new();

    for event in sorted {
        let day = event.start.day_label().unwrap_or_default();
        let line = format!(
            "{}: {} - {}",
            event.summary,
            event.start.clock().unwrap_or_default(),
            event.end.clock().unwrap_or_default()
        );

        match days.last_mut() {
            Some((current, lines)) if *current == day => lines.push(line),
            _ => days.push((day, vec![line])),
        }
    }

    days.into_iter()
        .map(|(day, lines)| format!("{}\n{}", day, lines.join("\n")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventTime;
    use crate::tag::Tag;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    fn timed(id: &str, title: &str, day: u32, from: (u32, u32), to: (u32, u32)) -> CalendarEvent {
        let tz = FixedOffset::east_opt(3600).unwrap();
        CalendarEvent::new(
            id,
            title,
            EventTime::timed(tz.with_ymd_and_hms(2025, 3, day, from.0, from.1, 0).unwrap()),
            EventTime::timed(tz.with_ymd_and_hms(2025, 3, day, to.0, to.1, 0).unwrap()),
        )
    }

    #[test]
    fn groups_by_tag_with_untagged_bucket() {
        let groups = group_by_tag(vec![
            timed("1", "[Salsa1] Mo", 3, (19, 0), (20, 0)),
            timed("2", "Staff meeting", 3, (9, 0), (10, 0)),
            timed("3", "[Bachata] Di", 4, (19, 0), (20, 0)),
            timed("4", "[Salsa1] Mi", 5, (19, 0), (20, 0)),
        ]);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&TagKey::Tagged(Tag::new("Salsa1"))].len(), 2);
        assert_eq!(groups[&TagKey::Untagged][0].id, "2");
    }

    #[test]
    fn renders_days_in_start_order() {
        let events = vec![
            timed("3", "[Salsa1] Mittwoch", 5, (19, 0), (20, 30)),
            timed("1", "[Salsa1] Montag", 3, (19, 0), (20, 30)),
            timed("2", "[Salsa1] Montag spät", 3, (21, 0), (22, 0)),
        ];

        assert_eq!(
            render_schedule(&events),
            "03.03.2025\n[Salsa1] Montag: 19:00 - 20:30\n[Salsa1] Montag spät: 21:00 - 22:00\n\n\
             05.03.2025\n[Salsa1] Mittwoch: 19:00 - 20:30"
        );
    }

    #[test]
    fn all_day_events_show_midnight() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        let events = vec![CalendarEvent::new(
            "w",
            "[Salsa1] Workshop",
            EventTime::all_day(day),
            EventTime::all_day(day.succ_opt().unwrap()),
        )];

        assert_eq!(
            render_schedule(&events),
            "08.03.2025\n[Salsa1] Workshop: 00:00 - 00:00"
        );
    }

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(render_schedule(&[]), "");
    }
}
