use std::fmt;

use crate::event::CalendarEvent;

use crate::diff::ChangeKind;

/// One classified change. `Create` carries only `new`, `Delete` only `old`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventChange {
    pub kind: ChangeKind,
    pub old: Option<CalendarEvent>,
    pub new: Option<CalendarEvent>,
}

impl fmt::Display for EventChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let event = self.event();
        write!(f, "{}: {} ({})", self.kind, event.summary, event.id)
    }
}

impl EventChange {
    pub fn created(event: CalendarEvent) -> Self {
        EventChange {
            kind: ChangeKind::Create,
            old: None,
            new: Some(event),
        }
    }

    pub fn updated(old: CalendarEvent, new: CalendarEvent) -> Self {
        EventChange {
            kind: ChangeKind::Update,
            old: Some(old),
            new: Some(new),
        }
    }

    pub fn deleted(event: CalendarEvent) -> Self {
        EventChange {
            kind: ChangeKind::Delete,
            old: Some(event),
            new: None,
        }
    }

    /// The event this change is about (prefer new, fall back to old).
    pub fn event(&self) -> &CalendarEvent {
        match (&self.new, &self.old) {
            (Some(new), _) => new,
            (None, Some(old)) => old,
            // Constructors always set one side.
            (None, None) => unreachable!("EventChange without an event"),
        }
    }
}
