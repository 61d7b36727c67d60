//! Course tags parsed from event titles.
//!
//! A tag is the text between the first `[` and the last `]` of a title,
//! e.g. `[Salsa1] Montag` belongs to `Salsa1`. Tags route contacts (one sheet
//! per tag), per-tag calendars and per-tag history snapshots.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*)\]").expect("tag pattern is valid"));

const ADMIN_HISTORY_OBJECT: &str = "events_history.json";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Tag(name.into())
    }

    pub fn from_title(title: &str) -> Option<Tag> {
        TAG_PATTERN
            .captures(title)
            .and_then(|c| c.get(1))
            .map(|m| Tag(m.as_str().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Grouping key for notifications. Untagged events form their own group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagKey {
    Tagged(Tag),
    Untagged,
}

impl TagKey {
    pub fn of_title(title: &str) -> Self {
        match Tag::from_title(title) {
            Some(tag) => TagKey::Tagged(tag),
            None => TagKey::Untagged,
        }
    }

    pub fn tag(&self) -> Option<&Tag> {
        match self {
            TagKey::Tagged(tag) => Some(tag),
            TagKey::Untagged => None,
        }
    }

    /// Sheet range for this group's contacts: `{tag}!{range}`, or the bare
    /// range (first sheet) for untagged events.
    pub fn contacts_range(&self, range: &str) -> String {
        match self {
            TagKey::Tagged(tag) => format!("{}!{}", tag, range),
            TagKey::Untagged => range.to_string(),
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKey::Tagged(tag) => write!(f, "{}", tag),
            TagKey::Untagged => f.write_str("None"),
        }
    }
}

/// Which history snapshot a comparison runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryScope {
    /// The whole admin calendar
    Admin,
    Tag(Tag),
}

impl HistoryScope {
    pub fn object_name(&self) -> String {
        match self {
            HistoryScope::Admin => ADMIN_HISTORY_OBJECT.to_string(),
            HistoryScope::Tag(tag) => format!("events_history_{}.json", tag),
        }
    }

    pub fn tag(&self) -> Option<&Tag> {
        match self {
            HistoryScope::Admin => None,
            HistoryScope::Tag(tag) => Some(tag),
        }
    }
}

impl fmt::Display for HistoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryScope::Admin => f.write_str("Admin"),
            HistoryScope::Tag(tag) => write!(f, "{}", tag),
        }
    }
}
