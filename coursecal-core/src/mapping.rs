//! Tag lookups kept in object storage.
//!
//! - `calendar_mapping.json`: tag → id of the per-tag calendar
//! - `tag_mapping.json`: course name used in registration forms → tag

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::error::{CourseCalError, CourseCalResult};
use crate::services::{BlobStore, CalendarService};
use crate::tag::Tag;

pub const CALENDAR_MAPPING_OBJECT: &str = "calendar_mapping.json";
pub const TAG_MAPPING_OBJECT: &str = "tag_mapping.json";
const JSON_CONTENT_TYPE: &str = "application/json";

async fn load_map(blobs: &dyn BlobStore, bucket: &str, name: &str) -> CourseCalResult<BTreeMap<String, String>> {
    match blobs.get(bucket, name).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| CourseCalError::Storage(format!("Could not parse {}: {}", name, e))),
        None => Ok(BTreeMap::new()),
    }
}

/// Tag → per-tag calendar id.
pub struct CalendarMapping {
    blobs: Arc<dyn BlobStore>,
    bucket: String,
    calendars: BTreeMap<String, String>,
}

impl CalendarMapping {
    pub fn new(blobs: Arc<dyn BlobStore>, bucket: impl Into<String>) -> Self {
        CalendarMapping {
            blobs,
            bucket: bucket.into(),
            calendars: BTreeMap::new(),
        }
    }

    pub async fn load(blobs: Arc<dyn BlobStore>, bucket: impl Into<String>) -> CourseCalResult<Self> {
        let bucket = bucket.into();
        let calendars = load_map(blobs.as_ref(), &bucket, CALENDAR_MAPPING_OBJECT).await?;

        Ok(CalendarMapping {
            blobs,
            bucket,
            calendars,
        })
    }

    pub fn get(&self, tag: &Tag) -> Option<&str> {
        self.calendars.get(tag.as_str()).map(String::as_str)
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.calendars.keys().map(|k| Tag::new(k.clone())).collect()
    }

    /// Adopt tags that are in the store but not known here (known tags keep
    /// their calendar), then write the merged mapping back.
    pub async fn merge_from_store(&mut self) -> CourseCalResult<()> {
        let stored = load_map(self.blobs.as_ref(), &self.bucket, CALENDAR_MAPPING_OBJECT).await?;

        for (tag, calendar_id) in stored {
            self.calendars.entry(tag).or_insert(calendar_id);
        }

        let bytes = serde_json::to_vec(&self.calendars)?;
        self.blobs
            .put(&self.bucket, CALENDAR_MAPPING_OBJECT, bytes, JSON_CONTENT_TYPE)
            .await
    }

    /// Make sure a tag that has a roster sheet also has its own calendar.
    ///
    /// Returns the calendar id, or `None` when the tag has no sheet.
    pub async fn ensure_calendar(
        &mut self,
        tag: &Tag,
        sheet_titles: &[String],
        calendar: &dyn CalendarService,
        time_zone: &str,
    ) -> CourseCalResult<Option<String>> {
        if let Some(id) = self.get(tag) {
            return Ok(Some(id.to_string()));
        }
        if !sheet_titles.iter().any(|t| t == tag.as_str()) {
            return Ok(None);
        }

        let id = calendar.create_calendar(tag.as_str(), time_zone).await?;
        info!(tag = %tag, calendar_id = %id, "Created calendar for tag");

        self.calendars.insert(tag.as_str().to_string(), id.clone());
        self.merge_from_store().await?;

        Ok(Some(id))
    }
}

/// Registration course name → tag.
#[derive(Debug, Clone, Default)]
pub struct TagMapping {
    courses: BTreeMap<String, String>,
}

impl TagMapping {
    pub async fn load(blobs: &dyn BlobStore, bucket: &str) -> CourseCalResult<Self> {
        Ok(TagMapping {
            courses: load_map(blobs, bucket, TAG_MAPPING_OBJECT).await?,
        })
    }

    /// Unmapped course names are used as the tag directly.
    pub fn resolve(&self, course: &str) -> Tag {
        let course = course.trim();
        Tag::new(self.courses.get(course).map(String::as_str).unwrap_or(course))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCalendar, MemoryBlobStore};

    #[tokio::test]
    async fn merge_keeps_known_entries_and_adopts_new_ones() {
        let blobs = Arc::new(MemoryBlobStore::default());
        blobs.insert(
            "b",
            CALENDAR_MAPPING_OBJECT,
            br#"{"Salsa1":"stored-salsa","Bachata":"stored-bachata"}"#.to_vec(),
        );

        let mut mapping = CalendarMapping::new(blobs.clone(), "b");
        mapping.calendars.insert("Salsa1".into(), "local-salsa".into());
        mapping.merge_from_store().await.unwrap();

        assert_eq!(mapping.get(&Tag::new("Salsa1")), Some("local-salsa"));
        assert_eq!(mapping.get(&Tag::new("Bachata")), Some("stored-bachata"));

        let written: BTreeMap<String, String> =
            serde_json::from_slice(&blobs.read("b", CALENDAR_MAPPING_OBJECT).unwrap()).unwrap();
        assert_eq!(written["Salsa1"], "local-salsa");
    }

    #[tokio::test]
    async fn ensure_calendar_creates_only_for_sheet_tags() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let calendar = FakeCalendar::default();
        let mut mapping = CalendarMapping::load(blobs.clone(), "b").await.unwrap();
        let sheets = vec!["Salsa1".to_string()];

        let none = mapping
            .ensure_calendar(&Tag::new("Tango"), &sheets, &calendar, "Europe/Vienna")
            .await
            .unwrap();
        assert_eq!(none, None);

        let created = mapping
            .ensure_calendar(&Tag::new("Salsa1"), &sheets, &calendar, "Europe/Vienna")
            .await
            .unwrap()
            .unwrap();
        let again = mapping
            .ensure_calendar(&Tag::new("Salsa1"), &sheets, &calendar, "Europe/Vienna")
            .await
            .unwrap();

        assert_eq!(again.as_deref(), Some(created.as_str()));
        assert_eq!(calendar.created_calendars(), vec![("Salsa1".to_string(), "Europe/Vienna".to_string())]);
        assert!(blobs.contains("b", CALENDAR_MAPPING_OBJECT));
    }

    #[tokio::test]
    async fn tag_mapping_falls_back_to_course_name() {
        let blobs = MemoryBlobStore::default();
        blobs.insert("cal", TAG_MAPPING_OBJECT, r#"{"Salsa Anfänger":"Salsa1"}"#.as_bytes().to_vec());

        let mapping = TagMapping::load(&blobs, "cal").await.unwrap();
        assert_eq!(mapping.resolve("Salsa Anfänger "), Tag::new("Salsa1"));
        assert_eq!(mapping.resolve("Tango"), Tag::new("Tango"));
    }
}
