//! History snapshots: the last-seen events per scope, kept as one JSON object.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CourseCalError, CourseCalResult};
use crate::event::CalendarEvent;
use crate::services::BlobStore;
use crate::tag::HistoryScope;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Mapping from event id to the full event payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistorySnapshot(BTreeMap<String, CalendarEvent>);

impl HistorySnapshot {
    /// Later events win when ids repeat.
    pub fn from_events(events: impl IntoIterator<Item = CalendarEvent>) -> Self {
        HistorySnapshot(events.into_iter().map(|e| (e.id.clone(), e)).collect())
    }

    pub fn get(&self, id: &str) -> Option<&CalendarEvent> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CalendarEvent)> {
        self.0.iter()
    }

    pub fn into_events(self) -> Vec<CalendarEvent> {
        self.0.into_values().collect()
    }

    /// Drop every event whose id is in `ids`. Returns how many were dropped.
    pub fn prune(&mut self, ids: &HashSet<String>) -> usize {
        let before = self.0.len();
        self.0.retain(|id, _| !ids.contains(id));
        before - self.0.len()
    }
}

/// Reads and overwrites history snapshots in object storage.
#[derive(Clone)]
pub struct HistoryStore {
    blobs: Arc<dyn BlobStore>,
    bucket: String,
}

impl HistoryStore {
    pub fn new(blobs: Arc<dyn BlobStore>, bucket: impl Into<String>) -> Self {
        HistoryStore {
            blobs,
            bucket: bucket.into(),
        }
    }

    /// Missing objects read as an empty snapshot.
    pub async fn load(&self, scope: &HistoryScope) -> CourseCalResult<HistorySnapshot> {
        let name = scope.object_name();

        let Some(bytes) = self.blobs.get(&self.bucket, &name).await? else {
            debug!(object = %name, "No history yet");
            return Ok(HistorySnapshot::default());
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| CourseCalError::History(format!("Could not parse {}: {}", name, e)))
    }

    pub async fn save(&self, scope: &HistoryScope, snapshot: &HistorySnapshot) -> CourseCalResult<()> {
        let name = scope.object_name();
        let bytes = serde_json::to_vec(snapshot)?;

        self.blobs
            .put(&self.bucket, &name, bytes, JSON_CONTENT_TYPE)
            .await?;

        debug!(object = %name, events = snapshot.len(), "History saved");
        Ok(())
    }
}
