//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use crate::types::{parse_timestamp, JsonValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Checkpoint document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream bookmark (last replicated modification time)
    #[serde(default)]
    pub bookmarks: BTreeMap<String, JsonValue>,

    /// Stream being synced when the document was written
    #[serde(default)]
    pub currently_syncing: Option<String>,

    /// Keys this tap does not interpret, kept verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bookmark for a stream
    pub fn get_bookmark(&self, stream: &str) -> Option<&str> {
        self.bookmarks.get(stream)?.as_str()
    }

    /// Bookmark for a stream as a timestamp, ignoring unparseable values
    pub fn bookmark_timestamp(&self, stream: &str) -> Option<DateTime<Utc>> {
        self.get_bookmark(stream).and_then(parse_timestamp)
    }

    /// Set bookmark for a stream
    pub fn set_bookmark(&mut self, stream: &str, value: impl Into<String>) {
        self.bookmarks
            .insert(stream.to_string(), JsonValue::String(value.into()));
    }
}
