//! Note model

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-side note identifier. Zero or negative means not assigned yet.
pub type NoteId = i64;

/// A note as exchanged with the Notes API.
///
/// Only `id` and `content` carry meaning locally; every other field
/// (`title`, `modified`, `favorite`, `category`, `etag`, ...) is kept as-is
/// so server payloads round-trip untouched. Two notes are equal when their
/// whole JSON objects are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Note(Map<String, Value>);

impl Note {
    /// Create a local note that has no server id yet
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("content".to_string(), Value::String(content.into()));
        Self(fields)
    }

    #[must_use]
    pub const fn from_object(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Builder-style helper to attach a server id
    #[must_use]
    pub fn with_id(mut self, id: NoteId) -> Self {
        self.0.insert("id".to_string(), Value::from(id));
        self
    }

    /// Server id, or 0 when absent or not an integral number
    #[must_use]
    pub fn id(&self) -> NoteId {
        self.0.get("id").and_then(integral_id).unwrap_or_default()
    }

    #[must_use]
    pub fn has_assigned_id(&self) -> bool {
        self.id() > 0
    }

    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.0.get("content").and_then(Value::as_str)
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.0.get("category").and_then(Value::as_str)
    }

    #[must_use]
    pub fn favorite(&self) -> bool {
        self.0
            .get("favorite")
            .and_then(Value::as_bool)
            .unwrap_or_default()
    }

    /// Last modification time reported by the server (Unix seconds)
    #[must_use]
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        let seconds = self.0.get("modified").and_then(Value::as_i64)?;
        Utc.timestamp_opt(seconds, 0).single()
    }

    /// Raw field lookup
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    #[must_use]
    pub const fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Whether `other` carries the same `content` field (both absent counts)
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.0.get("content") == other.0.get("content")
    }

    /// Get first line as title preview, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        self.title()
            .filter(|title| !title.trim().is_empty())
            .or_else(|| self.content().and_then(|content| content.lines().next()))
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}

impl From<Map<String, Value>> for Note {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Accepts `5` as well as `5.0`; fractional or out-of-range numbers are no id.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral_id(value: &Value) -> Option<NoteId> {
    value.as_i64().or_else(|| {
        let number = value.as_f64()?;
        // `i64::MAX as f64` rounds up to 2^63, hence the exclusive bound.
        let in_range = number >= i64::MIN as f64 && number < i64::MAX as f64;
        (in_range && number.fract() == 0.0).then_some(number as NoteId)
    })
}
