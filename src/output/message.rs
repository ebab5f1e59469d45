//! Record-stream messages

use crate::schema::JsonSchema;
use crate::state::State;
use crate::types::{format_timestamp, JsonObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of the output stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Describes the records that follow for a stream
    Schema {
        stream: String,
        schema: JsonSchema,
        key_properties: Vec<String>,
    },
    /// One typed record
    Record {
        stream: String,
        record: JsonObject,
        time_extracted: String,
    },
    /// The full checkpoint document
    State { value: State },
}

impl Message {
    /// Create a schema message
    pub fn schema(stream: impl Into<String>, schema: JsonSchema, key_properties: Vec<String>) -> Self {
        Self::Schema {
            stream: stream.into(),
            schema,
            key_properties,
        }
    }

    /// Create a record message
    pub fn record(stream: impl Into<String>, record: JsonObject, extracted: DateTime<Utc>) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
            time_extracted: format_timestamp(extracted),
        }
    }

    /// Create a state message
    pub fn state(value: State) -> Self {
        Self::State { value }
    }

    /// Stream the message belongs to (`None` for state)
    pub fn stream(&self) -> Option<&str> {
        match self {
            Self::Schema { stream, .. } | Self::Record { stream, .. } => Some(stream),
            Self::State { .. } => None,
        }
    }

    /// Check if this is a schema message
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }
}
