//! Common types used throughout tap-dynamics
//!
//! This module contains shared type definitions, type aliases,
//! and small enums used across multiple modules.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// One row returned by the remote service, keyed by attribute name
pub type Row = JsonObject;

// ============================================================================
// Replication Method
// ============================================================================

/// How a stream is extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationMethod {
    /// Timestamp-filtered, ascending-ordered extraction with a bookmark
    Incremental,
    /// Re-read the whole entity set every run
    #[default]
    FullTable,
}

impl std::fmt::Display for ReplicationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicationMethod::Incremental => write!(f, "INCREMENTAL"),
            ReplicationMethod::FullTable => write!(f, "FULL_TABLE"),
        }
    }
}

// ============================================================================
// Field Inclusion
// ============================================================================

/// Per-field selection metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inclusion {
    /// The consumer may deselect the field
    #[default]
    Available,
    /// The field is always emitted
    Automatic,
    /// The field cannot be replicated
    Unsupported,
}

// ============================================================================
// View Scope
// ============================================================================

/// Owning scope of a saved query definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewScope {
    /// System-wide view (`savedqueries`)
    System,
    /// Personal view owned by one user (`userqueries`)
    Personal,
}

impl ViewScope {
    /// Collection holding the query definitions for this scope
    pub fn collection(self) -> &'static str {
        match self {
            ViewScope::System => "savedqueries",
            ViewScope::Personal => "userqueries",
        }
    }

    /// Attribute carrying the definition's identifier
    pub fn id_attribute(self) -> &'static str {
        match self {
            ViewScope::System => "savedqueryid",
            ViewScope::Personal => "userqueryid",
        }
    }

    /// Query parameter used to execute a view against its entity set
    pub fn query_param(self) -> &'static str {
        match self {
            ViewScope::System => "savedQuery",
            ViewScope::Personal => "userQuery",
        }
    }
}

impl std::fmt::Display for ViewScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewScope::System => write!(f, "system"),
            ViewScope::Personal => write!(f, "personal"),
        }
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Timestamps
// ============================================================================

/// Parse an ISO-8601 timestamp as produced by the service or stored in state.
///
/// Accepts RFC 3339 with any offset, naive `YYYY-MM-DDTHH:MM:SS[.f]` (taken as
/// UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical string form for emitted timestamps and bookmarks
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}
