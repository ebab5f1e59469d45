//! Record transformation
//!
//! Projects remote rows onto the catalog schema and coerces values to the
//! declared types.

use crate::catalog::CatalogEntry;
use crate::schema::{JsonSchema, JsonType, ETAG_FIELD};
use crate::types::{format_timestamp, parse_timestamp, JsonObject, JsonValue, Row};
use serde_json::Number;
use tracing::debug;

/// Target representation of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    DateTime,
    Integer,
    Number,
    Boolean,
    String,
    Object,
    Any,
}

impl FieldKind {
    fn from_property(json_type: Option<JsonType>, date_time: bool) -> Self {
        if date_time {
            return FieldKind::DateTime;
        }
        match json_type {
            Some(JsonType::Integer) => FieldKind::Integer,
            Some(JsonType::Number) => FieldKind::Number,
            Some(JsonType::Boolean) => FieldKind::Boolean,
            Some(JsonType::String) => FieldKind::String,
            Some(JsonType::Object) => FieldKind::Object,
            _ => FieldKind::Any,
        }
    }
}

/// Shapes rows of one catalog stream into records
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    fields: Vec<(String, FieldKind)>,
    schema: JsonSchema,
    /// No declared properties: rows are passed through unchanged
    passthrough: bool,
}

impl RecordTransformer {
    /// Build a transformer from the stream's schema and field selection
    pub fn new(entry: &CatalogEntry) -> Self {
        let mut schema = entry.schema.clone();
        schema
            .properties
            .retain(|name, _| entry.is_field_selected(name));

        let fields = schema
            .properties
            .iter()
            .map(|(name, prop)| {
                (
                    name.clone(),
                    FieldKind::from_property(prop.primary_type(), prop.is_date_time()),
                )
            })
            .collect();

        Self {
            fields,
            passthrough: entry.schema.properties.is_empty(),
            schema,
        }
    }

    /// Schema of the records this transformer produces
    pub fn schema(&self) -> &JsonSchema {
        &self.schema
    }

    /// Project a row onto the selected fields.
    ///
    /// Declared fields missing from the row are null. Values that do not fit
    /// the declared type become null.
    pub fn transform(&self, stream: &str, row: &Row) -> JsonObject {
        if self.passthrough {
            return view_record(&[], row);
        }
        let mut record = JsonObject::new();
        for (name, kind) in &self.fields {
            let value = match row.get(name) {
                None | Some(JsonValue::Null) => JsonValue::Null,
                Some(value) => coerce(value, *kind).unwrap_or_else(|| {
                    debug!(stream, field = %name, value = %value, "Value does not match schema type, writing null");
                    JsonValue::Null
                }),
            };
            record.insert(name.clone(), value);
        }
        record
    }
}

/// Build a fresh view record: every field null, then the row's own values
pub fn view_record(fields: &[String], row: &Row) -> JsonObject {
    let mut record: JsonObject = fields
        .iter()
        .map(|field| (field.clone(), JsonValue::Null))
        .collect();
    for (key, value) in row {
        if key != ETAG_FIELD {
            record.insert(key.clone(), value.clone());
        }
    }
    record
}

fn coerce(value: &JsonValue, kind: FieldKind) -> Option<JsonValue> {
    match kind {
        FieldKind::Any => Some(value.clone()),
        FieldKind::DateTime => value
            .as_str()
            .and_then(parse_timestamp)
            .map(|ts| JsonValue::String(format_timestamp(ts))),
        FieldKind::Integer => match value {
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
            JsonValue::Number(n) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| JsonValue::from(f as i64)),
            JsonValue::String(s) => s.trim().parse::<i64>().ok().map(JsonValue::from),
            _ => None,
        },
        FieldKind::Number => match value {
            JsonValue::Number(_) => Some(value.clone()),
            JsonValue::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(JsonValue::Number),
            _ => None,
        },
        FieldKind::Boolean => match value {
            JsonValue::Bool(_) => Some(value.clone()),
            JsonValue::String(s) if s.eq_ignore_ascii_case("true") => Some(JsonValue::Bool(true)),
            JsonValue::String(s) if s.eq_ignore_ascii_case("false") => Some(JsonValue::Bool(false)),
            _ => None,
        },
        FieldKind::String => match value {
            JsonValue::String(_) => Some(value.clone()),
            JsonValue::Number(_) | JsonValue::Bool(_) => Some(JsonValue::String(value.to_string())),
            _ => None,
        },
        FieldKind::Object => value.is_object().then(|| value.clone()),
    }
}
