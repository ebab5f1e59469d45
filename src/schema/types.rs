//! JSON Schema documents as they appear in the catalog
//!
//! Only the keywords the tap reads are typed; anything else a catalog author
//! adds survives a load and re-serialize through the `extra` maps.

use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Primitive JSON Schema type name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

/// The `type` keyword: one name, or a list such as `["null", "string"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonTypeOrArray {
    Single(JsonType),
    Multiple(Vec<JsonType>),
}

impl JsonTypeOrArray {
    pub fn single(t: JsonType) -> Self {
        JsonTypeOrArray::Single(t)
    }

    /// Create a nullable type, written as `["null", <type>]`
    pub fn nullable(t: JsonType) -> Self {
        if t == JsonType::Null {
            JsonTypeOrArray::Single(JsonType::Null)
        } else {
            JsonTypeOrArray::Multiple(vec![JsonType::Null, t])
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            JsonTypeOrArray::Single(t) => *t == JsonType::Null,
            JsonTypeOrArray::Multiple(types) => types.contains(&JsonType::Null),
        }
    }

    /// Get the primary (non-null) type, if exactly one is declared
    pub fn primary_type(&self) -> Option<JsonType> {
        match self {
            JsonTypeOrArray::Single(JsonType::Null) => None,
            JsonTypeOrArray::Single(t) => Some(*t),
            JsonTypeOrArray::Multiple(types) => {
                let mut non_null = types.iter().filter(|t| **t != JsonType::Null);
                match (non_null.next(), non_null.next()) {
                    (Some(t), None) => Some(*t),
                    _ => None,
                }
            }
        }
    }
}

/// Schema of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaProperty {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub json_type: Option<JsonTypeOrArray>,

    /// Only `date-time` is produced or interpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl SchemaProperty {
    pub fn new(json_type: JsonTypeOrArray) -> Self {
        Self {
            json_type: Some(json_type),
            format: None,
            extra: BTreeMap::new(),
        }
    }

    /// `["null", json_type]`, the shape of every discovered field
    pub fn nullable(json_type: JsonType) -> Self {
        Self::new(JsonTypeOrArray::nullable(json_type))
    }

    #[must_use]
    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    /// A property without a `type` accepts null too
    pub fn is_nullable(&self) -> bool {
        self.json_type
            .as_ref()
            .map_or(true, JsonTypeOrArray::is_nullable)
    }

    /// The single non-null type, when the declaration has one
    pub fn primary_type(&self) -> Option<JsonType> {
        self.json_type.as_ref().and_then(JsonTypeOrArray::primary_type)
    }

    pub fn is_date_time(&self) -> bool {
        self.format.as_deref() == Some("date-time")
    }
}

/// Stream schema document.
///
/// Every keyword is optional so an entity without declared properties
/// serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub json_type: Option<JsonTypeOrArray>,

    #[serde(
        rename = "additionalProperties",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<bool>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaProperty>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl JsonSchema {
    /// The empty schema `{}`
    pub fn empty() -> Self {
        Self::default()
    }

    /// Entity schema: an object limited to the declared attributes
    pub fn strict_object() -> Self {
        Self {
            json_type: Some(JsonTypeOrArray::single(JsonType::Object)),
            additional_properties: Some(false),
            ..Self::default()
        }
    }

    /// View schema: row shape is only known once rows arrive
    pub fn permissive_object() -> Self {
        Self {
            json_type: Some(JsonTypeOrArray::single(JsonType::Object)),
            additional_properties: Some(true),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn add_property(&mut self, name: &str, property: SchemaProperty) {
        self.properties.insert(name.to_string(), property);
    }

    pub fn get_property(&self, name: &str) -> Option<&SchemaProperty> {
        self.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or_default()
    }
}
