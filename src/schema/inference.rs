//! Schema inference
//!
//! Two sources of schemas exist. Base entities get theirs from declared
//! metadata: each EDM type maps to a nullable JSON type. Views have no
//! declared shape, so their schema is built from the rows they return.

use super::types::{JsonSchema, JsonType, JsonTypeOrArray, SchemaProperty};
use crate::odata::EntityMetadata;
use crate::types::{Inclusion, ReplicationMethod, Row};

/// Attribute holding the last modification time of a row
pub const LAST_MODIFIED_FIELD: &str = "modifiedon";

/// Transport annotation stripped from view rows
pub const ETAG_FIELD: &str = "@odata.etag";

/// Field-level selection metadata produced alongside a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
    /// Property name
    pub name: String,
    /// Whether the consumer may deselect it
    pub inclusion: Inclusion,
}

/// Result of inferring a base entity's schema
#[derive(Debug, Clone, PartialEq)]
pub struct InferredSchema {
    pub schema: JsonSchema,
    pub field_metadata: Vec<FieldMetadata>,
    /// Primary key properties in declaration order
    pub key_properties: Vec<String>,
}

/// Map an EDM type tag to a JSON type and optional format.
///
/// First match wins; unknown tags fall back to `string`.
pub fn json_type_for(odata_type: &str) -> (JsonType, Option<&'static str>) {
    match odata_type {
        "Edm.Date" | "Edm.DateTime" | "Edm.DateTimeOffset" => (JsonType::String, Some("date-time")),
        "Edm.Int16" | "Edm.Int32" | "Edm.Int64" => (JsonType::Integer, None),
        "Edm.Double" | "Edm.Decimal" => (JsonType::Number, None),
        "Edm.Boolean" => (JsonType::Boolean, None),
        _ => (JsonType::String, None),
    }
}

/// Infer the schema, field metadata and primary keys of an entity.
///
/// An entity whose metadata omits its property list yields the empty
/// schema and no keys.
pub fn infer_entity_schema(entity: &EntityMetadata) -> InferredSchema {
    let Some(properties) = entity.properties.as_ref() else {
        return InferredSchema {
            schema: JsonSchema::empty(),
            field_metadata: Vec::new(),
            key_properties: Vec::new(),
        };
    };

    let mut schema = JsonSchema::strict_object();
    let mut field_metadata = Vec::with_capacity(properties.len());
    let mut key_properties = Vec::new();

    for prop in properties {
        if prop.is_primary_key {
            key_properties.push(prop.name.clone());
        }

        field_metadata.push(FieldMetadata {
            name: prop.name.clone(),
            inclusion: Inclusion::Available,
        });

        let (json_type, format) = json_type_for(&prop.odata_type);
        let mut property = SchemaProperty::nullable(json_type);
        if let Some(format) = format {
            property = property.with_format(format);
        }
        schema.add_property(&prop.name, property);
    }

    InferredSchema {
        schema,
        field_metadata,
        key_properties,
    }
}

/// Replication method implied by a schema's shape
pub fn replication_method_for(schema: &JsonSchema) -> ReplicationMethod {
    if schema.has_property(LAST_MODIFIED_FIELD) {
        ReplicationMethod::Incremental
    } else {
        ReplicationMethod::FullTable
    }
}

/// Catalog schema of a view stream: one nullable string per view pseudo-field
pub fn view_stream_schema<'a>(view_fields: impl IntoIterator<Item = &'a str>) -> JsonSchema {
    let mut schema = JsonSchema::permissive_object();
    schema.json_type = Some(JsonTypeOrArray::nullable(JsonType::Object));
    for field in view_fields {
        schema.add_property(field, SchemaProperty::nullable(JsonType::String));
    }
    schema
}

/// Schema of the rows one view returned during a sync
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRowSchema {
    pub schema: JsonSchema,
    /// Union of row attributes in first-seen order
    pub fields: Vec<String>,
}

/// Build a permissive schema from the union of the rows' attributes.
///
/// Each attribute may hold any scalar since view columns are only known once
/// the view has been executed.
pub fn infer_view_row_schema(rows: &[Row]) -> ViewRowSchema {
    let mut schema = JsonSchema::permissive_object();
    let mut fields: Vec<String> = Vec::new();

    for key in rows.iter().flat_map(|row| row.keys()) {
        if key == ETAG_FIELD || schema.has_property(key) {
            continue;
        }
        schema.add_property(
            key,
            SchemaProperty::new(JsonTypeOrArray::Multiple(vec![
                JsonType::Integer,
                JsonType::Number,
                JsonType::String,
                JsonType::Boolean,
                JsonType::Null,
            ])),
        );
        fields.push(key.clone());
    }

    ViewRowSchema { schema, fields }
}
