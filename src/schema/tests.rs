//! Tests for schema inference

use super::*;
use crate::odata::{EntityMetadata, EntityProperty};
use crate::types::{Inclusion, ReplicationMethod, Row};
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

fn accounts() -> EntityMetadata {
    EntityMetadata {
        entity_set: "accounts".to_string(),
        entity_type: "account".to_string(),
        properties: Some(vec![
            EntityProperty::new("accountid", "Edm.Guid", true),
            EntityProperty::new("modifiedon", "Edm.DateTime", false),
            EntityProperty::new("revenue", "Edm.Decimal", false),
        ]),
        navigation_properties: Vec::new(),
    }
}

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

#[test_case("Edm.Date", JsonType::String, Some("date-time"); "date")]
#[test_case("Edm.DateTime", JsonType::String, Some("date-time"); "datetime")]
#[test_case("Edm.DateTimeOffset", JsonType::String, Some("date-time"); "datetime offset")]
#[test_case("Edm.Int16", JsonType::Integer, None; "int16")]
#[test_case("Edm.Int32", JsonType::Integer, None; "int32")]
#[test_case("Edm.Int64", JsonType::Integer, None; "int64")]
#[test_case("Edm.Double", JsonType::Number, None; "double")]
#[test_case("Edm.Decimal", JsonType::Number, None; "decimal")]
#[test_case("Edm.Boolean", JsonType::Boolean, None; "boolean")]
#[test_case("Edm.Guid", JsonType::String, None; "guid")]
#[test_case("Edm.String", JsonType::String, None; "string")]
#[test_case("Edm.Binary", JsonType::String, None; "unmapped binary")]
#[test_case("Microsoft.Dynamics.CRM.Custom", JsonType::String, None; "unmapped custom")]
fn test_json_type_mapping(odata_type: &str, expected: JsonType, format: Option<&str>) {
    assert_eq!(json_type_for(odata_type), (expected, format));
}

#[test]
fn test_accounts_end_to_end() {
    let inferred = infer_entity_schema(&accounts());

    assert_eq!(inferred.key_properties, vec!["accountid"]);
    assert_eq!(
        inferred.schema.to_json(),
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "accountid": {"type": ["null", "string"]},
                "modifiedon": {"type": ["null", "string"], "format": "date-time"},
                "revenue": {"type": ["null", "number"]}
            }
        })
    );
    assert_eq!(
        replication_method_for(&inferred.schema),
        ReplicationMethod::Incremental
    );
}

#[test]
fn test_every_field_nullable_and_available() {
    let entity = EntityMetadata {
        properties: Some(vec![
            EntityProperty::new("a", "Edm.Int32", false),
            EntityProperty::new("b", "Edm.Boolean", false),
            EntityProperty::new("c", "Edm.Double", false),
            EntityProperty::new("d", "Edm.Stream", false),
        ]),
        ..accounts()
    };
    let inferred = infer_entity_schema(&entity);

    assert!(inferred.schema.properties.values().all(SchemaProperty::is_nullable));
    assert_eq!(inferred.field_metadata.len(), 4);
    assert!(inferred
        .field_metadata
        .iter()
        .all(|f| f.inclusion == Inclusion::Available));
    assert!(inferred.key_properties.is_empty());
}

#[test]
fn test_composite_keys_keep_source_order() {
    let entity = EntityMetadata {
        properties: Some(vec![
            EntityProperty::new("zeta", "Edm.Guid", true),
            EntityProperty::new("name", "Edm.String", false),
            EntityProperty::new("alpha", "Edm.Guid", true),
        ]),
        ..accounts()
    };
    let inferred = infer_entity_schema(&entity);
    assert_eq!(inferred.key_properties, vec!["zeta", "alpha"]);
}

#[test]
fn test_missing_properties_yield_empty_schema() {
    let entity = EntityMetadata {
        properties: None,
        ..accounts()
    };
    let inferred = infer_entity_schema(&entity);

    assert!(inferred.schema.is_empty());
    assert_eq!(inferred.schema.to_json(), json!({}));
    assert!(inferred.field_metadata.is_empty());
    assert_eq!(
        replication_method_for(&inferred.schema),
        ReplicationMethod::FullTable
    );
}

#[test]
fn test_replication_method_is_function_of_schema() {
    let mut schema = JsonSchema::strict_object();
    schema.add_property("name", SchemaProperty::nullable(JsonType::String));
    assert_eq!(replication_method_for(&schema), ReplicationMethod::FullTable);

    schema.add_property(
        LAST_MODIFIED_FIELD,
        SchemaProperty::nullable(JsonType::String).with_format("date-time"),
    );
    assert_eq!(replication_method_for(&schema), ReplicationMethod::Incremental);
}

#[test]
fn test_view_stream_schema() {
    let schema = view_stream_schema(["Open-Leads", "My-Leads"]);
    assert_eq!(
        schema.to_json(),
        json!({
            "type": ["null", "object"],
            "additionalProperties": true,
            "properties": {
                "My-Leads": {"type": ["null", "string"]},
                "Open-Leads": {"type": ["null", "string"]}
            }
        })
    );
}

#[test]
fn test_view_row_schema_is_union_without_etag() {
    let rows = vec![
        row(json!({"@odata.etag": "W/\"1\"", "leadid": "l1", "fullname": "Ann"})),
        row(json!({"leadid": "l2", "revenue": 10.5})),
    ];
    let inferred = infer_view_row_schema(&rows);

    assert_eq!(inferred.fields, vec!["leadid", "fullname", "revenue"]);
    assert_eq!(inferred.schema.additional_properties, Some(true));
    assert!(!inferred.schema.has_property(ETAG_FIELD));
    assert_eq!(
        inferred.schema.get_property("revenue").unwrap().to_owned(),
        SchemaProperty::new(JsonTypeOrArray::Multiple(vec![
            JsonType::Integer,
            JsonType::Number,
            JsonType::String,
            JsonType::Boolean,
            JsonType::Null,
        ]))
    );
}

#[test]
fn test_view_row_schema_empty() {
    let inferred = infer_view_row_schema(&[]);
    assert!(inferred.fields.is_empty());
    assert!(inferred.schema.properties.is_empty());
}

#[test]
fn test_schema_round_trips_unknown_keywords() {
    let value = json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "name": {"type": ["null", "string"], "maxLength": 100}
        },
        "definitions": {}
    });
    let schema: JsonSchema = serde_json::from_value(value.clone()).unwrap();

    assert_eq!(schema.get_property("name").unwrap().primary_type(), Some(JsonType::String));
    assert_eq!(schema.to_json(), value);
}
