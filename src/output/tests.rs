//! Tests for output module

use super::*;
use crate::schema::{JsonSchema, JsonType, SchemaProperty};
use crate::state::State;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn lines(emitter: JsonLinesEmitter<Vec<u8>>) -> Vec<Value> {
    String::from_utf8(emitter.into_inner())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// ============================================================================
// Message Tests
// ============================================================================

#[test]
fn test_schema_message_shape() {
    let mut schema = JsonSchema::strict_object();
    schema.add_property("accountid", SchemaProperty::nullable(JsonType::String));
    let msg = Message::schema("accounts", schema, vec!["accountid".to_string()]);

    assert!(msg.is_schema());
    assert_eq!(
        serde_json::to_value(&msg).unwrap(),
        json!({
            "type": "SCHEMA",
            "stream": "accounts",
            "schema": {
                "type": "object",
                "additionalProperties": false,
                "properties": {"accountid": {"type": ["null", "string"]}}
            },
            "key_properties": ["accountid"]
        })
    );
}

#[test]
fn test_record_message_shape() {
    let record = json!({"accountid": "a-1"}).as_object().cloned().unwrap();
    let extracted = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
    let msg = Message::record("accounts", record, extracted);

    assert_eq!(msg.stream(), Some("accounts"));
    assert_eq!(
        serde_json::to_value(&msg).unwrap(),
        json!({
            "type": "RECORD",
            "stream": "accounts",
            "record": {"accountid": "a-1"},
            "time_extracted": "2024-02-03T04:05:06.000000Z"
        })
    );
}

#[test]
fn test_state_message_shape() {
    let mut state = State::new();
    state.set_bookmark("accounts", "2024-01-01T00:00:00.000000Z");
    let msg = Message::state(state);

    assert!(msg.is_state());
    assert_eq!(msg.stream(), None);
    assert_eq!(
        serde_json::to_value(&msg).unwrap(),
        json!({
            "type": "STATE",
            "value": {
                "bookmarks": {"accounts": "2024-01-01T00:00:00.000000Z"},
                "currently_syncing": null
            }
        })
    );
}

// ============================================================================
// Emitter Tests
// ============================================================================

#[test]
fn test_json_lines_emitter_writes_in_order() {
    let mut emitter = JsonLinesEmitter::new(Vec::new());
    emitter
        .emit_schema("leads", &JsonSchema::strict_object(), &[])
        .unwrap();
    emitter
        .emit_record("leads", json!({"leadid": "l-1"}).as_object().cloned().unwrap())
        .unwrap();
    emitter.emit_state(&State::new()).unwrap();

    let written = lines(emitter);
    let types: Vec<&str> = written.iter().map(|v| v["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["SCHEMA", "RECORD", "STATE"]);
    assert_eq!(written[1]["record"]["leadid"], "l-1");
    assert!(written[1]["time_extracted"].as_str().unwrap().ends_with('Z'));
}

#[test]
fn test_memory_emitter_accessors() {
    let mut emitter = MemoryEmitter::new();
    emitter
        .emit_schema("leads", &JsonSchema::strict_object(), &[])
        .unwrap();
    for id in ["l-1", "l-2"] {
        emitter
            .emit_record("leads", json!({"leadid": id}).as_object().cloned().unwrap())
            .unwrap();
    }
    emitter
        .emit_record("contacts", json!({"contactid": "c-1"}).as_object().cloned().unwrap())
        .unwrap();
    emitter.emit_state(&State::new()).unwrap();

    assert_eq!(emitter.messages().len(), 5);
    assert_eq!(emitter.record_count(), 3);
    assert_eq!(emitter.records("leads").len(), 2);
    assert_eq!(emitter.schema_streams(), vec!["leads"]);
    assert_eq!(emitter.states().len(), 1);

    emitter.clear();
    assert!(emitter.messages().is_empty());
}

#[test]
fn test_message_deserializes_from_line() {
    let line = r#"{"type":"STATE","value":{"bookmarks":{"leads":"2024-01-01T00:00:00Z"},"currently_syncing":"leads"}}"#;
    let msg: Message = serde_json::from_str(line).unwrap();
    match msg {
        Message::State { value } => {
            assert_eq!(value.currently_syncing.as_deref(), Some("leads"));
        }
        other => panic!("expected state, got {other:?}"),
    }
}
