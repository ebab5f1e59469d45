//! Message emitters
//!
//! Every emit is an ordered, append-only write. The JSON-lines emitter
//! flushes after each message so a consumer sees a state message as soon as
//! the checkpoint it describes has been persisted.

use super::message::Message;
use crate::error::{Error, Result};
use crate::schema::JsonSchema;
use crate::state::State;
use crate::types::JsonObject;
use chrono::Utc;
use std::io::Write;

/// Sink for schema, record and state messages
pub trait Emitter: Send {
    /// Write one message
    fn emit(&mut self, message: Message) -> Result<()>;

    /// Describe a stream before its first record
    fn emit_schema(&mut self, stream: &str, schema: &JsonSchema, key_properties: &[String]) -> Result<()> {
        self.emit(Message::schema(stream, schema.clone(), key_properties.to_vec()))
    }

    /// Write one record, stamped with the extraction time
    fn emit_record(&mut self, stream: &str, record: JsonObject) -> Result<()> {
        self.emit(Message::record(stream, record, Utc::now()))
    }

    /// Write the whole checkpoint document
    fn emit_state(&mut self, state: &State) -> Result<()> {
        self.emit(Message::state(state.clone()))
    }
}

/// Writes one JSON document per line
pub struct JsonLinesEmitter<W: Write + Send> {
    writer: W,
}

impl JsonLinesEmitter<std::io::Stdout> {
    /// Emitter writing to standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesEmitter<W> {
    /// Create an emitter over any writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Emitter for JsonLinesEmitter<W> {
    fn emit(&mut self, message: Message) -> Result<()> {
        let line = serde_json::to_string(&message)
            .map_err(|e| Error::output(format!("Failed to serialize message: {e}")))?;
        writeln!(self.writer, "{line}")
            .and_then(|()| self.writer.flush())
            .map_err(|e| Error::output(format!("Failed to write message: {e}")))
    }
}

impl<W: Write + Send> std::fmt::Debug for JsonLinesEmitter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesEmitter").finish_non_exhaustive()
    }
}

/// Collects messages in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryEmitter {
    messages: Vec<Message>,
}

impl MemoryEmitter {
    /// Create an empty emitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message in emission order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Records emitted for one stream
    pub fn records(&self, stream: &str) -> Vec<&JsonObject> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Record { stream: s, record, .. } if s == stream => Some(record),
                _ => None,
            })
            .collect()
    }

    /// Total records emitted across streams
    pub fn record_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_record()).count()
    }

    /// Names of streams a schema was emitted for, in order
    pub fn schema_streams(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.is_schema())
            .filter_map(Message::stream)
            .collect()
    }

    /// Checkpoint documents in emission order
    pub fn states(&self) -> Vec<&State> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::State { value } => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Drop everything collected so far
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Emitter for MemoryEmitter {
    fn emit(&mut self, message: Message) -> Result<()> {
        self.messages.push(message);
        Ok(())
    }
}
