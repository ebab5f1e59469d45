//! Output module
//!
//! Emits the record stream consumed by downstream pipelines.
//!
//! # Overview
//!
//! This module provides:
//! - `Message` - SCHEMA, RECORD and STATE messages
//! - `Emitter` - the sink the replication engine writes to
//! - `JsonLinesEmitter` - one JSON document per line (stdout in the binary)
//! - `MemoryEmitter` - collects messages for inspection

mod emitter;
mod message;

pub use emitter::{Emitter, JsonLinesEmitter, MemoryEmitter};
pub use message::Message;

#[cfg(test)]
mod tests;
