//! Engine types
//!
//! Per-stream lifecycle and run statistics for the sync engine.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Number of records between intermediate checkpoints
pub const CHECKPOINT_INTERVAL: usize = 5000;

/// Lifecycle of one stream within a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Nothing written yet
    Pending,
    /// Schema written, no query issued
    SchemaEmitted,
    /// Rows being read and emitted
    Extracting,
    /// Intermediate checkpoint written; extraction resumes
    Checkpointed,
    /// Final checkpoint written
    Done,
}

impl StreamPhase {
    /// Check whether `next` may follow this phase
    pub fn can_transition_to(self, next: StreamPhase) -> bool {
        use StreamPhase::{Checkpointed, Done, Extracting, Pending, SchemaEmitted};
        matches!(
            (self, next),
            (Pending, SchemaEmitted)
                | (SchemaEmitted, Extracting)
                | (Extracting, Checkpointed)
                | (Checkpointed, Extracting)
                | (Extracting | Checkpointed, Done)
        )
    }
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamPhase::Pending => write!(f, "PENDING"),
            StreamPhase::SchemaEmitted => write!(f, "SCHEMA_EMITTED"),
            StreamPhase::Extracting => write!(f, "EXTRACTING"),
            StreamPhase::Checkpointed => write!(f, "CHECKPOINTED"),
            StreamPhase::Done => write!(f, "DONE"),
        }
    }
}

/// Tracks one stream through its phases
#[derive(Debug, Clone)]
pub struct StreamRun {
    stream: String,
    phase: StreamPhase,
    records: usize,
}

impl StreamRun {
    /// Start a stream in `Pending`
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            phase: StreamPhase::Pending,
            records: 0,
        }
    }

    /// Move to the next phase, rejecting transitions the lifecycle forbids
    pub fn advance(&mut self, next: StreamPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                stream: self.stream.clone(),
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Count one emitted record
    pub fn add_record(&mut self) {
        self.records += 1;
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Records emitted per output stream
    pub records: BTreeMap<String, usize>,
    /// Streams that completed
    pub streams_synced: usize,
    /// Streams that failed and were skipped
    pub streams_failed: Vec<String>,
    /// Views that could not be executed
    pub views_skipped: usize,
    /// Checkpoints written
    pub checkpoints: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records for an output stream
    pub fn add_records(&mut self, stream: &str, count: usize) {
        *self.records.entry(stream.to_string()).or_default() += count;
    }

    /// Add a completed stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add a failed stream
    pub fn add_failure(&mut self, stream: &str) {
        self.streams_failed.push(stream.to_string());
    }

    /// Add a skipped view
    pub fn add_skipped_view(&mut self) {
        self.views_skipped += 1;
    }

    /// Add a checkpoint write
    pub fn add_checkpoint(&mut self) {
        self.checkpoints += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }

    /// Records emitted across all streams
    pub fn total_records(&self) -> usize {
        self.records.values().sum()
    }

    /// Log the end-of-run summary
    pub fn log_summary(&self) {
        for (stream, count) in &self.records {
            info!(stream = %stream, records = count, "Stream summary");
        }
        info!(
            streams_synced = self.streams_synced,
            streams_failed = self.streams_failed.len(),
            views_skipped = self.views_skipped,
            records = self.total_records(),
            duration_ms = self.duration_ms,
            "Sync finished"
        );
    }
}
