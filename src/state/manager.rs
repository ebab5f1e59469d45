//! State manager implementation
//!
//! Owns the checkpoint document for one run and rewrites the state file
//! wholesale, via a temporary file, after every mutation.

use super::types::State;
use crate::error::{Error, Result};
use crate::types::format_timestamp;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

/// State manager for persisting and loading state
#[derive(Debug, Clone, Default)]
pub struct StateManager {
    /// Path to the state file; `None` keeps state in memory only
    path: Option<PathBuf>,
    /// Current state
    state: State,
}

impl StateManager {
    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Create an in-memory manager starting from an existing document
    pub fn from_state(state: State) -> Self {
        Self { path: None, state }
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            if contents.trim().is_empty() {
                State::new()
            } else {
                serde_json::from_str(&contents)
                    .map_err(|e| Error::state(format!("Failed to parse state file: {e}")))?
            }
        } else {
            State::new()
        };

        Ok(Self {
            path: Some(path),
            state,
        })
    }

    /// Create a state manager from inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let state: State = serde_json::from_str(json)
            .map_err(|e| Error::state(format!("Failed to parse state JSON: {e}")))?;
        Ok(Self::from_state(state))
    }

    /// Current state
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Bookmark of a stream as a timestamp
    pub fn bookmark(&self, stream: &str) -> Option<DateTime<Utc>> {
        self.state.bookmark_timestamp(stream)
    }

    /// Advance a stream's bookmark and persist the document.
    ///
    /// The stored value never moves backwards: an older timestamp leaves the
    /// bookmark unchanged. The document is written either way. Returns
    /// whether the bookmark moved.
    pub async fn advance_bookmark(&mut self, stream: &str, value: DateTime<Utc>) -> Result<bool> {
        let moved = match self.bookmark(stream) {
            Some(current) => value > current,
            None => true,
        };
        if moved {
            self.state.set_bookmark(stream, format_timestamp(value));
        }
        self.save().await?;
        Ok(moved)
    }

    /// Record which stream is in progress (or none) and persist
    pub async fn set_currently_syncing(&mut self, stream: Option<&str>) -> Result<()> {
        self.state.currently_syncing = stream.map(ToString::to_string);
        self.save().await
    }

    /// Stream recorded as in progress by a previous, interrupted run
    pub fn currently_syncing(&self) -> Option<&str> {
        self.state.currently_syncing.as_deref()
    }

    /// Save current state to file
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let contents = serde_json::to_string_pretty(&self.state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))?;

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

        debug!("State written to {}", path.display());
        Ok(())
    }

    /// Export state as JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Get the state file path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}
