//! Replication state
//!
//! The state document carries one bookmark per incremental stream (the
//! highest `modifiedon` fully emitted) and the stream a run was working on
//! when it last checkpointed. [`StateManager`] owns the document, keeps
//! bookmarks from moving backwards, and rewrites the state file atomically
//! after every change.

mod manager;
mod types;

pub use manager::StateManager;
pub use types::State;
