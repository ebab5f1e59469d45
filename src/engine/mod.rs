//! Execution engine module
//!
//! Replicates the selected streams of a catalog, one at a time, in catalog
//! order.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - runs every selected stream and owns the checkpoint
//! - `StreamPhase` / `StreamRun` - the per-stream lifecycle
//! - `RecordTransformer` - projection and type coercion of rows
//! - `SyncStats` - counters logged at the end of a run
//!
//! # Modes
//!
//! - **Incremental**: rows modified after the bookmark, ascending by
//!   modification time, checkpointed every [`CHECKPOINT_INTERVAL`] records
//! - **Full table**: every row, bookmark ignored
//! - **Views**: one query per selected saved or personal view of the parent

mod transform;
mod types;

pub use transform::{view_record, RecordTransformer};
pub use types::{StreamPhase, StreamRun, SyncStats, CHECKPOINT_INTERVAL};

use crate::catalog::{Catalog, CatalogEntry, ViewOf};
use crate::error::Result;
use crate::odata::{Filter, ODataSource, Query, SortOrder};
use crate::output::Emitter;
use crate::schema::{infer_view_row_schema, replication_method_for, LAST_MODIFIED_FIELD};
use crate::state::StateManager;
use crate::types::{parse_timestamp, ReplicationMethod};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine<'a, E: Emitter> {
    /// Query execution
    source: &'a dyn ODataSource,
    /// Output sink
    emitter: E,
    /// State manager
    state: StateManager,
    /// Bookmark used for streams without one
    start_date: DateTime<Utc>,
    /// Records between intermediate checkpoints
    checkpoint_interval: usize,
    /// Statistics
    stats: SyncStats,
}

impl<'a, E: Emitter> SyncEngine<'a, E> {
    /// Create a new sync engine
    pub fn new(
        source: &'a dyn ODataSource,
        emitter: E,
        state: StateManager,
        start_date: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            emitter,
            state,
            start_date,
            checkpoint_interval: CHECKPOINT_INTERVAL,
            stats: SyncStats::default(),
        }
    }

    /// Override the number of records between checkpoints
    #[must_use]
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get the emitter
    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Release the emitter and the final state
    pub fn into_parts(self) -> (E, StateManager) {
        (self.emitter, self.state)
    }

    /// Sync every selected stream of the catalog.
    ///
    /// A failure scoped to one stream is logged and the run continues.
    /// Fatal errors abort the run.
    pub async fn run(&mut self, catalog: &Catalog) -> Result<SyncStats> {
        let start = Instant::now();

        if let Some(interrupted) = self.state.currently_syncing() {
            warn!(stream = %interrupted, "Previous run was interrupted while syncing this stream");
        }

        for entry in catalog.selected_streams() {
            let stream = entry.tap_stream_id.as_str();
            self.state.set_currently_syncing(Some(stream)).await?;
            self.emitter.emit_state(self.state.state())?;

            info!(stream, "Starting sync");
            match self.sync_entry(catalog, entry).await {
                Ok(records) => {
                    self.stats.add_stream();
                    info!(stream, records, "Completed sync");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(stream, error = %e, "Stream failed, skipping");
                    self.stats.add_failure(stream);
                }
            }
        }

        self.state.set_currently_syncing(None).await?;
        self.emitter.emit_state(self.state.state())?;

        self.stats.set_duration(start.elapsed().as_millis() as u64);
        self.stats.log_summary();
        Ok(self.stats.clone())
    }

    /// Sync one catalog entry in the mode its catalog entry calls for
    pub async fn sync_entry(&mut self, catalog: &Catalog, entry: &CatalogEntry) -> Result<usize> {
        if let Some(target) = entry.view_target() {
            return self.sync_views(catalog, entry, &target).await;
        }

        let method = entry
            .replication_method
            .unwrap_or_else(|| replication_method_for(&entry.schema));
        match method {
            ReplicationMethod::Incremental => self.sync_incremental(entry).await,
            ReplicationMethod::FullTable => self.sync_full_table(entry).await,
        }
    }

    /// Timestamp-filtered extraction, ascending by modification time.
    ///
    /// Without a stored bookmark the query starts at the start date
    /// inclusively. With one it resumes strictly after it. Intermediate
    /// checkpoints only cover timestamps every row of which has been
    /// emitted, so an interrupted run may re-emit rows but never skips them.
    async fn sync_incremental(&mut self, entry: &CatalogEntry) -> Result<usize> {
        let stream = entry.tap_stream_id.as_str();
        let persisted = self.state.bookmark(stream);
        let filter = match persisted {
            Some(bookmark) => Filter::gt(LAST_MODIFIED_FIELD, bookmark),
            None => Filter::ge(LAST_MODIFIED_FIELD, self.start_date),
        };
        debug!(stream, bookmark = ?persisted, start_date = %self.start_date, "Incremental query");

        let query = Query::new(&entry.stream)
            .filter(filter)
            .order_by(LAST_MODIFIED_FIELD, SortOrder::Asc);

        let transformer = RecordTransformer::new(entry);
        let mut run = StreamRun::new(stream);
        self.emitter
            .emit_schema(stream, transformer.schema(), &entry.key_properties)?;
        run.advance(StreamPhase::SchemaEmitted)?;

        let source = self.source;
        let mut rows = source.query(query);
        run.advance(StreamPhase::Extracting)?;

        let mut max_seen: Option<DateTime<Utc>> = None;
        let mut completed_below: Option<DateTime<Utc>> = None;

        while let Some(row) = rows.try_next().await? {
            let modified = row
                .get(LAST_MODIFIED_FIELD)
                .and_then(|v| v.as_str())
                .and_then(parse_timestamp);
            if let Some(ts) = modified {
                match max_seen {
                    Some(max) if ts <= max => {}
                    Some(max) => {
                        completed_below = Some(max);
                        max_seen = Some(ts);
                    }
                    None => max_seen = Some(ts),
                }
            }

            self.emitter
                .emit_record(stream, transformer.transform(stream, &row))?;
            run.add_record();

            if run.records() % self.checkpoint_interval == 0 {
                self.checkpoint(stream, completed_below).await?;
                run.advance(StreamPhase::Checkpointed)?;
                debug!(stream, records = run.records(), "Checkpoint written");
                run.advance(StreamPhase::Extracting)?;
            }
        }

        self.checkpoint(stream, max_seen).await?;
        run.advance(StreamPhase::Done)?;
        self.stats.add_records(stream, run.records());
        Ok(run.records())
    }

    /// Read every row; the bookmark is neither used nor advanced
    async fn sync_full_table(&mut self, entry: &CatalogEntry) -> Result<usize> {
        let stream = entry.tap_stream_id.as_str();
        let transformer = RecordTransformer::new(entry);
        let mut run = StreamRun::new(stream);

        self.emitter
            .emit_schema(stream, transformer.schema(), &entry.key_properties)?;
        run.advance(StreamPhase::SchemaEmitted)?;

        let source = self.source;
        let mut rows = source.query(Query::new(&entry.stream));
        run.advance(StreamPhase::Extracting)?;

        while let Some(row) = rows.try_next().await? {
            self.emitter
                .emit_record(stream, transformer.transform(stream, &row))?;
            run.add_record();
        }

        self.checkpoint(stream, None).await?;
        run.advance(StreamPhase::Done)?;
        self.stats.add_records(stream, run.records());
        Ok(run.records())
    }

    /// Execute every selected view of a view stream.
    ///
    /// Each view is emitted as its own stream, `"<view> (<parent>)"`, with a
    /// schema inferred from the rows it returned. A view that fails or no
    /// longer exists is skipped.
    async fn sync_views(
        &mut self,
        catalog: &Catalog,
        entry: &CatalogEntry,
        target: &ViewOf,
    ) -> Result<usize> {
        let key_properties = catalog
            .get_stream(&target.parent)
            .map_or_else(|| entry.key_properties.clone(), |parent| parent.key_properties.clone());

        let views = entry.selected_views();
        if views.is_empty() {
            info!(stream = %entry.tap_stream_id, "No views selected");
        }

        let mut total = 0;
        for view in views {
            let query = Query::new(&target.parent).raw(target.scope.query_param(), &view.view_id);
            let rows = match self.source.collect(query).await {
                Ok(rows) => rows,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(view = %view.name, view_id = %view.view_id, error = %e, "View could not be executed, skipping");
                    self.stats.add_skipped_view();
                    continue;
                }
            };

            let stream_name = format!("{} ({})", view.name, target.parent);
            if rows.is_empty() {
                info!(stream = %stream_name, "View returned no rows");
                continue;
            }

            let row_schema = infer_view_row_schema(&rows);
            let mut run = StreamRun::new(&stream_name);
            self.emitter
                .emit_schema(&stream_name, &row_schema.schema, &key_properties)?;
            run.advance(StreamPhase::SchemaEmitted)?;
            run.advance(StreamPhase::Extracting)?;

            for row in &rows {
                self.emitter
                    .emit_record(&stream_name, view_record(&row_schema.fields, row))?;
                run.add_record();
            }

            run.advance(StreamPhase::Done)?;
            self.stats.add_records(&stream_name, run.records());
            total += run.records();
        }

        self.checkpoint(&entry.tap_stream_id, None).await?;
        Ok(total)
    }

    /// Persist and emit the checkpoint, advancing the bookmark when given
    async fn checkpoint(&mut self, stream: &str, bookmark: Option<DateTime<Utc>>) -> Result<()> {
        match bookmark {
            Some(value) => {
                self.state.advance_bookmark(stream, value).await?;
            }
            None => self.state.save().await?,
        }
        self.emitter.emit_state(self.state.state())?;
        self.stats.add_checkpoint();
        Ok(())
    }
}
