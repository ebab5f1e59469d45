//! In-memory [`ODataSource`] for tests

use super::metadata::{EntityMetadata, EntityProperty, ServiceMetadata};
use super::query::{Filter, Query, SortOrder};
use super::service::{ODataSource, RowStream};
use crate::error::{Error, Result};
use crate::types::{parse_timestamp, JsonValue, Row};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

/// Build entity metadata from `(name, type, is_key)` triples
pub fn entity(entity_set: &str, entity_type: &str, props: &[(&str, &str, bool)]) -> EntityMetadata {
    EntityMetadata {
        entity_set: entity_set.to_string(),
        entity_type: entity_type.to_string(),
        properties: Some(
            props
                .iter()
                .map(|(name, ty, key)| EntityProperty::new(*name, *ty, *key))
                .collect(),
        ),
        navigation_properties: Vec::new(),
    }
}

/// Convert a `json!` object into a row
pub fn row(value: JsonValue) -> Row {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("row must be an object, got {other}"),
    }
}

/// Serves fixed rows and records every query it receives
#[derive(Default)]
pub struct MemorySource {
    metadata: ServiceMetadata,
    entities: Vec<EntityMetadata>,
    rows: HashMap<String, Vec<Row>>,
    views: HashMap<String, Vec<Row>>,
    failing: HashSet<String>,
    unauthorized: HashSet<String>,
    queries: Mutex<Vec<Query>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, metadata: EntityMetadata, rows: Vec<Row>) -> Self {
        self.rows.insert(metadata.entity_set.clone(), rows);
        self.entities.push(metadata);
        self.metadata = ServiceMetadata::from_entities(self.entities.clone());
        self
    }

    /// Rows returned when a view with this id is executed
    pub fn with_view(mut self, view_id: &str, rows: Vec<Row>) -> Self {
        self.views.insert(view_id.to_string(), rows);
        self
    }

    /// Make every query against this entity set fail with a server error
    pub fn failing(mut self, entity_set: &str) -> Self {
        self.failing.insert(entity_set.to_string());
        self
    }

    /// Make every query against this entity set fail as if the refresh
    /// token had been revoked
    pub fn unauthorized(mut self, entity_set: &str) -> Self {
        self.unauthorized.insert(entity_set.to_string());
        self
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn execute(&self, query: &Query) -> Result<Vec<Row>> {
        if self.unauthorized.contains(&query.entity_set) {
            return Err(Error::TokenRefresh {
                message: "status 400: invalid_grant".to_string(),
            });
        }
        if self.failing.contains(&query.entity_set) {
            return Err(Error::http_status(500, "simulated failure"));
        }
        self.metadata.require(&query.entity_set)?;

        if let Some((_, view_id)) = query
            .raw
            .iter()
            .find(|(k, _)| k == "savedQuery" || k == "userQuery")
        {
            return self
                .views
                .get(view_id)
                .cloned()
                .ok_or_else(|| Error::http_status(404, format!("view {view_id} not found")));
        }

        let mut rows: Vec<Row> = self
            .rows
            .get(&query.entity_set)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|row| query.filters.iter().all(|f| matches(row, f)))
            .collect();

        if let Some((field, order)) = &query.order_by {
            rows.sort_by_key(|row| row.get(field).and_then(|v| v.as_str()).and_then(parse_timestamp));
            if *order == SortOrder::Desc {
                rows.reverse();
            }
        }
        Ok(rows)
    }
}

fn matches(row: &Row, filter: &Filter) -> bool {
    let text = |field: &str| row.get(field).and_then(|v| v.as_str());
    match filter {
        Filter::Eq { field, value } => text(field) == Some(value.as_str()),
        Filter::Ge { field, value } => text(field)
            .and_then(parse_timestamp)
            .is_some_and(|ts| ts >= *value),
        Filter::Gt { field, value } => text(field)
            .and_then(parse_timestamp)
            .is_some_and(|ts| ts > *value),
    }
}

#[async_trait]
impl ODataSource for MemorySource {
    async fn metadata(&self) -> Result<&ServiceMetadata> {
        Ok(&self.metadata)
    }

    fn query(&self, query: Query) -> RowStream<'_> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).push(query.clone());
        match self.execute(&query) {
            Ok(rows) => stream::iter(rows.into_iter().map(Ok)).boxed(),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }
}
