//! Catalog builder
//!
//! Runs schema inference over the allow-listed entity sets, then layers one
//! view stream per (parent, scope) pair that has at least one view.

use super::types::{Catalog, CatalogEntry, MetadataEntry, Selection, ViewOf};
use super::views::{enumerate_views, ViewDescriptor, VIEW_PARENTS, VIEW_SCOPES};
use crate::error::Result;
use crate::odata::{EntityMetadata, ODataSource};
use crate::schema::{infer_entity_schema, replication_method_for, view_stream_schema};
use crate::types::{Inclusion, ReplicationMethod};
use tracing::{debug, info};

/// Entity sets always exposed when the service has them
pub const BASE_ENTITY_SETS: &[&str] = &[
    "accounts",
    "campaigns",
    "leads",
    "savedqueries",
    "userqueries",
    "opportunities",
    "contacts",
    "transactioncurrencies",
    "salesorders",
    "systemusers",
    "msdyncrm_linkedinaccounts",
    "msdyncrm_linkedinactivities",
    "msdyncrm_linkedincampaigns",
    "msdyncrm_linkedinconfigurations",
    "msdyncrm_linkedinfieldmappings",
    "msdyncrm_linkedinformanswers",
    "msdyncrm_linkedinformquestions",
    "msdyncrm_linkedinforms",
    "msdyncrm_linkedinformsubmissions",
    "msdyncrm_linkedinleadmatchingstrategies",
    "msdyncrm_linkedinuserprofile_accountset",
    "msdyncrm_linkedinuserprofiles",
    "msdyncrm_msdyncrm_linkedinlms_fieldmappingset",
];

/// Case-sensitive marker identifying lookup-table entity sets
pub const LOOKUP_TABLE_MARKER: &str = "lkup";

/// Builds a catalog from a service's metadata
pub struct CatalogBuilder<'a> {
    source: &'a dyn ODataSource,
    include_lookup_tables: bool,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(source: &'a dyn ODataSource) -> Self {
        Self {
            source,
            include_lookup_tables: false,
        }
    }

    /// Also expose every entity set whose name contains the lookup marker
    #[must_use]
    pub fn include_lookup_tables(mut self, include: bool) -> Self {
        self.include_lookup_tables = include;
        self
    }

    fn is_exposed(&self, entity_set: &str) -> bool {
        BASE_ENTITY_SETS.contains(&entity_set)
            || (self.include_lookup_tables && entity_set.contains(LOOKUP_TABLE_MARKER))
    }

    /// Discover base streams first, then view streams on top of them
    pub async fn build(self) -> Result<Catalog> {
        let metadata = self.source.metadata().await?;
        let mut catalog = Catalog::default();

        for entity in metadata.entities() {
            if self.is_exposed(&entity.entity_set) {
                catalog.streams.push(entity_entry(entity));
            }
        }
        info!("Discovered {} entity streams", catalog.streams.len());

        let mut view_streams = Vec::new();
        for parent_name in VIEW_PARENTS {
            let Some(parent) = catalog.get_stream(parent_name) else {
                debug!("No '{}' stream, skipping its views", parent_name);
                continue;
            };
            let Some(entity) = metadata.entity(parent_name) else {
                continue;
            };
            if entity.properties.is_none() {
                info!("'{}' has no declared properties, skipping its views", parent_name);
                continue;
            }

            for &scope in VIEW_SCOPES {
                let views = enumerate_views(self.source, scope, &entity.entity_type).await?;
                if views.is_empty() {
                    continue;
                }
                let view_of = ViewOf {
                    parent: parent.tap_stream_id.clone(),
                    scope,
                };
                info!(
                    "Adding stream '{}' with {} views",
                    view_of.stream_id(),
                    views.len()
                );
                view_streams.push(view_entry(parent, view_of, &views));
            }
        }
        catalog.streams.extend(view_streams);

        Ok(catalog)
    }
}

/// Discover every stream the service exposes
pub async fn discover(source: &dyn ODataSource, include_lookup_tables: bool) -> Result<Catalog> {
    CatalogBuilder::new(source)
        .include_lookup_tables(include_lookup_tables)
        .build()
        .await
}

fn entity_entry(entity: &EntityMetadata) -> CatalogEntry {
    let inferred = infer_entity_schema(entity);

    let mut metadata: Vec<MetadataEntry> = inferred
        .field_metadata
        .iter()
        .map(|f| MetadataEntry::field(&f.name, f.inclusion))
        .collect();
    metadata.push(MetadataEntry::stream(true));

    CatalogEntry {
        stream: entity.entity_set.clone(),
        tap_stream_id: entity.entity_set.clone(),
        key_properties: inferred.key_properties,
        replication_method: Some(replication_method_for(&inferred.schema)),
        schema: inferred.schema,
        metadata,
        view_of: None,
    }
}

fn view_entry(parent: &CatalogEntry, view_of: ViewOf, views: &[ViewDescriptor]) -> CatalogEntry {
    let stream_id = view_of.stream_id();

    let mut metadata = vec![MetadataEntry::stream(true)];
    metadata.extend(
        parent
            .metadata
            .iter()
            .filter(|m| !m.breadcrumb.is_empty())
            .cloned(),
    );

    let field_names: Vec<String> = views.iter().map(ViewDescriptor::field_name).collect();
    for (view, field) in views.iter().zip(&field_names) {
        metadata.push(MetadataEntry {
            breadcrumb: vec!["properties".to_string(), field.clone()],
            metadata: Selection {
                inclusion: Some(Inclusion::Available),
                selected: Some(true),
                view_id: Some(view.view_id.clone()),
                ..Selection::default()
            },
        });
    }

    CatalogEntry {
        stream: stream_id.clone(),
        tap_stream_id: stream_id,
        key_properties: parent.key_properties.clone(),
        schema: view_stream_schema(field_names.iter().map(String::as_str)),
        metadata,
        replication_method: Some(ReplicationMethod::FullTable),
        view_of: Some(view_of),
    }
}
