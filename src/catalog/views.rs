//! View enumerator
//!
//! Lists the saved (system) and user (personal) query definitions that
//! return a given entity type.

use crate::error::Result;
use crate::odata::{Filter, ODataSource, Query};
use crate::types::{Row, ViewScope};
use tracing::{debug, warn};

/// Parent entity sets that get view streams, in catalog order
pub const VIEW_PARENTS: &[&str] = &["leads", "contacts", "opportunities"];

/// Scopes enumerated for every parent, in catalog order
pub const VIEW_SCOPES: &[ViewScope] = &[ViewScope::System, ViewScope::Personal];

/// A query definition targeting one entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDescriptor {
    /// Display name of the view
    pub name: String,
    /// `savedqueryid` or `userqueryid`
    pub view_id: String,
    pub scope: ViewScope,
}

impl ViewDescriptor {
    /// Pseudo-field name used for this view in the catalog
    pub fn field_name(&self) -> String {
        clean_view_name(&self.name)
    }

    fn from_row(row: &Row, scope: ViewScope) -> Option<Self> {
        let view_id = row.get(scope.id_attribute())?.as_str()?;
        let name = row.get("name").and_then(|v| v.as_str()).unwrap_or(view_id);
        Some(Self {
            name: name.to_string(),
            view_id: view_id.to_string(),
            scope,
        })
    }
}

/// Replace the characters that cannot appear in a pseudo-field name
pub fn clean_view_name(name: &str) -> String {
    name.replace([' ', ':'], "-")
}

/// Enumerate the views of one scope returning `entity_type`.
///
/// The matching definitions are materialized eagerly. A failing query is
/// logged and treated as "no views" unless the error is fatal.
pub async fn enumerate_views(
    source: &dyn ODataSource,
    scope: ViewScope,
    entity_type: &str,
) -> Result<Vec<ViewDescriptor>> {
    let query =
        Query::new(scope.collection()).filter(Filter::eq("returnedtypecode", entity_type));

    let rows = match source.collect(query).await {
        Ok(rows) => rows,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(
                "Could not list {} views for '{}' from {}: {}",
                scope,
                entity_type,
                scope.collection(),
                e
            );
            return Ok(Vec::new());
        }
    };

    let views: Vec<ViewDescriptor> = rows
        .iter()
        .filter_map(|row| {
            let view = ViewDescriptor::from_row(row, scope);
            if view.is_none() {
                debug!("Skipping {} row without {}", scope.collection(), scope.id_attribute());
            }
            view
        })
        .collect();

    debug!("Found {} {} views for '{}'", views.len(), scope, entity_type);
    Ok(views)
}
