//! Catalog document types

use crate::error::{Error, Result};
use crate::schema::JsonSchema;
use crate::types::{Inclusion, JsonValue, ReplicationMethod, ViewScope};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Discovered catalog (available streams)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Streams in discovery order
    pub streams: Vec<CatalogEntry>,
}

impl Catalog {
    /// Read a catalog file; an unreadable catalog aborts the run
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::catalog(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    /// Parse a catalog document
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| Error::catalog(format!("Invalid catalog: {e}")))
    }

    /// Look up a stream by id
    pub fn get_stream(&self, tap_stream_id: &str) -> Option<&CatalogEntry> {
        self.streams
            .iter()
            .find(|s| s.tap_stream_id == tap_stream_id)
    }

    /// Streams selected at the stream level, in catalog order
    pub fn selected_streams(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.streams.iter().filter(|s| s.is_selected())
    }

    /// Pretty JSON document as written by `--discover`
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Stream in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stream name
    pub stream: String,

    /// Stable stream identifier
    pub tap_stream_id: String,

    /// Primary key properties, possibly empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub key_properties: Vec<String>,

    /// JSON schema for the stream
    #[serde(default)]
    pub schema: JsonSchema,

    /// Stream and field level metadata
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,

    /// Extraction strategy fixed at discovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_method: Option<ReplicationMethod>,

    /// Parent entity and scope of a saved-query view stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_of: Option<ViewOf>,
}

impl CatalogEntry {
    /// Metadata attached to the stream itself (empty breadcrumb)
    pub fn stream_metadata(&self) -> Option<&Selection> {
        self.metadata
            .iter()
            .find(|m| m.breadcrumb.is_empty())
            .map(|m| &m.metadata)
    }

    /// Metadata attached to one property
    pub fn field_metadata(&self, field: &str) -> Option<&Selection> {
        self.metadata
            .iter()
            .find(|m| m.field_name() == Some(field))
            .map(|m| &m.metadata)
    }

    /// Whether the stream is selected for sync
    pub fn is_selected(&self) -> bool {
        self.stream_metadata()
            .and_then(|m| m.selected)
            .unwrap_or(false)
    }

    /// Whether a property is emitted: automatic fields always are,
    /// others unless explicitly deselected
    pub fn is_field_selected(&self, field: &str) -> bool {
        match self.field_metadata(field) {
            Some(m) if m.inclusion == Some(Inclusion::Automatic) => true,
            Some(m) => m.selected != Some(false),
            None => true,
        }
    }

    /// Parent entity of a view stream.
    ///
    /// Catalogs written without `view_of` are recognised by their stream id.
    pub fn view_target(&self) -> Option<ViewOf> {
        self.view_of
            .clone()
            .or_else(|| ViewOf::from_stream_id(&self.tap_stream_id))
    }

    /// Views selected in this stream's field metadata, in catalog order
    pub fn selected_views(&self) -> Vec<SelectedView> {
        self.metadata
            .iter()
            .filter(|m| !m.breadcrumb.is_empty() && m.metadata.selected == Some(true))
            .filter_map(|m| {
                let view_id = m.metadata.view_id.clone()?;
                let name = m.breadcrumb.last()?.clone();
                Some(SelectedView { name, view_id })
            })
            .collect()
    }
}

/// A view chosen for extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedView {
    /// Pseudo-field name derived from the view's display name
    pub name: String,
    /// Saved or user query identifier
    pub view_id: String,
}

/// Back-reference from a view stream to its parent entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewOf {
    /// Parent entity set
    pub parent: String,
    /// Owning scope of the views
    pub scope: ViewScope,
}

impl ViewOf {
    /// Stream id of the view stream for a parent and scope
    pub fn stream_id(&self) -> String {
        match self.scope {
            ViewScope::System => format!("view_{}", self.parent),
            ViewScope::Personal => format!("view_personal_{}", self.parent),
        }
    }

    /// Recover parent and scope from a `view_*` stream id
    pub fn from_stream_id(stream_id: &str) -> Option<Self> {
        let rest = stream_id.strip_prefix("view_")?;
        let (parent, scope) = match rest.strip_prefix("personal_") {
            Some(parent) => (parent, ViewScope::Personal),
            None => (rest, ViewScope::System),
        };
        (!parent.is_empty()).then(|| Self {
            parent: parent.to_string(),
            scope,
        })
    }
}

/// One metadata entry: a breadcrumb path and its annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// `[]` for the stream, `["properties", <field>]` for a property
    pub breadcrumb: Vec<String>,
    pub metadata: Selection,
}

impl MetadataEntry {
    /// Stream-level entry
    pub fn stream(selected: bool) -> Self {
        Self {
            breadcrumb: Vec::new(),
            metadata: Selection {
                selected: Some(selected),
                ..Selection::default()
            },
        }
    }

    /// Property-level entry
    pub fn field(name: impl Into<String>, inclusion: Inclusion) -> Self {
        Self {
            breadcrumb: vec!["properties".to_string(), name.into()],
            metadata: Selection {
                inclusion: Some(inclusion),
                ..Selection::default()
            },
        }
    }

    /// Property name for a property-level entry
    pub fn field_name(&self) -> Option<&str> {
        match self.breadcrumb.as_slice() {
            [properties, name] if properties == "properties" => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Annotations of a metadata entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion: Option<Inclusion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,

    /// Identifier of the saved or user query behind a view pseudo-field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<String>,

    /// Annotations this tap does not interpret, kept verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
