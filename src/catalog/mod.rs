//! Catalog module
//!
//! Discovery output and sync input: one entry per replicable stream with its
//! schema, key properties and selection metadata.
//!
//! # Features
//!
//! - **Base streams**: allow-listed entity sets, plus lookup tables on request
//! - **View streams**: saved and personal queries of leads, contacts and
//!   opportunities, layered on their parent stream
//! - **Round-tripping**: unknown metadata keys survive load and save

mod builder;
mod types;
mod views;

pub use builder::{discover, CatalogBuilder, BASE_ENTITY_SETS, LOOKUP_TABLE_MARKER};
pub use types::{Catalog, CatalogEntry, MetadataEntry, SelectedView, Selection, ViewOf};
pub use views::{clean_view_name, enumerate_views, ViewDescriptor, VIEW_PARENTS, VIEW_SCOPES};
