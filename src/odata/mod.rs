//! OData access layer
//!
//! - [`metadata`]: CSDL `$metadata` parsing into entity property lists
//! - [`query`]: filter / ordering / raw parameter builder
//! - [`service`]: the [`ODataSource`] seam and its HTTP implementation

pub mod metadata;
pub mod query;
pub mod service;

#[cfg(test)]
pub(crate) mod memory;

pub use metadata::{EntityMetadata, EntityProperty, ServiceMetadata};
pub use query::{Filter, Query, SortOrder};
pub use service::{DynamicsService, ODataSource, RowStream};
