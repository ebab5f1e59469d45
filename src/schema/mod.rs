//! Schema inference module
//!
//! Converts entity metadata into portable, always-nullable JSON schemas and
//! builds the permissive schemas used for saved-query views.

mod inference;
mod types;

pub use inference::{
    infer_entity_schema, infer_view_row_schema, json_type_for, replication_method_for,
    view_stream_schema, FieldMetadata, InferredSchema, ViewRowSchema, ETAG_FIELD,
    LAST_MODIFIED_FIELD,
};
pub use types::{JsonSchema, JsonType, JsonTypeOrArray, SchemaProperty};

#[cfg(test)]
mod tests;
