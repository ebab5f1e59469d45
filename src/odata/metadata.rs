//! Entity metadata adapter
//!
//! Parses the CSDL document served at `$metadata` into per-entity-set
//! property lists. Entity types are resolved through `BaseType` chains so
//! inherited properties and keys are reported on the derived type.

use crate::error::{Error, Result};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::HashMap;

/// Maximum depth followed through `BaseType` references
const MAX_INHERITANCE_DEPTH: usize = 16;

/// One declared property of an entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityProperty {
    /// Attribute name as used in rows and queries
    pub name: String,
    /// EDM type tag, e.g. `Edm.DateTimeOffset`
    pub odata_type: String,
    /// Whether the property is part of the entity key
    pub is_primary_key: bool,
}

impl EntityProperty {
    pub fn new(name: impl Into<String>, odata_type: impl Into<String>, is_primary_key: bool) -> Self {
        Self {
            name: name.into(),
            odata_type: odata_type.into(),
            is_primary_key,
        }
    }
}

/// Metadata of one entity set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    /// Entity set (collection) name, e.g. `accounts`
    pub entity_set: String,
    /// Unqualified entity type name, e.g. `account`
    pub entity_type: String,
    /// Declared properties; `None` when the type declares none at all
    pub properties: Option<Vec<EntityProperty>>,
    /// Navigation property names
    pub navigation_properties: Vec<String>,
}

impl EntityMetadata {
    /// Check whether a property with the given name is declared
    pub fn has_property(&self, name: &str) -> bool {
        self.properties
            .as_ref()
            .is_some_and(|props| props.iter().any(|p| p.name == name))
    }
}

/// Parsed service model: every entity set in container order
#[derive(Debug, Clone, Default)]
pub struct ServiceMetadata {
    entities: Vec<EntityMetadata>,
    index: HashMap<String, usize>,
}

impl ServiceMetadata {
    /// Build a model from already resolved entity sets
    pub fn from_entities(entities: Vec<EntityMetadata>) -> Self {
        let index = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.entity_set.clone(), i))
            .collect();
        Self { entities, index }
    }

    /// Parse a CSDL document
    pub fn parse(xml: &str) -> Result<Self> {
        let edmx: Edmx = from_str(xml)
            .map_err(|e| Error::metadata(format!("Invalid CSDL document: {e}")))?;

        let types: HashMap<&str, &CsdlEntityType> = edmx
            .data_services
            .schemas
            .iter()
            .flat_map(|s| s.entity_types.iter())
            .map(|t| (t.name.as_str(), t))
            .collect();

        let mut entities = Vec::new();
        for set in edmx
            .data_services
            .schemas
            .iter()
            .flat_map(|s| s.containers.iter())
            .flat_map(|c| c.entity_sets.iter())
        {
            let type_name = unqualified(&set.entity_type);
            let Some(entity_type) = types.get(type_name) else {
                return Err(Error::metadata(format!(
                    "Entity set '{}' references unknown type '{}'",
                    set.name, set.entity_type
                )));
            };
            entities.push(resolve(&set.name, entity_type, &types));
        }

        Ok(Self::from_entities(entities))
    }

    /// Look up an entity set by name
    pub fn entity(&self, entity_set: &str) -> Option<&EntityMetadata> {
        self.index.get(entity_set).map(|&i| &self.entities[i])
    }

    /// Look up an entity set, failing when it is not exposed by the service
    pub fn require(&self, entity_set: &str) -> Result<&EntityMetadata> {
        self.entity(entity_set)
            .ok_or_else(|| Error::entity_not_found(entity_set))
    }

    /// All entity sets in container order
    pub fn entities(&self) -> impl Iterator<Item = &EntityMetadata> {
        self.entities.iter()
    }

    /// Number of entity sets
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the service exposes no entity sets
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Strip the namespace or alias qualifier from a type reference
fn unqualified(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn resolve(
    entity_set: &str,
    entity_type: &CsdlEntityType,
    types: &HashMap<&str, &CsdlEntityType>,
) -> EntityMetadata {
    // Base-most type first so inherited properties keep declaration order
    let mut chain = vec![entity_type];
    let mut current = entity_type;
    while let Some(base) = current.base_type.as_deref() {
        if chain.len() >= MAX_INHERITANCE_DEPTH {
            break;
        }
        match types.get(unqualified(base)) {
            Some(parent) => {
                chain.push(parent);
                current = parent;
            }
            None => break,
        }
    }
    chain.reverse();

    // The most derived type declaring a key wins
    let keys: Vec<&str> = chain
        .iter()
        .rev()
        .find_map(|t| t.key.as_ref())
        .map(|k| k.refs.iter().map(|r| r.name.as_str()).collect())
        .unwrap_or_default();

    let declared: Vec<EntityProperty> = chain
        .iter()
        .flat_map(|t| t.properties.iter())
        .map(|p| EntityProperty::new(&p.name, &p.odata_type, keys.contains(&p.name.as_str())))
        .collect();

    let navigation_properties = chain
        .iter()
        .flat_map(|t| t.navigation_properties.iter())
        .map(|n| n.name.clone())
        .collect();

    EntityMetadata {
        entity_set: entity_set.to_string(),
        entity_type: entity_type.name.clone(),
        properties: if declared.is_empty() {
            None
        } else {
            Some(declared)
        },
        navigation_properties,
    }
}

// CSDL XML structures for deserialization

#[derive(Debug, Deserialize)]
struct Edmx {
    #[serde(rename = "DataServices", alias = "edmx:DataServices")]
    data_services: DataServices,
}

#[derive(Debug, Deserialize)]
struct DataServices {
    #[serde(rename = "Schema", default)]
    schemas: Vec<CsdlSchema>,
}

#[derive(Debug, Deserialize)]
struct CsdlSchema {
    #[serde(rename = "EntityType", default)]
    entity_types: Vec<CsdlEntityType>,

    #[serde(rename = "EntityContainer", default)]
    containers: Vec<CsdlEntityContainer>,
}

#[derive(Debug, Deserialize)]
struct CsdlEntityType {
    #[serde(rename = "@Name")]
    name: String,

    #[serde(rename = "@BaseType", default)]
    base_type: Option<String>,

    #[serde(rename = "Key", default)]
    key: Option<CsdlKey>,

    #[serde(rename = "Property", default)]
    properties: Vec<CsdlProperty>,

    #[serde(rename = "NavigationProperty", default)]
    navigation_properties: Vec<CsdlNavigationProperty>,
}

#[derive(Debug, Deserialize)]
struct CsdlKey {
    #[serde(rename = "PropertyRef", default)]
    refs: Vec<CsdlPropertyRef>,
}

#[derive(Debug, Deserialize)]
struct CsdlPropertyRef {
    #[serde(rename = "@Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct CsdlProperty {
    #[serde(rename = "@Name")]
    name: String,

    #[serde(rename = "@Type")]
    odata_type: String,
}

#[derive(Debug, Deserialize)]
struct CsdlNavigationProperty {
    #[serde(rename = "@Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct CsdlEntityContainer {
    #[serde(rename = "EntitySet", default)]
    entity_sets: Vec<CsdlEntitySet>,
}

#[derive(Debug, Deserialize)]
struct CsdlEntitySet {
    #[serde(rename = "@Name")]
    name: String,

    #[serde(rename = "@EntityType")]
    entity_type: String,
}
