use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::property::{Properties, PropertyKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    Single,
    Multi,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Updatability {
    ReadOnly,
    ReadWrite,
    WhenCheckedOut,
    OnCreate,
}

/// Declared schema of one property of a type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub id: String,
    #[serde(default)]
    pub local_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub property_type: PropertyKind,
    pub cardinality: Cardinality,
    pub updatability: Updatability,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub queryable: bool,
    #[serde(default)]
    pub inherited: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinition {
    pub id: String,
    #[serde(default)]
    pub local_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub base_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub creatable: bool,
    #[serde(default)]
    pub fileable: bool,
    #[serde(default)]
    pub queryable: bool,
    /// Keyed by property id, in the order the server listed them.
    #[serde(default)]
    pub property_definitions: IndexMap<String, PropertyDefinition>,
}

impl TypeDefinition {
    pub fn property_definition(&self, id: &str) -> Option<&PropertyDefinition> {
        self.property_definitions.get(id)
    }

    /// Ids of required properties missing from `properties`.
    pub fn missing_required<'a>(&'a self, properties: &Properties) -> Vec<&'a str> {
        self.property_definitions
            .values()
            .filter(|definition| definition.required && !properties.contains_key(&definition.id))
            .map(|definition| definition.id.as_str())
            .collect()
    }
}
