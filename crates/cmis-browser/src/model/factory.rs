use serde_json::Value;

use crate::error::{CmisError, CmisResult};
use crate::model::context::RepositoryContext;
use crate::model::object::{BaseType, CmisObject, ObjectCore};
use crate::model::{Document, Folder, Item, Policy, Relationship};
use crate::property::{self, PropertyValue, properties_from_object_json};

/// Materializes an object payload as the variant named by its `cmis:baseTypeId`.
pub fn create_object(context: &RepositoryContext, raw: &Value) -> CmisResult<CmisObject> {
    let properties = properties_from_object_json(raw)?;
    let base_type_id = properties
        .get(property::BASE_TYPE_ID)
        .and_then(PropertyValue::as_str)
        .ok_or_else(|| CmisError::invalid_response("object payload has no cmis:baseTypeId"))?;
    let base_type = BaseType::from_id(base_type_id)
        .ok_or_else(|| CmisError::UnsupportedType(base_type_id.to_string()))?;

    let core = ObjectCore::from_properties(context.clone(), base_type, properties);
    Ok(match base_type {
        BaseType::Document => CmisObject::Document(Document::from_core(core)),
        BaseType::Folder => CmisObject::Folder(Folder::from_core(core)),
        BaseType::Item => CmisObject::Item(Item::from_core(core)),
        BaseType::Policy => CmisObject::Policy(Policy::from_core(core)),
        BaseType::Relationship => CmisObject::Relationship(Relationship::from_core(core)),
    })
}
