use crate::error::CmisResult;
use crate::model::context::RepositoryContext;
use crate::model::object::{BaseType, ObjectCore};
use crate::property::{self, PropertyValue};

/// A directed link between two objects. Relationships are never filed.
#[derive(Clone, Debug)]
pub struct Relationship {
    pub(super) core: ObjectCore,
}

impl Relationship {
    pub(crate) fn from_core(core: ObjectCore) -> Self {
        Self { core }
    }

    pub(crate) fn detached(context: RepositoryContext) -> Self {
        Self::from_core(ObjectCore::detached(context, BaseType::Relationship))
    }

    pub fn source_id(&self) -> Option<&str> {
        self.core.str_property(property::SOURCE_ID)
    }

    pub fn target_id(&self) -> Option<&str> {
        self.core.str_property(property::TARGET_ID)
    }

    pub fn set_source_id(&mut self, object_id: &str) {
        self.core
            .insert_property(property::SOURCE_ID, PropertyValue::id(object_id));
    }

    pub fn set_target_id(&mut self, object_id: &str) {
        self.core
            .insert_property(property::TARGET_ID, PropertyValue::id(object_id));
    }

    pub async fn create(&self) -> CmisResult<Relationship> {
        self.core
            .create("createRelationship", None, None)
            .await?
            .try_into()
    }
}
