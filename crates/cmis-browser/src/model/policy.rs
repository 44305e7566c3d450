use crate::error::CmisResult;
use crate::model::context::RepositoryContext;
use crate::model::object::{BaseType, ObjectCore};
use crate::property::{self, PropertyValue};

#[derive(Clone, Debug)]
pub struct Policy {
    pub(super) core: ObjectCore,
}

impl Policy {
    pub(crate) fn from_core(core: ObjectCore) -> Self {
        Self { core }
    }

    pub(crate) fn detached(context: RepositoryContext) -> Self {
        Self::from_core(ObjectCore::detached(context, BaseType::Policy))
    }

    pub fn policy_text(&self) -> Option<&str> {
        self.core.str_property(property::POLICY_TEXT)
    }

    pub fn set_policy_text(&mut self, text: &str) {
        self.core
            .insert_property(property::POLICY_TEXT, PropertyValue::string(text));
    }

    pub async fn create_in_folder(&self, folder_id: &str) -> CmisResult<Policy> {
        self.core
            .create("createPolicy", Some(folder_id), None)
            .await?
            .try_into()
    }
}
