use crate::error::CmisResult;
use crate::model::context::RepositoryContext;
use crate::model::object::{BaseType, ObjectCore};

#[derive(Clone, Debug)]
pub struct Item {
    pub(super) core: ObjectCore,
}

impl Item {
    pub(crate) fn from_core(core: ObjectCore) -> Self {
        Self { core }
    }

    pub(crate) fn detached(context: RepositoryContext) -> Self {
        Self::from_core(ObjectCore::detached(context, BaseType::Item))
    }

    pub async fn create_in_folder(&self, folder_id: &str) -> CmisResult<Item> {
        self.core
            .create("createItem", Some(folder_id), None)
            .await?
            .try_into()
    }
}
