use serde_json::Value;

use crate::error::{CmisError, CmisResult};
use crate::model::context::RepositoryContext;
use crate::model::factory::create_object;
use crate::model::object::{BaseType, CmisObject, ObjectCore};
use crate::property;
use crate::response::ResponseBody;

#[derive(Clone, Debug)]
pub struct Folder {
    pub(super) core: ObjectCore,
}

/// One page of a folder listing.
#[derive(Clone, Debug)]
pub struct ChildrenPage {
    pub objects: Vec<CmisObject>,
    pub has_more_items: bool,
    pub num_items: Option<i64>,
}

impl Folder {
    pub(crate) fn from_core(core: ObjectCore) -> Self {
        Self { core }
    }

    pub(crate) fn detached(context: RepositoryContext) -> Self {
        Self::from_core(ObjectCore::detached(context, BaseType::Folder))
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.core.str_property(property::PARENT_ID)
    }

    pub fn path(&self) -> Option<&str> {
        self.core.str_property(property::PATH)
    }

    pub async fn create_in_folder(&self, folder_id: &str) -> CmisResult<Folder> {
        self.core
            .create("createFolder", Some(folder_id), None)
            .await?
            .try_into()
    }

    /// Files a detached object in this folder. Relationships are created unfiled.
    pub async fn create(&self, object: CmisObject) -> CmisResult<CmisObject> {
        let folder_id = self.core.require_id()?;
        Ok(match object {
            CmisObject::Document(document) => document.create_in_folder(folder_id).await?.into(),
            CmisObject::Folder(folder) => folder.create_in_folder(folder_id).await?.into(),
            CmisObject::Item(item) => item.create_in_folder(folder_id).await?.into(),
            CmisObject::Policy(policy) => policy.create_in_folder(folder_id).await?.into(),
            CmisObject::Relationship(relationship) => relationship.create().await?.into(),
        })
    }

    pub async fn children(&self) -> CmisResult<Vec<CmisObject>> {
        Ok(self.children_page(None, None).await?.objects)
    }

    pub async fn children_page(
        &self,
        max_items: Option<i64>,
        skip_count: Option<i64>,
    ) -> CmisResult<ChildrenPage> {
        let folder_id = self.core.require_id()?;
        let context = self.core.context();
        let request = context
            .request()
            .selector("children")
            .object_id(folder_id)
            .optional("maxItems", max_items)
            .optional("skipCount", skip_count);
        let raw = context.service()?.perform_json(request).await?;

        let entries = raw
            .get("objects")
            .and_then(Value::as_array)
            .ok_or_else(|| CmisError::invalid_response("children response has no objects array"))?;
        let objects = entries
            .iter()
            .map(|entry| create_object(context, entry.get("object").unwrap_or(entry)))
            .collect::<CmisResult<Vec<_>>>()?;

        Ok(ChildrenPage {
            objects,
            has_more_items: raw
                .get("hasMoreItems")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            num_items: raw.get("numItems").and_then(Value::as_i64),
        })
    }

    /// Deletes the folder and everything below it. Returns the ids the server
    /// reported as not deleted.
    pub async fn delete_tree(
        &self,
        all_versions: bool,
        unfile_objects: Option<&str>,
        continue_on_failure: bool,
    ) -> CmisResult<Vec<String>> {
        let folder_id = self.core.require_id()?;
        let context = self.core.context();
        let request = context
            .request()
            .action("deleteTree")
            .object_id(folder_id)
            .param("allVersions", all_versions)
            .optional("unfileObjects", unfile_objects)
            .param("continueOnFailure", continue_on_failure);
        let failed = match context.service()?.perform(request).await? {
            ResponseBody::Json(body) => body
                .get("ids")
                .and_then(Value::as_array)
                .map(|ids| {
                    ids.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            ResponseBody::Raw(_) => Vec::new(),
        };
        Ok(failed)
    }
}
