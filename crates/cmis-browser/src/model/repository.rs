use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CmisError, CmisResult};
use crate::model::context::RepositoryContext;
use crate::model::factory::create_object;
use crate::model::object::{CmisObject, ObjectCore};
use crate::model::type_definition::TypeDefinition;
use crate::model::{Document, Folder, Item, Policy, Relationship};
use crate::service::BrowserBindingService;

/// The `repositoryInfo` document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    pub repository_id: String,
    #[serde(default)]
    pub repository_name: Option<String>,
    #[serde(default)]
    pub repository_description: Option<String>,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_version: Option<String>,
    pub root_folder_id: String,
    #[serde(default)]
    pub cmis_version_supported: Option<String>,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub root_folder_url: Option<String>,
}

/// Optional filters for object reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectReadOptions {
    pub filter: Option<String>,
    /// One of `none`, `source`, `target`, `both`.
    pub include_relationships: Option<String>,
    pub include_allowable_actions: Option<bool>,
    pub include_policy_ids: Option<bool>,
}

/// A handle on one repository. Holds the service alive for the objects it hands out.
#[derive(Clone, Debug)]
pub struct Repository {
    service: Arc<BrowserBindingService>,
    context: RepositoryContext,
    info: RepositoryInfo,
}

impl Repository {
    pub(crate) async fn load(
        service: Arc<BrowserBindingService>,
        repository_id: &str,
    ) -> CmisResult<Self> {
        let context = RepositoryContext::new(repository_id, &service);
        let raw = service
            .perform_json(context.request().selector("repositoryInfo"))
            .await?;
        let info = parse_repository_info(repository_id, raw)?;
        Ok(Self {
            service,
            context,
            info,
        })
    }

    pub fn id(&self) -> &str {
        self.context.repository_id()
    }

    pub fn info(&self) -> &RepositoryInfo {
        &self.info
    }

    pub fn name(&self) -> Option<&str> {
        self.info.repository_name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.info.repository_description.as_deref()
    }

    pub fn product_name(&self) -> Option<&str> {
        self.info.product_name.as_deref()
    }

    pub fn product_version(&self) -> Option<&str> {
        self.info.product_version.as_deref()
    }

    pub fn root_folder_id(&self) -> &str {
        &self.info.root_folder_id
    }

    pub async fn root_folder(&self) -> CmisResult<Folder> {
        self.get_object(&self.info.root_folder_id).await?.try_into()
    }

    pub async fn get_object(&self, object_id: &str) -> CmisResult<CmisObject> {
        self.get_object_with(object_id, &ObjectReadOptions::default())
            .await
    }

    pub async fn get_object_with(
        &self,
        object_id: &str,
        options: &ObjectReadOptions,
    ) -> CmisResult<CmisObject> {
        let request = self
            .context
            .request()
            .selector("object")
            .object_id(object_id)
            .optional("filter", options.filter.clone())
            .optional("includeRelationships", options.include_relationships.clone())
            .optional("includeAllowableActions", options.include_allowable_actions)
            .optional("includePolicyIds", options.include_policy_ids);
        let raw = self.service.perform_json(request).await?;
        create_object(&self.context, &raw)
    }

    /// Whether the server still knows `object_id`.
    pub async fn object_exists(&self, object_id: &str) -> CmisResult<bool> {
        match ObjectCore::fetch(&self.context, object_id).await {
            Ok(_) => Ok(true),
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(error),
        }
    }

    pub fn new_document(&self) -> Document {
        Document::detached(self.context.clone())
    }

    pub fn new_folder(&self) -> Folder {
        Folder::detached(self.context.clone())
    }

    pub fn new_item(&self) -> Item {
        Item::detached(self.context.clone())
    }

    pub fn new_policy(&self) -> Policy {
        Policy::detached(self.context.clone())
    }

    pub fn new_relationship(&self) -> Relationship {
        Relationship::detached(self.context.clone())
    }

    pub async fn type_definition(&self, type_id: &str) -> CmisResult<TypeDefinition> {
        let request = self
            .context
            .request()
            .selector("typeDefinition")
            .param("typeId", type_id);
        let raw = self.service.perform_json(request).await?;
        serde_json::from_value(raw).map_err(|err| {
            CmisError::invalid_response(format!("type definition {type_id} decode failed: {err}"))
        })
    }
}

/// Accepts both the keyed form `{id: info}` and a bare info document.
fn parse_repository_info(repository_id: &str, raw: Value) -> CmisResult<RepositoryInfo> {
    let info = match raw {
        Value::Object(mut map) if !map.contains_key("repositoryId") => map
            .remove(repository_id)
            .ok_or_else(|| CmisError::RepositoryNotFound(repository_id.to_string()))?,
        other => other,
    };
    serde_json::from_value(info).map_err(|err| {
        CmisError::invalid_response(format!("repository info decode failed: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repository_info_accepts_keyed_and_bare_documents() {
        let keyed = parse_repository_info(
            "r1",
            json!({"r1": {"repositoryId": "r1", "repositoryName": "Main", "rootFolderId": "r1-root"}}),
        )
        .unwrap();
        assert_eq!(keyed.repository_name.as_deref(), Some("Main"));
        assert_eq!(keyed.root_folder_id, "r1-root");

        let bare = parse_repository_info(
            "r1",
            json!({"repositoryId": "r1", "rootFolderId": "root", "productVersion": "1.1"}),
        )
        .unwrap();
        assert_eq!(bare.product_version.as_deref(), Some("1.1"));
    }

    #[test]
    fn repository_info_for_other_id_is_not_found() {
        let error = parse_repository_info("r2", json!({"r1": {"repositoryId": "r1", "rootFolderId": "x"}}))
            .unwrap_err();
        assert!(error.is_not_found());
    }
}
