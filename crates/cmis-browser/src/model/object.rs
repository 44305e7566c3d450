use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{CmisError, CmisResult};
use crate::model::context::RepositoryContext;
use crate::model::{Document, Folder, Item, Policy, Relationship};
use crate::property::{self, Properties, PropertyValue, Scalar, properties_from_object_json};
use crate::request::{CONTENT_PARAM, ContentStream, PROPERTIES_PARAM};

/// The closed set of CMIS base types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BaseType {
    Document,
    Folder,
    Item,
    Policy,
    Relationship,
}

impl BaseType {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Document => "cmis:document",
            Self::Folder => "cmis:folder",
            Self::Item => "cmis:item",
            Self::Policy => "cmis:policy",
            Self::Relationship => "cmis:relationship",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "cmis:document" => Some(Self::Document),
            "cmis:folder" => Some(Self::Folder),
            "cmis:item" => Some(Self::Item),
            "cmis:policy" => Some(Self::Policy),
            "cmis:relationship" => Some(Self::Relationship),
            _ => None,
        }
    }
}

/// State shared by every object variant: its property bag and repository route.
#[derive(Clone, Debug)]
pub struct ObjectCore {
    context: RepositoryContext,
    base_type: BaseType,
    properties: Properties,
}

impl ObjectCore {
    pub(crate) fn from_properties(
        context: RepositoryContext,
        base_type: BaseType,
        properties: Properties,
    ) -> Self {
        Self {
            context,
            base_type,
            properties,
        }
    }

    /// A local object with no id, typed as its base type until told otherwise.
    pub(crate) fn detached(context: RepositoryContext, base_type: BaseType) -> Self {
        let mut properties = Properties::new();
        properties.insert(
            property::OBJECT_TYPE_ID.to_string(),
            PropertyValue::id(base_type.id()),
        );
        properties.insert(
            property::BASE_TYPE_ID.to_string(),
            PropertyValue::id(base_type.id()),
        );
        Self::from_properties(context, base_type, properties)
    }

    pub fn context(&self) -> &RepositoryContext {
        &self.context
    }

    /// Fixed at construction; the variant never changes afterwards.
    pub fn base_type(&self) -> BaseType {
        self.base_type
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, id: &str) -> Option<&PropertyValue> {
        self.properties.get(id)
    }

    pub fn str_property(&self, id: &str) -> Option<&str> {
        self.property(id).and_then(PropertyValue::as_str)
    }

    pub fn datetime_property(&self, id: &str) -> Option<DateTime<Utc>> {
        self.property(id).and_then(PropertyValue::as_datetime)
    }

    /// Sets a property. The base type is never writable, and neither is the
    /// object id once the server has assigned one.
    pub fn set_property(&mut self, id: impl Into<String>, value: PropertyValue) -> CmisResult<()> {
        let id = id.into();
        let locked = id == property::BASE_TYPE_ID
            || (id == property::OBJECT_ID && self.object_id().is_some());
        if locked {
            return Err(CmisError::invalid_parameter(
                id,
                value.first().map(Scalar::to_wire).unwrap_or_default(),
                "a property the client may change",
            ));
        }
        self.insert_property(id, value);
        Ok(())
    }

    pub(crate) fn insert_property(&mut self, id: impl Into<String>, value: PropertyValue) {
        self.properties.insert(id.into(), value);
    }

    /// Swaps in a fresh property bag from the server, keeping the base type.
    fn replace_properties(&mut self, mut properties: Properties) -> CmisResult<()> {
        let expected = self.base_type.id();
        match properties
            .get(property::BASE_TYPE_ID)
            .and_then(PropertyValue::as_str)
        {
            Some(found) if found != expected => {
                return Err(CmisError::invalid_response(format!(
                    "expected {expected} payload, got {found}"
                )));
            }
            Some(_) => {}
            None => {
                properties.insert(
                    property::BASE_TYPE_ID.to_string(),
                    PropertyValue::id(expected),
                );
            }
        }
        self.properties = properties;
        Ok(())
    }

    pub fn object_id(&self) -> Option<&str> {
        self.str_property(property::OBJECT_ID)
    }

    pub(crate) fn require_id(&self) -> CmisResult<&str> {
        self.object_id().ok_or_else(|| {
            CmisError::DetachedObject(
                self.str_property(property::NAME)
                    .unwrap_or("<unnamed>")
                    .to_string(),
            )
        })
    }

    /// Properties sent on create; server-assigned ids are left out.
    fn creation_properties(&self) -> Properties {
        self.properties
            .iter()
            .filter(|(id, _)| {
                id.as_str() != property::OBJECT_ID && id.as_str() != property::BASE_TYPE_ID
            })
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect()
    }

    pub(crate) async fn create(
        &self,
        action: &str,
        folder_id: Option<&str>,
        content: Option<ContentStream>,
    ) -> CmisResult<CmisObject> {
        let service = self.context.service()?;
        let mut request = self
            .context
            .request()
            .action(action)
            .param(PROPERTIES_PARAM, self.creation_properties())
            .optional(CONTENT_PARAM, content);
        if let Some(folder_id) = folder_id {
            request = request.object_id(folder_id);
        }
        let raw = service.perform_json(request).await?;
        crate::model::factory::create_object(&self.context, &raw)
    }

    pub(crate) async fn fetch(context: &RepositoryContext, object_id: &str) -> CmisResult<Value> {
        let request = context.request().selector("object").object_id(object_id);
        context.service()?.perform_json(request).await
    }

    async fn delete(&self, all_versions: bool) -> CmisResult<()> {
        let object_id = self.require_id()?;
        let request = self
            .context
            .request()
            .action("delete")
            .object_id(object_id)
            .param("allVersions", all_versions);
        self.context.service()?.perform(request).await?;
        Ok(())
    }

    async fn update(&mut self, properties: Properties) -> CmisResult<()> {
        let object_id = self.require_id()?.to_string();
        let change_token = self.str_property(property::CHANGE_TOKEN).map(str::to_string);
        let request = self
            .context
            .request()
            .action("update")
            .object_id(object_id)
            .param(PROPERTIES_PARAM, properties)
            .optional("changeToken", change_token);
        let raw = self.context.service()?.perform_json(request).await?;
        self.replace_properties(properties_from_object_json(&raw)?)
    }

    async fn refresh(&mut self) -> CmisResult<()> {
        let object_id = self.require_id()?.to_string();
        let raw = Self::fetch(&self.context, &object_id).await?;
        self.replace_properties(properties_from_object_json(&raw)?)
    }
}

/// Accessors and lifecycle operations every object variant supports.
#[async_trait]
pub trait CmisObjectCore: Send + Sync {
    fn core(&self) -> &ObjectCore;

    fn core_mut(&mut self) -> &mut ObjectCore;

    fn repository_id(&self) -> &str {
        self.core().context().repository_id()
    }

    fn object_id(&self) -> Option<&str> {
        self.core().object_id()
    }

    fn name(&self) -> Option<&str> {
        self.core().str_property(property::NAME)
    }

    fn set_name(&mut self, name: &str) {
        self.core_mut()
            .insert_property(property::NAME, PropertyValue::string(name));
    }

    fn object_type_id(&self) -> Option<&str> {
        self.core().str_property(property::OBJECT_TYPE_ID)
    }

    fn set_object_type_id(&mut self, type_id: &str) {
        self.core_mut()
            .insert_property(property::OBJECT_TYPE_ID, PropertyValue::id(type_id));
    }

    fn base_type_id(&self) -> Option<&str> {
        self.core().str_property(property::BASE_TYPE_ID)
    }

    fn created_by(&self) -> Option<&str> {
        self.core().str_property(property::CREATED_BY)
    }

    fn creation_date(&self) -> Option<DateTime<Utc>> {
        self.core().datetime_property(property::CREATION_DATE)
    }

    fn last_modification_date(&self) -> Option<DateTime<Utc>> {
        self.core().datetime_property(property::LAST_MODIFICATION_DATE)
    }

    fn change_token(&self) -> Option<&str> {
        self.core().str_property(property::CHANGE_TOKEN)
    }

    fn property(&self, id: &str) -> Option<&PropertyValue> {
        self.core().property(id)
    }

    fn properties(&self) -> &Properties {
        self.core().properties()
    }

    fn set_property(&mut self, id: &str, value: PropertyValue) -> CmisResult<()> {
        self.core_mut().set_property(id, value)
    }

    /// Deletes all versions of the object. The handle stays usable for reads of
    /// its cached properties; server round trips against it fail afterwards.
    async fn delete(&self) -> CmisResult<()> {
        self.core().delete(true).await
    }

    async fn update_properties(&mut self, properties: Properties) -> CmisResult<()> {
        self.core_mut().update(properties).await
    }

    /// Re-reads the properties from the server.
    async fn refresh(&mut self) -> CmisResult<()> {
        self.core_mut().refresh().await
    }
}

/// An object materialized from a server payload, one variant per base type.
#[derive(Clone, Debug)]
pub enum CmisObject {
    Document(Document),
    Folder(Folder),
    Item(Item),
    Policy(Policy),
    Relationship(Relationship),
}

impl CmisObject {
    pub fn base_type(&self) -> BaseType {
        match self {
            Self::Document(_) => BaseType::Document,
            Self::Folder(_) => BaseType::Folder,
            Self::Item(_) => BaseType::Item,
            Self::Policy(_) => BaseType::Policy,
            Self::Relationship(_) => BaseType::Relationship,
        }
    }

    pub fn as_core(&self) -> &dyn CmisObjectCore {
        match self {
            Self::Document(object) => object,
            Self::Folder(object) => object,
            Self::Item(object) => object,
            Self::Policy(object) => object,
            Self::Relationship(object) => object,
        }
    }

    pub fn as_core_mut(&mut self) -> &mut dyn CmisObjectCore {
        match self {
            Self::Document(object) => object,
            Self::Folder(object) => object,
            Self::Item(object) => object,
            Self::Policy(object) => object,
            Self::Relationship(object) => object,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(document) => Some(document),
            _ => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Self::Folder(folder) => Some(folder),
            _ => None,
        }
    }
}

macro_rules! object_variant {
    ($variant:ident) => {
        impl From<$variant> for CmisObject {
            fn from(object: $variant) -> Self {
                Self::$variant(object)
            }
        }

        impl TryFrom<CmisObject> for $variant {
            type Error = CmisError;

            fn try_from(object: CmisObject) -> CmisResult<Self> {
                match object {
                    CmisObject::$variant(inner) => Ok(inner),
                    other => Err(CmisError::invalid_response(format!(
                        "expected {}, got {}",
                        BaseType::$variant.id(),
                        other.base_type().id()
                    ))),
                }
            }
        }

        impl CmisObjectCore for $variant {
            fn core(&self) -> &ObjectCore {
                &self.core
            }

            fn core_mut(&mut self) -> &mut ObjectCore {
                &mut self.core
            }
        }
    };
}

object_variant!(Document);
object_variant!(Folder);
object_variant!(Item);
object_variant!(Policy);
object_variant!(Relationship);
