use bytes::Bytes;

use crate::error::{CmisError, CmisResult};
use crate::model::context::RepositoryContext;
use crate::model::object::{BaseType, CmisObjectCore, ObjectCore};
use crate::property;
use crate::request::ContentStream;

/// A document handle. Detached documents may stage a content stream that is
/// uploaded with the create request.
#[derive(Clone, Debug)]
pub struct Document {
    pub(super) core: ObjectCore,
    staged_content: Option<ContentStream>,
}

impl Document {
    pub(crate) fn from_core(core: ObjectCore) -> Self {
        Self {
            core,
            staged_content: None,
        }
    }

    pub(crate) fn detached(context: RepositoryContext) -> Self {
        Self::from_core(ObjectCore::detached(context, BaseType::Document))
    }

    pub fn staged_content(&self) -> Option<&ContentStream> {
        self.staged_content.as_ref()
    }

    /// Stages content on a detached document. Replacing the content of a
    /// persisted document is not supported.
    pub fn set_content(
        &mut self,
        data: impl Into<Bytes>,
        mime_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> CmisResult<()> {
        if let Some(object_id) = self.object_id() {
            return Err(CmisError::Unsupported(format!(
                "setting content on persisted document {object_id}"
            )));
        }
        self.staged_content = Some(ContentStream::new(data, mime_type, filename));
        Ok(())
    }

    /// Creates this document in `folder_id` and returns the persisted copy.
    pub async fn create_in_folder(&self, folder_id: &str) -> CmisResult<Document> {
        self.core
            .create("createDocument", Some(folder_id), self.staged_content.clone())
            .await?
            .try_into()
    }

    pub async fn content(&self) -> CmisResult<Bytes> {
        let object_id = self.core.require_id()?;
        let context = self.core.context();
        let request = context.request().selector("content").object_id(object_id);
        context.service()?.perform_raw(request).await
    }

    pub fn content_stream_mime_type(&self) -> Option<&str> {
        self.core.str_property(property::CONTENT_STREAM_MIME_TYPE)
    }

    pub fn content_stream_file_name(&self) -> Option<&str> {
        self.core.str_property(property::CONTENT_STREAM_FILE_NAME)
    }

    pub fn content_stream_length(&self) -> Option<i64> {
        self.core
            .property(property::CONTENT_STREAM_LENGTH)
            .and_then(property::PropertyValue::as_i64)
    }

    pub fn content_stream_id(&self) -> Option<&str> {
        self.core.str_property(property::CONTENT_STREAM_ID)
    }

    pub fn has_content(&self) -> bool {
        self.content_stream_length().is_some() || self.content_stream_mime_type().is_some()
    }
}
