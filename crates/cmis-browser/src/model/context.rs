use std::sync::{Arc, Weak};

use crate::error::{CmisError, CmisResult};
use crate::request::OperationRequest;
use crate::service::BrowserBindingService;

/// Non-owning route from an object back to the repository it lives in.
#[derive(Clone, Debug)]
pub struct RepositoryContext {
    repository_id: String,
    service: Weak<BrowserBindingService>,
}

impl RepositoryContext {
    pub(crate) fn new(repository_id: impl Into<String>, service: &Arc<BrowserBindingService>) -> Self {
        Self {
            repository_id: repository_id.into(),
            service: Arc::downgrade(service),
        }
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    /// Upgrades the back-reference; fails once every `Server` and `Repository` handle is gone.
    pub(crate) fn service(&self) -> CmisResult<Arc<BrowserBindingService>> {
        self.service.upgrade().ok_or(CmisError::SessionClosed)
    }

    pub(crate) fn request(&self) -> OperationRequest {
        OperationRequest::repository(self.repository_id.clone())
    }
}
