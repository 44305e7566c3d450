use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::directory::{RepositoryDescriptor, RepositoryDirectory};
use crate::error::CmisResult;
use crate::model::Repository;
use crate::service::BrowserBindingService;
use crate::transport::Transport;

/// Entry point: one browser binding endpoint and its repository directory.
#[derive(Clone, Debug)]
pub struct Server {
    service: Arc<BrowserBindingService>,
}

impl Server {
    pub fn new(config: ConnectionConfig) -> CmisResult<Self> {
        Ok(Self {
            service: Arc::new(BrowserBindingService::new(config)?),
        })
    }

    pub fn with_transport(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
    ) -> CmisResult<Self> {
        Ok(Self {
            service: Arc::new(BrowserBindingService::with_transport(config, transport)?),
        })
    }

    pub fn service(&self) -> &Arc<BrowserBindingService> {
        &self.service
    }

    pub fn directory(&self) -> &RepositoryDirectory {
        self.service.directory()
    }

    /// Every repository the endpoint advertises, read fresh from the service root.
    pub async fn repositories(&self) -> CmisResult<Vec<RepositoryDescriptor>> {
        self.service.directory().list().await
    }

    pub async fn repository(&self, repository_id: &str) -> CmisResult<Repository> {
        Repository::load(self.service.clone(), repository_id).await
    }

    pub async fn repository_exists(&self, repository_id: &str) -> CmisResult<bool> {
        match self.service.directory().descriptor(repository_id).await {
            Ok(_) => Ok(true),
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(error),
        }
    }
}
