use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::directory::RepositoryDirectory;
use crate::error::CmisResult;
use crate::request::{OperationRequest, SUCCINCT_PARAM, WireRequest};
use crate::response::{ResponseBody, interpret, interpret_raw};
use crate::transport::{HttpRequest, ReqwestTransport, Transport};

/// Encode, route, send and decode for browser binding operations.
pub struct BrowserBindingService {
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    directory: RepositoryDirectory,
}

impl std::fmt::Debug for BrowserBindingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserBindingService")
            .field("config", &self.config)
            .field("directory", &self.directory)
            .finish()
    }
}

impl BrowserBindingService {
    pub fn new(config: ConnectionConfig) -> CmisResult<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Fails with `InvalidParameterValue` when the service URL is empty or not http(s).
    pub fn with_transport(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
    ) -> CmisResult<Self> {
        config.validate()?;
        let directory = RepositoryDirectory::new(
            config.service_url.clone(),
            config.repository_cache_capacity,
            transport.clone(),
        );
        Ok(Self {
            config,
            transport,
            directory,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn directory(&self) -> &RepositoryDirectory {
        &self.directory
    }

    pub async fn perform(&self, request: OperationRequest) -> CmisResult<ResponseBody> {
        let http = self.prepare(request).await?;
        interpret(self.transport.execute(http).await?)
    }

    pub async fn perform_json(&self, request: OperationRequest) -> CmisResult<Value> {
        self.perform(request).await?.into_json()
    }

    /// Like [`Self::perform`] but returns the body bytes without decoding them.
    pub async fn perform_raw(&self, request: OperationRequest) -> CmisResult<Bytes> {
        let http = self.prepare(request).await?;
        interpret_raw(self.transport.execute(http).await?)
    }

    async fn prepare(&self, request: OperationRequest) -> CmisResult<HttpRequest> {
        let addresses_object = request.addresses_object();
        let params = if request.params.has(SUCCINCT_PARAM) {
            request.params
        } else {
            request
                .params
                .required(SUCCINCT_PARAM, self.config.succinct_properties)
        };
        // validation happens here, ahead of any directory lookup
        let WireRequest {
            params,
            content,
            mode,
        } = params.build()?;

        let url = match request.repository_id.as_deref() {
            None => self.config.service_url.clone(),
            Some(repository_id) if addresses_object => {
                self.directory.resolve_root_folder_url(repository_id).await?
            }
            Some(repository_id) => self.directory.resolve_operation_url(repository_id).await?,
        };
        debug!(url = %url, mode = %mode, "resolved cmis endpoint");

        Ok(HttpRequest {
            url,
            mode,
            params,
            content,
        })
    }
}
