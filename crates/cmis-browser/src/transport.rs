use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info};

use crate::config::{ConnectionConfig, Credentials};
use crate::error::{CmisError, CmisResult};
use crate::request::{CONTENT_PARAM, ContentStream, TransportMode};

#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub mode: TransportMode,
    pub params: Vec<(String, String)>,
    pub content: Option<ContentStream>,
}

impl HttpRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json; charset=utf-8".to_string()),
            body: Bytes::from(body.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One HTTP exchange with the browser binding endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> CmisResult<HttpResponse>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn execute(&self, request: HttpRequest) -> CmisResult<HttpResponse> {
        (**self).execute(request).await
    }
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    credentials: Option<Credentials>,
    log_requests: bool,
}

impl ReqwestTransport {
    pub fn new(config: &ConnectionConfig) -> CmisResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                CmisError::invalid_parameter("header", name.clone(), "a valid header name")
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                CmisError::invalid_parameter(name.clone(), value.clone(), "a valid header value")
            })?;
            headers.insert(header_name, header_value);
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| CmisError::Transport(format!("http client build failed: {err}")))?;

        Ok(Self {
            client,
            credentials: config.credentials.clone(),
            log_requests: config.log_requests,
        })
    }

    fn log(&self, request: &HttpRequest) {
        if self.log_requests {
            info!(url = %request.url, mode = %request.mode, params = ?request.params, "cmis request");
        } else {
            debug!(url = %request.url, mode = %request.mode, params = ?request.params, "cmis request");
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> CmisResult<HttpResponse> {
        self.log(&request);

        let builder = match request.mode {
            TransportMode::Get => self.client.get(&request.url).query(&request.params),
            TransportMode::PostForm => self.client.post(&request.url).form(&request.params),
            TransportMode::PostMultipart => {
                let mut form = reqwest::multipart::Form::new();
                for (key, value) in request.params {
                    form = form.text(key, value);
                }
                if let Some(content) = request.content {
                    let part = reqwest::multipart::Part::bytes(content.data.to_vec())
                        .file_name(content.filename)
                        .mime_str(&content.mime_type)
                        .map_err(|err| {
                            CmisError::invalid_parameter(
                                CONTENT_PARAM,
                                err.to_string(),
                                "a valid mime type",
                            )
                        })?;
                    form = form.part(CONTENT_PARAM, part);
                }
                self.client.post(&request.url).multipart(form)
            }
        };
        let builder = match &self.credentials {
            Some(credentials) => {
                builder.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|err| CmisError::Transport(format!("http {} failed: {err}", request.mode)))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|err| CmisError::Transport(format!("http read body failed: {err}")))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
