use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::{CmisError, CmisResult};

pub const DEFAULT_REPOSITORY_CACHE_CAPACITY: usize = 64;
pub const DEFAULT_USER_AGENT: &str = concat!("cmis-browser/", env!("CARGO_PKG_VERSION"));

pub const ENV_SERVICE_URL: &str = "CMIS_SERVICE_URL";
pub const ENV_USERNAME: &str = "CMIS_USERNAME";
pub const ENV_PASSWORD: &str = "CMIS_PASSWORD";
pub const ENV_SUCCINCT: &str = "CMIS_SUCCINCT";
pub const ENV_CACHE_CAPACITY: &str = "CMIS_CACHE_CAPACITY";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection settings for one browser binding endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionConfig {
    pub service_url: String,
    pub credentials: Option<Credentials>,
    /// Default for the `succinct` request flag.
    pub succinct_properties: bool,
    /// Upper bound of the repository URL cache; least recently used entries go first.
    pub repository_cache_capacity: NonZeroUsize,
    pub timeout: Option<Duration>,
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
    /// Emit one `info` line per request instead of `debug`.
    pub log_requests: bool,
}

impl ConnectionConfig {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            credentials: None,
            succinct_properties: true,
            repository_cache_capacity: default_cache_capacity(),
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
            log_requests: false,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn with_succinct_properties(mut self, succinct: bool) -> Self {
        self.succinct_properties = succinct;
        self
    }

    pub fn with_repository_cache_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.repository_cache_capacity = capacity;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_log_requests(mut self, log_requests: bool) -> Self {
        self.log_requests = log_requests;
        self
    }

    pub fn from_env() -> CmisResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from a variable lookup, skipping blank values.
    pub fn from_lookup<F>(lookup: F) -> CmisResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let service_url = value(ENV_SERVICE_URL).ok_or_else(|| {
            CmisError::invalid_parameter(ENV_SERVICE_URL, "", "a browser binding service URL")
        })?;
        let mut config = Self::new(service_url);

        if let Some(username) = value(ENV_USERNAME) {
            config = config.with_credentials(username, value(ENV_PASSWORD).unwrap_or_default());
        }

        if let Some(raw) = value(ENV_SUCCINCT) {
            let succinct = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(CmisError::invalid_parameter(
                        ENV_SUCCINCT,
                        raw,
                        "one of true, false",
                    ));
                }
            };
            config = config.with_succinct_properties(succinct);
        }

        if let Some(raw) = value(ENV_CACHE_CAPACITY) {
            let capacity = raw
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(NonZeroUsize::new)
                .ok_or_else(|| {
                    CmisError::invalid_parameter(ENV_CACHE_CAPACITY, raw.clone(), "a positive integer")
                })?;
            config = config.with_repository_cache_capacity(capacity);
        }

        Ok(config)
    }

    pub fn validate(&self) -> CmisResult<()> {
        let url = self.service_url.trim();
        if url.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CmisError::invalid_parameter(
                "service_url",
                self.service_url.clone(),
                "an http(s) URL",
            ));
        }
        Ok(())
    }
}

fn default_cache_capacity() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_REPOSITORY_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)
}
