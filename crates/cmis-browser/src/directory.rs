//! Bounded cache of repository endpoints keyed by repository id.
//!
//! A miss refills the cache from the service root listing. Concurrent misses
//! share one refill: callers queue on the refill gate and re-check the cache
//! once they hold it, so only the first one reaches the network.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lru::LruCache;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{CmisError, CmisResult};
use crate::request::TransportMode;
use crate::response::interpret;
use crate::transport::{HttpRequest, Transport};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryDescriptor {
    pub id: String,
    /// Endpoint for repository-scoped operations (`repositoryUrl`).
    pub operation_url: String,
    /// Endpoint for object-scoped operations (`rootFolderUrl`).
    pub root_folder_url: String,
}

pub struct RepositoryDirectory {
    service_url: String,
    transport: Arc<dyn Transport>,
    entries: Mutex<LruCache<String, RepositoryDescriptor>>,
    refill_gate: Mutex<()>,
    refills: AtomicUsize,
}

impl std::fmt::Debug for RepositoryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryDirectory")
            .field("service_url", &self.service_url)
            .field("refills", &self.refill_count())
            .finish()
    }
}

impl RepositoryDirectory {
    pub fn new(
        service_url: impl Into<String>,
        capacity: NonZeroUsize,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            service_url: service_url.into(),
            transport,
            entries: Mutex::new(LruCache::new(capacity)),
            refill_gate: Mutex::new(()),
            refills: AtomicUsize::new(0),
        }
    }

    pub async fn resolve_operation_url(&self, repository_id: &str) -> CmisResult<String> {
        Ok(self.descriptor(repository_id).await?.operation_url)
    }

    pub async fn resolve_root_folder_url(&self, repository_id: &str) -> CmisResult<String> {
        Ok(self.descriptor(repository_id).await?.root_folder_url)
    }

    pub async fn descriptor(&self, repository_id: &str) -> CmisResult<RepositoryDescriptor> {
        if let Some(found) = self.entries.lock().await.get(repository_id).cloned() {
            return Ok(found);
        }

        let _gate = self.refill_gate.lock().await;
        if let Some(found) = self.entries.lock().await.get(repository_id).cloned() {
            return Ok(found);
        }

        let listing = self.fetch_listing().await?;
        let mut wanted = None;
        let mut entries = self.entries.lock().await;
        for descriptor in listing {
            if descriptor.id == repository_id {
                wanted = Some(descriptor);
            } else {
                entries.put(descriptor.id.clone(), descriptor);
            }
        }
        // inserted last so it survives eviction when the listing exceeds capacity
        let found = match wanted {
            Some(descriptor) => {
                entries.put(descriptor.id.clone(), descriptor.clone());
                Ok(descriptor)
            }
            None => Err(CmisError::RepositoryNotFound(repository_id.to_string())),
        };
        debug!(cached = entries.len(), "repository directory refilled");
        found
    }

    /// Fetches every repository the endpoint advertises, bypassing the cache.
    pub async fn list(&self) -> CmisResult<Vec<RepositoryDescriptor>> {
        self.fetch_listing().await
    }

    /// Cached entry without touching recency or the network.
    pub async fn cached(&self, repository_id: &str) -> Option<RepositoryDescriptor> {
        self.entries.lock().await.peek(repository_id).cloned()
    }

    pub async fn evict(&self, repository_id: &str) -> Option<RepositoryDescriptor> {
        self.entries.lock().await.pop(repository_id)
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Number of listing fetches performed so far.
    pub fn refill_count(&self) -> usize {
        self.refills.load(Ordering::SeqCst)
    }

    async fn fetch_listing(&self) -> CmisResult<Vec<RepositoryDescriptor>> {
        self.refills.fetch_add(1, Ordering::SeqCst);
        debug!(service_url = %self.service_url, "refilling repository directory");
        let response = self
            .transport
            .execute(HttpRequest {
                url: self.service_url.clone(),
                mode: TransportMode::Get,
                params: Vec::new(),
                content: None,
            })
            .await?;
        let listing = interpret(response)?.into_json()?;
        parse_repository_listing(&listing)
    }
}

/// Reads the service root document: repository id mapped to its endpoints.
pub fn parse_repository_listing(listing: &Value) -> CmisResult<Vec<RepositoryDescriptor>> {
    let map = listing
        .as_object()
        .ok_or_else(|| CmisError::invalid_response("repository listing is not an object"))?;
    map.iter()
        .map(|(id, entry)| {
            let url = |key: &str| {
                entry
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        CmisError::invalid_response(format!("repository {id} is missing {key}"))
                    })
            };
            Ok::<_, CmisError>(RepositoryDescriptor {
                id: id.clone(),
                operation_url: url("repositoryUrl")?,
                root_folder_url: url("rootFolderUrl")?,
            })
        })
        .collect()
}
