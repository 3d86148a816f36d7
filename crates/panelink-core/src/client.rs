// ── Caching request pipeline ──
//
// Sits in front of `ApiClient`. GETs consult the TTL cache first and only
// reach the network on a miss; successful mutations invalidate the cache
// region of the resource they touched. Failures pass through untouched and
// never reach the cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use panelink_api::{ApiClient, ApiRequest, ApiResponse, Error, Method};
use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheKey, CachePolicy, CacheStats, TtlCache, resource_scope};

/// Request client with a transparent read cache.
///
/// A cache hit returns the stored [`ApiResponse`] (status, headers and body
/// exactly as the network produced them), so callers cannot tell the two
/// paths apart.
pub struct CachedClient {
    api: ApiClient,
    cache: Arc<TtlCache<ApiResponse>>,
    policy: CachePolicy,
}

impl CachedClient {
    /// Wrap `api` with a fresh, private cache.
    pub fn new(api: ApiClient, policy: CachePolicy) -> Self {
        Self::with_cache(api, Arc::new(TtlCache::new()), policy)
    }

    /// Wrap `api` with an existing cache, e.g. one shared between clients.
    pub fn with_cache(
        api: ApiClient,
        cache: Arc<TtlCache<ApiResponse>>,
        policy: CachePolicy,
    ) -> Self {
        Self { api, cache, policy }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &Arc<TtlCache<ApiResponse>> {
        &self.cache
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Cached GET of `path` with `query`.
    pub async fn get(
        &self,
        path: &str,
        query: BTreeMap<String, Value>,
    ) -> Result<ApiResponse, Error> {
        let mut request = ApiRequest::get(path);
        request.query = query;
        self.execute(&request).await
    }

    /// Run a request through the pipeline.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, Error> {
        match request.method {
            Method::GET => self.read(request).await,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE => {
                self.write(request).await
            }
            _ => self.api.execute(request).await,
        }
    }

    /// Drop cached entries whose key contains `pattern`, or everything.
    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        self.cache.invalidate(pattern)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn read(&self, request: &ApiRequest) -> Result<ApiResponse, Error> {
        if !self.policy.enabled {
            return self.api.execute(request).await;
        }

        let key = CacheKey::build(&request.path, &request.query);
        if let Some(hit) = self.cache.get(key.as_str()) {
            debug!(key = %key, "serving read from cache");
            return Ok(hit);
        }

        let response = self.api.execute(request).await?;
        let ttl = self.policy.ttl_for(&request.path);
        debug!(key = %key, ttl_secs = ttl.as_secs(), "caching response");
        self.cache.set(key, response.clone(), ttl);
        Ok(response)
    }

    async fn write(&self, request: &ApiRequest) -> Result<ApiResponse, Error> {
        let response = self.api.execute(request).await?;

        let scope = resource_scope(&request.path);
        let removed = self.cache.invalidate(scope.as_deref());
        debug!(
            method = %request.method,
            scope = scope.as_deref().unwrap_or("*"),
            removed,
            "write succeeded, cache region invalidated"
        );

        Ok(response)
    }
}
