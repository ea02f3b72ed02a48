use std::{sync::Arc, time::Duration};

use anyhow::Context;
use http::{HeaderMap, HeaderName};
use tracing::info;
use twcache_cache::{CacheStore, MemoryCacheStore, SqliteCacheStore, SqliteOptions};
use twcache_config::{CacheBackend, ForwardConfig, TwcacheConfig};
use twcache_proxy::Forwarder;

use crate::error::PipelineError;

/// Credential header; must equal the configured API key.
pub static AUTH_HEADER: HeaderName = HeaderName::from_static("x-twc-cache-auth");

/// Set to `true` on responses replayed from the store.
pub static CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-twc-from-cache");

/// Everything a request handler needs, built once at startup.
pub struct AppContext {
    store: Arc<dyn CacheStore>,
    forwarder: Forwarder,
    api_key: String,
    forward: ForwardConfig,
    write_behind: bool,
}

impl AppContext {
    /// Build a context around an already opened store.
    pub fn new(cfg: &TwcacheConfig, store: Arc<dyn CacheStore>) -> anyhow::Result<Self> {
        let forwarder = Forwarder::new(&cfg.forward, AUTH_HEADER.clone())
            .context("Failed to build outbound HTTP client")?;

        Ok(Self {
            store,
            forwarder,
            api_key: cfg.auth.api_key.clone(),
            forward: cfg.forward.clone(),
            write_behind: cfg.cache.write_behind,
        })
    }

    /// Open the configured backend and build the context around it.
    pub async fn from_config(cfg: &TwcacheConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn CacheStore> = match cfg.cache.backend {
            CacheBackend::Sqlite => {
                let mut opts = SqliteOptions::new(&cfg.cache.db_path);
                opts.busy_timeout = Duration::from_millis(cfg.cache.busy_timeout_ms);
                opts.max_connections = cfg.cache.max_db_connections;
                let store = SqliteCacheStore::open(&opts).await.with_context(|| {
                    format!("Failed to open cache database '{}'", cfg.cache.db_path)
                })?;
                Arc::new(store)
            }
            CacheBackend::Memory => {
                info!(target: "twcache::cache", "Using in-memory cache store");
                Arc::new(MemoryCacheStore::new())
            }
        };

        Self::new(cfg, store)
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    pub fn forward_limits(&self) -> &ForwardConfig {
        &self.forward
    }

    pub fn write_behind(&self) -> bool {
        self.write_behind
    }

    /// Exact match of the first credential header value against the key.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), PipelineError> {
        match headers.get(&AUTH_HEADER) {
            Some(v) if v.as_bytes() == self.api_key.as_bytes() => Ok(()),
            _ => Err(PipelineError::Unauthorized),
        }
    }
}
