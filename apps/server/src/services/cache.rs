// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response cache with a fixed TTL, backed by Redis or process memory.

use crate::config::{CacheBackend, Config};
use crate::types::{Dataset, DatasetQuery};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::OnceCell;

const KEY_PREFIX: &str = "statement-relay:";

/// Cache failures. Callers degrade to an upstream fetch.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cached value is not a dataset: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Cached responses keyed by normalized request.
#[derive(Clone)]
pub struct ResponseCache {
    backend: Backend,
    ttl: Duration,
    op_timeout: Duration,
}

#[derive(Clone)]
enum Backend {
    Memory(MemoryStore),
    Redis(RedisStore),
}

/// Redis client with a connection established on first use and kept
/// afterwards. A failed connect is retried by the next operation.
#[derive(Clone)]
struct RedisStore {
    client: redis::Client,
    conn: Arc<OnceCell<ConnectionManager>>,
}

impl ResponseCache {
    /// Build the configured cache, or `None` when caching is off.
    ///
    /// An unreachable Redis is logged and kept; requests fall back to the
    /// upstream until it comes up.
    pub async fn from_config(config: &Config) -> Option<Self> {
        let ttl = Duration::from_secs(config.cache_ttl_secs);
        let op_timeout = Duration::from_millis(config.cache_timeout_ms);

        match &config.cache_backend {
            CacheBackend::None => None,
            CacheBackend::Memory => Some(Self::memory(ttl, op_timeout)),
            CacheBackend::Redis(settings) => {
                let url = settings.url();
                let cache = match Self::redis(&url, ttl, op_timeout) {
                    Ok(cache) => cache,
                    Err(e) => {
                        tracing::warn!(error = %e, url = %url, "Invalid Redis URL, running without cache");
                        return None;
                    }
                };
                match cache.connect().await {
                    Ok(_) => tracing::info!(url = %url, "Connected to Redis cache"),
                    Err(e) => tracing::warn!(
                        error = %e,
                        url = %url,
                        "Redis unavailable, will retry on demand"
                    ),
                }
                Some(cache)
            }
        }
    }

    /// Redis-backed cache. Only the URL is checked here; the connection is
    /// opened by the first operation.
    pub fn redis(url: &str, ttl: Duration, op_timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            backend: Backend::Redis(RedisStore {
                client,
                conn: Arc::new(OnceCell::new()),
            }),
            ttl,
            op_timeout,
        })
    }

    /// Process-local cache.
    pub fn memory(ttl: Duration, op_timeout: Duration) -> Self {
        Self {
            backend: Backend::Memory(MemoryStore::default()),
            ttl,
            op_timeout,
        }
    }

    /// Backend name for health reporting.
    pub fn kind(&self) -> &'static str {
        match self.backend {
            Backend::Memory(_) => "memory",
            Backend::Redis(_) => "redis",
        }
    }

    /// Cache key for a request path and its validated query.
    pub fn generate_key(path: &str, query: &DatasetQuery) -> String {
        let mut hasher = Sha256::new();
        hasher.update(path.as_bytes());
        hasher.update(b"?");
        hasher.update(query.to_string().as_bytes());
        format!("{}{}", KEY_PREFIX, hex::encode(hasher.finalize()))
    }

    /// Get a cached dataset by key.
    pub async fn get(&self, key: &str) -> Result<Option<Dataset>, CacheError> {
        let raw = match &self.backend {
            Backend::Memory(store) => store.get(key),
            Backend::Redis(store) => {
                let mut conn = self.bounded(store.connection()).await??;
                self.bounded(conn.get::<_, Option<String>>(key)).await??
            }
        };

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Store a dataset under `key` for the configured TTL.
    pub async fn set(&self, key: &str, value: &Dataset) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)?;
        let size = json.len();

        match &self.backend {
            Backend::Memory(store) => store.set(key, json, self.ttl),
            Backend::Redis(store) => {
                let mut conn = self.bounded(store.connection()).await??;
                self.bounded(conn.set_ex::<_, _, ()>(key, json, self.ttl.as_secs()))
                    .await??;
            }
        }

        tracing::debug!(key = %key, size, ttl_secs = self.ttl.as_secs(), "Cached result");
        Ok(())
    }

    /// Open the backend connection if it has one.
    pub async fn connect(&self) -> Result<(), CacheError> {
        match &self.backend {
            Backend::Memory(_) => Ok(()),
            Backend::Redis(store) => {
                self.bounded(store.connection()).await??;
                Ok(())
            }
        }
    }

    async fn bounded<F, T>(&self, fut: F) -> Result<T, CacheError>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| CacheError::Timeout(self.op_timeout))
    }
}

impl RedisStore {
    async fn connection(&self) -> redis::RedisResult<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(conn.clone())
    }
}

/// In-process entries with per-entry expiry.
///
/// Expired entries are swept on every write, so this suits tests and
/// single-instance development rather than production load.
#[derive(Clone, Default)]
struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, (Instant, String)>>>,
}

impl MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match entries.get(key) {
            Some((expires, value)) if *expires > Instant::now() => return Some(value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, (expires, _)| *expires > now);
        entries.insert(key.to_string(), (now + ttl, value));
    }
}
