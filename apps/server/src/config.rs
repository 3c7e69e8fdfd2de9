// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.

use thiserror::Error;

/// Default upstream API base.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";

/// Configuration errors that prevent startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Which cache backend to use for responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// No caching, every request goes upstream.
    None,
    /// Process-local cache.
    Memory,
    /// External Redis instance.
    Redis(RedisSettings),
}

/// Redis connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
}

impl RedisSettings {
    /// Connection URL understood by the redis client.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Server configuration.
#[derive(Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Key appended to upstream requests.
    pub api_key: String,
    /// Upstream API base, without trailing slash.
    pub upstream_base_url: String,
    /// Ticker whose income statements are relayed.
    pub symbol: String,
    /// Timeout for a single upstream call in seconds.
    pub upstream_timeout_secs: u64,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Response cache backend.
    pub cache_backend: CacheBackend,
    /// Cache entry time-to-live in seconds.
    pub cache_ttl_secs: u64,
    /// Bound on a single cache operation in milliseconds.
    pub cache_timeout_ms: u64,
    /// Emit JSON log lines instead of pretty output.
    pub json_logs: bool,
}

// Hand-written so the API key never ends up in logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("api_key", &"<redacted>")
            .field("upstream_base_url", &self.upstream_base_url)
            .field("symbol", &self.symbol)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cache_backend", &self.cache_backend)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("cache_timeout_ms", &self.cache_timeout_ms)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = var("API_KEY").ok_or(ConfigError::Missing("API_KEY"))?;

        let cache_backend = match var("CACHE_BACKEND").map(|v| v.trim().to_ascii_lowercase()) {
            Some(kind) if kind == "none" => CacheBackend::None,
            Some(kind) if kind == "memory" => CacheBackend::Memory,
            Some(kind) if kind == "redis" => CacheBackend::Redis(redis_settings(&var)?),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "CACHE_BACKEND",
                    value: other,
                })
            }
            None if var("REDIS_HOST").is_some() => CacheBackend::Redis(redis_settings(&var)?),
            None => CacheBackend::None,
        };

        Ok(Self {
            port: parse_or(&var, "PORT", 8080),
            api_key,
            upstream_base_url: var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            symbol: var("SYMBOL").unwrap_or_else(|| "AAPL".into()),
            upstream_timeout_secs: parse_or(&var, "UPSTREAM_TIMEOUT_SECS", 10),
            request_timeout_secs: parse_or(&var, "REQUEST_TIMEOUT_SECS", 30),
            cache_backend,
            cache_ttl_secs: parse_or(&var, "CACHE_TTL_SECS", 600),
            cache_timeout_ms: parse_or(&var, "CACHE_TIMEOUT_MS", 250),
            json_logs: var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

fn redis_settings<F>(var: &F) -> Result<RedisSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let host = var("REDIS_HOST").ok_or(ConfigError::Missing("REDIS_HOST"))?;
    let port = match var("REDIS_PORT") {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: "REDIS_PORT",
            value: raw,
        })?,
        None => 6379,
    };
    let db = match var("REDIS_DB") {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: "REDIS_DB",
            value: raw,
        })?,
        None => 0,
    };
    Ok(RedisSettings { host, port, db })
}

fn parse_or<F, T>(var: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    var(name)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn test_api_key_required() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("API_KEY"))));
        assert!(matches!(
            load(&[("API_KEY", "  ")]),
            Err(ConfigError::Missing("API_KEY"))
        ));
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("API_KEY", "secret")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream_base_url, DEFAULT_UPSTREAM_BASE_URL);
        assert_eq!(config.symbol, "AAPL");
        assert_eq!(config.upstream_timeout_secs, 10);
        assert_eq!(config.cache_backend, CacheBackend::None);
        assert_eq!(config.cache_ttl_secs, 600);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_redis_enabled_by_host() {
        let config = load(&[
            ("API_KEY", "secret"),
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PORT", "6380"),
            ("REDIS_DB", "2"),
        ])
        .unwrap();
        let CacheBackend::Redis(redis) = config.cache_backend else {
            panic!("expected redis backend");
        };
        assert_eq!(redis.url(), "redis://cache.internal:6380/2");
    }

    #[test]
    fn test_redis_backend_without_host() {
        assert!(matches!(
            load(&[("API_KEY", "secret"), ("CACHE_BACKEND", "redis")]),
            Err(ConfigError::Missing("REDIS_HOST"))
        ));
    }

    #[test]
    fn test_invalid_redis_port() {
        assert!(matches!(
            load(&[("API_KEY", "k"), ("REDIS_HOST", "h"), ("REDIS_PORT", "abc")]),
            Err(ConfigError::Invalid { var: "REDIS_PORT", .. })
        ));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(matches!(
            load(&[("API_KEY", "k"), ("CACHE_BACKEND", "memcached")]),
            Err(ConfigError::Invalid { var: "CACHE_BACKEND", .. })
        ));
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let config = load(&[
            ("API_KEY", "k"),
            ("PORT", "eighty"),
            ("CACHE_TTL_SECS", "100"),
            ("UPSTREAM_BASE_URL", "http://localhost:9000/api/"),
            ("CACHE_BACKEND", "Memory"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_ttl_secs, 100);
        assert_eq!(config.upstream_base_url, "http://localhost:9000/api");
        assert_eq!(config.cache_backend, CacheBackend::Memory);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = load(&[("API_KEY", "super-secret")]).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
    }
}
