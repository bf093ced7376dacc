use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::cache::DEFAULT_KEY_PREFIX;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; UnfurlBot/1.0)";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub redis_url: String,
    pub key_prefix: String,
    pub max_idle: usize,
    pub max_active: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            backend: CacheBackend::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_idle: 80,
            max_active: 12_000,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FetchSettings {
    /// Whole-request timeout, body included.
    pub timeout: Duration,
    pub user_agent: String,
    /// Bytes of page body handed to the extractor; the rest is never read.
    pub max_body_bytes: u64,
    /// Refuse hosts that resolve to private, loopback or link-local addresses.
    pub block_private_addresses: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_bytes: 5 * 1024 * 1024,
            block_private_addresses: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub is_dev: bool,
    pub cache: CacheSettings,
    pub fetch: FetchSettings,
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset keys take their defaults;
    /// set but unparsable keys are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let cache_defaults = CacheSettings::default();
        let fetch_defaults = FetchSettings::default();

        Ok(Config {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or(&lookup, "SERVER_PORT", 8000)?,
            is_dev: lookup("APP_ENV").as_deref() != Some("production"),
            cache: CacheSettings {
                backend: parse_or(&lookup, "CACHE_BACKEND", cache_defaults.backend)?,
                redis_url: lookup("REDIS_URL").unwrap_or(cache_defaults.redis_url),
                key_prefix: lookup("CACHE_KEY_PREFIX").unwrap_or(cache_defaults.key_prefix),
                max_idle: parse_or(&lookup, "CACHE_MAX_IDLE", cache_defaults.max_idle)?,
                max_active: parse_or(&lookup, "CACHE_MAX_ACTIVE", cache_defaults.max_active)?,
            },
            fetch: FetchSettings {
                timeout: parse_or(&lookup, "FETCH_TIMEOUT_SECS", 10)
                    .map(Duration::from_secs)?,
                user_agent: lookup("FETCH_USER_AGENT").unwrap_or(fetch_defaults.user_agent),
                max_body_bytes: parse_or(
                    &lookup,
                    "MAX_BODY_BYTES",
                    fetch_defaults.max_body_bytes,
                )?,
                block_private_addresses: parse_or(
                    &lookup,
                    "BLOCK_PRIVATE_ADDRESSES",
                    fetch_defaults.block_private_addresses,
                )?,
            },
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_legacy_deployment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server_addr(), "0.0.0.0:8000");
        assert!(config.is_dev);
        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.cache.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.cache.key_prefix, "url_preview:");
        assert_eq!(config.cache.max_idle, 80);
        assert_eq!(config.cache.max_active, 12_000);
        assert_eq!(config.fetch.timeout, Duration::from_secs(10));
        assert!(!config.fetch.block_private_addresses);
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("SERVER_PORT", "9000"),
            ("APP_ENV", "production"),
            ("CACHE_BACKEND", "Memory"),
            ("CACHE_MAX_IDLE", "4"),
            ("FETCH_TIMEOUT_SECS", "3"),
            ("BLOCK_PRIVATE_ADDRESSES", "true"),
        ])
        .unwrap();
        assert_eq!(config.server_port, 9000);
        assert!(!config.is_dev);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.max_idle, 4);
        assert_eq!(config.fetch.timeout, Duration::from_secs(3));
        assert!(config.fetch.block_private_addresses);
    }

    #[test]
    fn rejects_unparsable_values() {
        assert_eq!(
            config_from(&[("SERVER_PORT", "eighty")]).unwrap_err(),
            ConfigError::Invalid {
                key: "SERVER_PORT",
                value: "eighty".into()
            }
        );
        assert!(config_from(&[("CACHE_BACKEND", "memcached")]).is_err());
    }
}
