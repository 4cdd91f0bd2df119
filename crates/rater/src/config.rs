//! Configuration management for the rater.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use quizrank_common::constants::{
    CACHE_TTL_SECS, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_ROWS, DEFAULT_RECALCULATE_RPC,
    DEFAULT_STORE_URL, DEFAULT_TABLE, PAGE_SIZE, STORE_TIMEOUT_SECS,
};

use crate::service::ServiceConfig;
use crate::store::RestStoreConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Record store connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Snapshot cache and paging
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Record store settings
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// PostgREST project base URL
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Service key (prefer STORE_API_KEY over the file)
    #[serde(default)]
    pub api_key: String,

    /// Statistics table
    #[serde(default = "default_table")]
    pub table: String,

    /// Bulk recompute function
    #[serde(default = "default_recalculate_rpc")]
    pub recalculate_rpc: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            api_key: String::new(),
            table: default_table(),
            recalculate_rpc: default_recalculate_rpc(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Cache and pagination settings
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Snapshot lifetime in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Rows per paginated request
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Row cap for admin scans when the caller gives none
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            page_size: default_page_size(),
            max_rows: default_max_rows(),
        }
    }
}

/// Values taken from the command line or environment, applied last
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub store_url: Option<String>,
    pub api_key: Option<String>,
    pub listen_addr: Option<String>,
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_store_url() -> String { DEFAULT_STORE_URL.to_string() }
fn default_table() -> String { DEFAULT_TABLE.to_string() }
fn default_recalculate_rpc() -> String { DEFAULT_RECALCULATE_RPC.to_string() }
fn default_timeout() -> u64 { STORE_TIMEOUT_SECS }
fn default_cache_ttl() -> u64 { CACHE_TTL_SECS } // 2 hours
fn default_page_size() -> usize { PAGE_SIZE }
fn default_max_rows() -> usize { DEFAULT_MAX_ROWS }

impl AppConfig {
    /// Load configuration from file, with CLI/env overrides
    pub fn load(config_path: &str, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            tracing::warn!(path = config_path, "Config file not found, using defaults");
            Self::default()
        };

        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref url) = overrides.store_url {
            self.store.url = url.clone();
        }
        if let Some(ref key) = overrides.api_key {
            self.store.api_key = key.clone();
        }
        if let Some(ref listen) = overrides.listen_addr {
            self.listen_addr = listen.clone();
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.cache.page_size > 0, "cache.page_size must be positive");
        anyhow::ensure!(self.store.timeout_secs > 0, "store.timeout_secs must be positive");
        anyhow::ensure!(!self.store.table.is_empty(), "store.table must not be empty");
        Ok(())
    }

    pub fn rest_store_config(&self) -> RestStoreConfig {
        RestStoreConfig {
            base_url: self.store.url.clone(),
            api_key: self.store.api_key.clone(),
            table: self.store.table.clone(),
            recalculate_rpc: self.store.recalculate_rpc.clone(),
            timeout: Duration::from_secs(self.store.timeout_secs),
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            cache_ttl: Duration::from_secs(self.cache.ttl_secs),
            page_size: self.cache.page_size,
            call_timeout: Duration::from_secs(self.store.timeout_secs),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load("does/not/exist.toml", &ConfigOverrides::default()).unwrap();
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.cache.page_size, 1100);
        assert_eq!(config.service_config().cache_ttl, Duration::from_secs(7200));
        assert_eq!(config.rest_store_config().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_file_then_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "listen_addr = \"0.0.0.0:9000\"\n[store]\nurl = \"https://file.example\"\ntable = \"stats\"\n[cache]\nttl_secs = 60"
        )
        .unwrap();

        let overrides = ConfigOverrides {
            store_url: Some("https://cli.example".into()),
            ..Default::default()
        };
        let config = AppConfig::load(file.path().to_str().unwrap(), &overrides).unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.store.url, "https://cli.example");
        assert_eq!(config.store.table, "stats");
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.page_size, 1100);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut config = AppConfig::default();
        config.cache.page_size = 0;
        assert!(config.validate().is_err());
    }
}
