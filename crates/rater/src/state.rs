//! Application state and shared resources.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::service::DifficultyService;
use crate::store::{MemoryStore, RecordStore, RestStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Difficulty rating service (owns the snapshot cache)
    pub service: Arc<DifficultyService>,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create application state backed by the configured PostgREST store
    pub fn new(config: AppConfig) -> Result<Self> {
        let store = RestStore::new(config.rest_store_config())
            .context("Failed to create record store client")?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Create application state backed by an in-process store
    pub fn in_memory(config: AppConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(config: AppConfig, store: Arc<dyn RecordStore>) -> Self {
        let service = Arc::new(DifficultyService::new(store, config.service_config()));
        Self {
            config,
            service,
            started_at: Instant::now(),
        }
    }
}
