//! Difficulty snapshot cache.
//!
//! Holds one entry: the whole `question_file -> difficulty` mapping, read
//! through from the store on miss or expiry. The mapping sits behind an
//! `Arc` that is swapped whole, so a reader sees either the previous
//! snapshot or the new one, never a half-built map.
//!
//! Lifecycle:
//! - populated lazily by the first `get_all`
//! - expired passively once the TTL elapses
//! - cleared explicitly after every successful write
//!
//! Only one refresh runs at a time. Callers that miss while it is in flight
//! wait for it and take its snapshot instead of scanning the store again.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use quizrank_common::{Difficulty, StoreError};

use crate::store::{RecordStore, StoreResult, bounded};

pub type DifficultyMap = HashMap<String, Difficulty>;

struct Snapshot {
    map: Arc<DifficultyMap>,
    expires_at: Instant,
}

/// TTL-bounded snapshot of every question's tier
pub struct DifficultyCache {
    store: Arc<dyn RecordStore>,
    ttl: Duration,
    page_size: usize,
    call_timeout: Duration,
    slot: RwLock<Option<Snapshot>>,
    /// Bumped by every clear; a refresh started before a clear is discarded
    generation: AtomicU64,
    refresh: Mutex<()>,
}

impl DifficultyCache {
    pub fn new(
        store: Arc<dyn RecordStore>,
        ttl: Duration,
        page_size: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            ttl,
            page_size: page_size.max(1),
            call_timeout,
            slot: RwLock::new(None),
            generation: AtomicU64::new(0),
            refresh: Mutex::new(()),
        }
    }

    /// Current mapping, refreshed from the store when missing or expired.
    ///
    /// A failed refresh yields an empty mapping and leaves the cache empty.
    pub async fn get_all(&self) -> Arc<DifficultyMap> {
        match self.try_get_all().await {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Difficulty snapshot refresh failed");
                Arc::new(DifficultyMap::new())
            }
        }
    }

    /// Like [`get_all`](Self::get_all) but surfaces the refresh failure
    pub async fn try_get_all(&self) -> StoreResult<Arc<DifficultyMap>> {
        if let Some(map) = self.fresh().await {
            return Ok(map);
        }

        let _refreshing = self.refresh.lock().await;
        if let Some(map) = self.fresh().await {
            return Ok(map);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let map = match self.fetch().await {
            Ok(map) => Arc::new(map),
            Err(e) => {
                self.slot.write().await.take();
                return Err(e);
            }
        };

        let mut slot = self.slot.write().await;
        if self.generation.load(Ordering::Acquire) == generation {
            *slot = Some(Snapshot {
                map: map.clone(),
                expires_at: Instant::now() + self.ttl,
            });
        } else {
            tracing::debug!("Snapshot invalidated during refresh, not caching it");
        }

        Ok(map)
    }

    /// Files currently classified as `tier`
    pub async fn get_by_difficulty(&self, tier: Difficulty) -> Vec<String> {
        let map = self.get_all().await;
        let mut files: Vec<String> = map
            .iter()
            .filter(|(_, d)| **d == tier)
            .map(|(file, _)| file.clone())
            .collect();
        files.sort();
        files
    }

    /// Drop the snapshot so the next read refetches
    pub async fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.slot.write().await.take();
    }

    /// True when an unexpired snapshot is held
    pub async fn is_warm(&self) -> bool {
        self.fresh().await.is_some()
    }

    async fn fresh(&self) -> Option<Arc<DifficultyMap>> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|s| Instant::now() < s.expires_at)
            .map(|s| s.map.clone())
    }

    async fn fetch(&self) -> Result<DifficultyMap, StoreError> {
        let mut map = DifficultyMap::new();
        let mut offset = 0;

        loop {
            let page = bounded(
                self.call_timeout,
                self.store.difficulty_page(self.page_size, offset),
            )
            .await?;
            let fetched = page.len();
            map.extend(page.into_iter().map(|e| (e.question_file, e.difficulty)));
            if fetched < self.page_size {
                break;
            }
            offset += fetched;
        }

        tracing::debug!(entries = map.len(), "Difficulty snapshot refreshed");
        Ok(map)
    }
}
