//! Record store access.
//!
//! The rating engine talks to per-question statistics through the narrow
//! [`RecordStore`] contract:
//! - `RestStore`: PostgREST table over HTTP (production)
//! - `MemoryStore`: in-process table (tests, `--in-memory` dev mode)

pub mod memory;
pub mod rest;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use quizrank_common::{DifficultyEntry, QuestionRecord, StatsPatch, StoreError};

pub use memory::MemoryStore;
pub use rest::{RestStore, RestStoreConfig};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Remote table of question statistics
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Exact-match lookup by question file
    async fn find(&self, question_file: &str) -> StoreResult<Option<QuestionRecord>>;

    /// Insert one new record
    async fn insert(&self, record: &QuestionRecord) -> StoreResult<()>;

    /// Partial update of the row keyed by `question_file`
    async fn patch(&self, question_file: &str, patch: &StatsPatch) -> StoreResult<()>;

    /// Projected page of `(question_file, difficulty)` pairs
    async fn difficulty_page(&self, limit: usize, offset: usize)
    -> StoreResult<Vec<DifficultyEntry>>;

    /// Full-record page, newest `last_updated` first
    async fn record_page(&self, limit: usize, offset: usize) -> StoreResult<Vec<QuestionRecord>>;

    /// Server-side recompute of every classification; returns rows affected
    async fn recalculate_all(&self) -> StoreResult<u64>;
}

/// Run a store call under `limit`; an overrun is a [`StoreError::Timeout`]
pub async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(format!("no answer within {limit:?}")))?
}
