//! Difficulty rating service.
//!
//! Entry point for the rest of the quiz application. Every write follows the
//! same sequence under the question's key lock:
//!
//! ```text
//! find ──┬── absent ──▶ synthesize ──▶ insert ──┐
//!        └── present ─▶ tally ───────▶ patch ───┴──▶ clear cache
//! ```
//!
//! The boolean/empty-returning methods keep the collapsed contract used by
//! page handlers; their `try_*` twins return the tagged outcome so the
//! failure cause stays observable.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;

use quizrank_common::constants::{CACHE_TTL_SECS, PAGE_SIZE, STORE_TIMEOUT_SECS};
use quizrank_common::{Difficulty, QuestionRecord, StatsPatch, StoreError};

use crate::cache::{DifficultyCache, DifficultyMap};
use crate::classifier::{classify, success_rate};
use crate::loader::BulkLoader;
use crate::locks::KeyedLocks;
use crate::report::DifficultySummary;
use crate::store::{RecordStore, StoreResult, bounded};

/// Tuning knobs for [`DifficultyService`]
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Snapshot lifetime
    pub cache_ttl: Duration,
    /// Rows per paginated request
    pub page_size: usize,
    /// Upper bound for each store call
    pub call_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(CACHE_TTL_SECS),
            page_size: PAGE_SIZE,
            call_timeout: Duration::from_secs(STORE_TIMEOUT_SECS),
        }
    }
}

/// What a successful write did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new record was inserted
    Created,
    /// An existing record was patched
    Updated,
    /// Nothing written, the record was already there
    AlreadyExists,
    /// Nothing written, there is no record to change
    NotFound,
}

/// Adaptive difficulty rating over a record store
pub struct DifficultyService {
    store: Arc<dyn RecordStore>,
    cache: DifficultyCache,
    loader: BulkLoader,
    locks: KeyedLocks,
    call_timeout: Duration,
}

impl DifficultyService {
    pub fn new(store: Arc<dyn RecordStore>, config: ServiceConfig) -> Self {
        let cache = DifficultyCache::new(
            store.clone(),
            config.cache_ttl,
            config.page_size,
            config.call_timeout,
        );
        let loader = BulkLoader::new(store.clone(), config.page_size, config.call_timeout);

        Self {
            store,
            cache,
            loader,
            locks: KeyedLocks::new(),
            call_timeout: config.call_timeout,
        }
    }

    // === Reads ===

    /// Every known question file and its tier (cached)
    pub async fn get_all_difficulties_map(&self) -> Arc<DifficultyMap> {
        self.cache.get_all().await
    }

    /// Files currently in `tier` (cached)
    pub async fn get_questions_by_difficulty(&self, tier: Difficulty) -> Vec<String> {
        self.cache.get_by_difficulty(tier).await
    }

    /// Up to `count` distinct files from `tier`, in random order
    pub async fn sample_questions(&self, tier: Difficulty, count: usize) -> Vec<String> {
        let files = self.get_questions_by_difficulty(tier).await;
        files
            .choose_multiple(&mut rand::rng(), count)
            .cloned()
            .collect()
    }

    /// Fresh record for one file, `None` when absent or unreadable
    pub async fn get_one(&self, question_file: &str) -> Option<QuestionRecord> {
        self.try_get_one(question_file)
            .await
            .unwrap_or_else(|e| {
                log_failure("get_one", question_file, &e);
                None
            })
    }

    pub async fn try_get_one(&self, question_file: &str) -> StoreResult<Option<QuestionRecord>> {
        bounded(self.call_timeout, self.store.find(question_file)).await
    }

    /// Up to `max_rows` full records, newest first
    pub async fn load_all(&self, max_rows: usize) -> Vec<QuestionRecord> {
        self.loader.load_all(max_rows).await
    }

    pub async fn try_load_all(&self, max_rows: usize) -> StoreResult<Vec<QuestionRecord>> {
        self.loader.try_load_all(max_rows).await
    }

    /// Dashboard aggregates over up to `max_rows` records
    pub async fn summary(&self, max_rows: usize) -> DifficultySummary {
        DifficultySummary::from_records(&self.load_all(max_rows).await)
    }

    /// Cheap reachability check for readiness
    pub async fn ping(&self) -> StoreResult<()> {
        bounded(self.call_timeout, self.store.difficulty_page(1, 0))
            .await
            .map(drop)
    }

    // === Writes ===

    /// Count one answer. `false` means the attempt was not recorded.
    pub async fn record_attempt(&self, question_file: &str, is_correct: bool) -> bool {
        collapse(
            "record_attempt",
            question_file,
            self.try_record_attempt(question_file, is_correct).await,
        )
    }

    pub async fn try_record_attempt(
        &self,
        question_file: &str,
        is_correct: bool,
    ) -> StoreResult<Outcome> {
        validate_file(question_file)?;
        let _held = self.locks.lock(question_file).await;
        let now = Utc::now();

        let outcome = match self.try_get_one(question_file).await? {
            None => {
                let record = first_attempt(question_file, is_correct, now);
                bounded(self.call_timeout, self.store.insert(&record)).await?;
                tracing::debug!(
                    question_file = %question_file,
                    difficulty = %record.difficulty,
                    "First attempt recorded"
                );
                Outcome::Created
            }
            Some(mut record) => {
                let before = record.difficulty;
                tally(&mut record, is_correct, now);
                let patch = StatsPatch::attempt(&record);
                bounded(self.call_timeout, self.store.patch(question_file, &patch)).await?;
                if before != record.difficulty {
                    tracing::info!(
                        question_file = %question_file,
                        from = %before,
                        to = %record.difficulty,
                        success_rate = record.success_rate,
                        "Question reclassified"
                    );
                }
                Outcome::Updated
            }
        };

        self.cache.clear().await;
        Ok(outcome)
    }

    /// Pin `tier` and stop automatic reclassification for this file.
    /// `false` when the file has no record yet.
    pub async fn set_manual_difficulty(&self, question_file: &str, tier: Difficulty) -> bool {
        collapse(
            "set_manual_difficulty",
            question_file,
            self.try_set_manual_difficulty(question_file, tier).await,
        )
    }

    pub async fn try_set_manual_difficulty(
        &self,
        question_file: &str,
        tier: Difficulty,
    ) -> StoreResult<Outcome> {
        validate_file(question_file)?;
        let _held = self.locks.lock(question_file).await;

        // Pinning never creates a record: counters stay with the attempts path
        if self.try_get_one(question_file).await?.is_none() {
            tracing::debug!(question_file = %question_file, "No record to pin");
            return Ok(Outcome::NotFound);
        }

        let patch = StatsPatch::manual(tier, Utc::now());
        bounded(self.call_timeout, self.store.patch(question_file, &patch)).await?;

        tracing::info!(question_file = %question_file, difficulty = %tier, "Difficulty pinned");
        self.cache.clear().await;
        Ok(Outcome::Updated)
    }

    /// Insert a zero-attempt record unless one already exists
    pub async fn bootstrap_unrated(&self, question_file: &str) -> bool {
        collapse(
            "bootstrap_unrated",
            question_file,
            self.try_bootstrap_unrated(question_file).await,
        )
    }

    pub async fn try_bootstrap_unrated(&self, question_file: &str) -> StoreResult<Outcome> {
        validate_file(question_file)?;
        let _held = self.locks.lock(question_file).await;

        if self.try_get_one(question_file).await?.is_some() {
            return Ok(Outcome::AlreadyExists);
        }

        let record = QuestionRecord::unrated(question_file, Utc::now());
        bounded(self.call_timeout, self.store.insert(&record)).await?;
        self.cache.clear().await;
        tracing::debug!(question_file = %question_file, "Bootstrapped unrated record");
        Ok(Outcome::Created)
    }

    /// Run the store's bulk recompute. Returns rows affected, 0 on failure.
    pub async fn recalculate_all(&self) -> u64 {
        match self.try_recalculate_all().await {
            Ok(count) => count,
            Err(e) => {
                log_failure("recalculate_all", "*", &e);
                0
            }
        }
    }

    pub async fn try_recalculate_all(&self) -> StoreResult<u64> {
        let count = bounded(self.call_timeout, self.store.recalculate_all()).await?;
        self.cache.clear().await;
        tracing::info!(rows = count, "Difficulties recalculated");
        Ok(count)
    }

    /// Drop the cached snapshot
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
        tracing::info!("Difficulty cache cleared");
    }
}

/// Record for a file's very first attempt
fn first_attempt(question_file: &str, is_correct: bool, now: DateTime<Utc>) -> QuestionRecord {
    let correct = u32::from(is_correct);
    let rate = success_rate(correct, 1);
    QuestionRecord {
        question_file: question_file.to_string(),
        difficulty: classify(rate),
        success_rate: rate,
        total_attempts: 1,
        correct_attempts: correct,
        manual_override: false,
        created_at: now,
        last_updated: now,
    }
}

/// Fold one attempt into an existing record
fn tally(record: &mut QuestionRecord, is_correct: bool, now: DateTime<Utc>) {
    record.total_attempts = record.total_attempts.saturating_add(1);
    if is_correct {
        record.correct_attempts = record.correct_attempts.saturating_add(1);
    }
    record.correct_attempts = record.correct_attempts.min(record.total_attempts);
    record.success_rate = success_rate(record.correct_attempts, record.total_attempts);
    if !record.manual_override {
        record.difficulty = classify(record.success_rate);
    }
    record.last_updated = now;
}

fn validate_file(question_file: &str) -> StoreResult<()> {
    if question_file.trim().is_empty() {
        return Err(StoreError::InvalidInput("question file must not be empty".into()));
    }
    Ok(())
}

fn collapse(operation: &'static str, question_file: &str, result: StoreResult<Outcome>) -> bool {
    match result {
        Ok(Outcome::NotFound) => false,
        Ok(_) => true,
        Err(e) => {
            log_failure(operation, question_file, &e);
            false
        }
    }
}

fn log_failure(operation: &'static str, question_file: &str, err: &StoreError) {
    tracing::warn!(
        operation,
        question_file = %question_file,
        kind = err.kind(),
        transient = err.is_transient(),
        error = %err,
        "Difficulty store operation failed"
    );
}
