//! In-process record store.
//!
//! Follows the same contract as the PostgREST table: inserts of an existing
//! key fail with 409, patches of a missing key match zero rows and succeed.
//! Failures can be injected to exercise every error path without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use quizrank_common::{Difficulty, DifficultyEntry, QuestionRecord, StatsPatch, StoreError};

use super::{RecordStore, StoreResult};

/// Injected failure applied to every call until cleared
#[derive(Debug, Clone)]
pub enum Fault {
    /// Behave like a refused connection
    Offline,
    /// Answer with this HTTP status
    Status(u16),
    /// Answer with an undecodable payload
    Garbage,
    /// Stall for this long before answering normally
    Stall(Duration),
}

/// Call counters, handy for asserting cache behaviour
#[derive(Default, Debug)]
pub struct MemoryStoreStats {
    pub finds: AtomicUsize,
    pub inserts: AtomicUsize,
    pub patches: AtomicUsize,
    pub difficulty_pages: AtomicUsize,
    pub record_pages: AtomicUsize,
}

/// Record store kept entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<String, QuestionRecord>>,
    fault: RwLock<Option<Fault>>,
    pub stats: MemoryStoreStats,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with the given records
    pub fn with_records(records: impl IntoIterator<Item = QuestionRecord>) -> Self {
        let rows = records
            .into_iter()
            .map(|r| (r.question_file.clone(), r))
            .collect();
        Self {
            rows: RwLock::new(rows),
            ..Default::default()
        }
    }

    /// Inject a failure (or clear it with `None`)
    pub async fn set_fault(&self, fault: Option<Fault>) {
        *self.fault.write().await = fault;
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Overwrite a tier directly, as an out-of-band writer would
    pub async fn force_difficulty(&self, question_file: &str, difficulty: Difficulty) {
        if let Some(row) = self.rows.write().await.get_mut(question_file) {
            row.difficulty = difficulty;
        }
    }

    async fn check_fault(&self) -> StoreResult<()> {
        let fault = self.fault.read().await.clone();
        match fault {
            None => Ok(()),
            Some(Fault::Offline) => Err(StoreError::Unreachable("connection refused".into())),
            Some(Fault::Status(status)) => Err(StoreError::status(status, "injected failure")),
            Some(Fault::Garbage) => Err(StoreError::Malformed("expected value at line 1".into())),
            Some(Fault::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find(&self, question_file: &str) -> StoreResult<Option<QuestionRecord>> {
        self.stats.finds.fetch_add(1, Ordering::Relaxed);
        self.check_fault().await?;
        let found = self.rows.read().await.get(question_file).cloned();
        // Let other tasks run between the read and any follow-up write
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn insert(&self, record: &QuestionRecord) -> StoreResult<()> {
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
        self.check_fault().await?;
        let mut rows = self.rows.write().await;
        if rows.contains_key(&record.question_file) {
            return Err(StoreError::status(
                409,
                format!("duplicate key value: {}", record.question_file),
            ));
        }
        rows.insert(record.question_file.clone(), record.clone());
        Ok(())
    }

    async fn patch(&self, question_file: &str, patch: &StatsPatch) -> StoreResult<()> {
        self.stats.patches.fetch_add(1, Ordering::Relaxed);
        self.check_fault().await?;
        if let Some(row) = self.rows.write().await.get_mut(question_file) {
            row.apply(patch);
        }
        Ok(())
    }

    async fn difficulty_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<DifficultyEntry>> {
        self.stats.difficulty_pages.fetch_add(1, Ordering::Relaxed);
        self.check_fault().await?;
        let rows = self.rows.read().await;
        let mut entries: Vec<DifficultyEntry> = rows
            .values()
            .map(|r| DifficultyEntry {
                question_file: r.question_file.clone(),
                difficulty: r.difficulty,
            })
            .collect();
        entries.sort_by(|a, b| a.question_file.cmp(&b.question_file));
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn record_page(&self, limit: usize, offset: usize) -> StoreResult<Vec<QuestionRecord>> {
        self.stats.record_pages.fetch_add(1, Ordering::Relaxed);
        self.check_fault().await?;
        let rows = self.rows.read().await;
        let mut records: Vec<QuestionRecord> = rows.values().cloned().collect();
        records.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| a.question_file.cmp(&b.question_file))
        });
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    async fn recalculate_all(&self) -> StoreResult<u64> {
        self.check_fault().await?;
        let mut rows = self.rows.write().await;
        let mut affected = 0;
        for row in rows.values_mut().filter(|r| !r.manual_override) {
            let difficulty =
                crate::classifier::classify_counts(row.correct_attempts, row.total_attempts);
            if row.difficulty != difficulty {
                row.difficulty = difficulty;
                row.last_updated = chrono::Utc::now();
                affected += 1;
            }
        }
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let store = MemoryStore::new();
        let record = QuestionRecord::unrated("a.png", Utc::now());
        store.insert(&record).await.unwrap();
        let err = store.insert(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 409, .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_patch_missing_matches_nothing() {
        let store = MemoryStore::new();
        let patch = StatsPatch::manual(Difficulty::Easy, Utc::now());
        store.patch("ghost.png", &patch).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_recalculate_skips_pinned() {
        let mut drifted = QuestionRecord::unrated("a.png", Utc::now());
        drifted.total_attempts = 10;
        drifted.correct_attempts = 9;
        let mut pinned = drifted.clone();
        pinned.question_file = "b.png".into();
        pinned.manual_override = true;
        pinned.difficulty = Difficulty::Hard;

        let store = MemoryStore::with_records([drifted, pinned]);
        assert_eq!(store.recalculate_all().await.unwrap(), 1);
        assert_eq!(
            store.find("a.png").await.unwrap().unwrap().difficulty,
            Difficulty::Easy
        );
        assert_eq!(
            store.find("b.png").await.unwrap().unwrap().difficulty,
            Difficulty::Hard
        );
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemoryStore::new();
        store.set_fault(Some(Fault::Offline)).await;
        assert_eq!(store.find("a.png").await.unwrap_err().kind(), "unreachable");
        store.set_fault(Some(Fault::Garbage)).await;
        assert_eq!(store.record_page(10, 0).await.unwrap_err().kind(), "malformed");
        store.set_fault(None).await;
        assert!(store.find("a.png").await.unwrap().is_none());
    }
}
