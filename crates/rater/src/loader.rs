//! Paginated full-table scan.
//!
//! Pages are ordered by `last_updated` descending with the file name as a
//! tie-breaker. Offsets are not a cursor: a row rewritten while the scan is
//! running moves to the front and can be skipped or seen twice. Without
//! concurrent writes the scan returns every row exactly once.

use std::sync::Arc;
use std::time::Duration;

use quizrank_common::QuestionRecord;

use crate::store::{RecordStore, StoreResult, bounded};

/// Scanner over the record store
pub struct BulkLoader {
    store: Arc<dyn RecordStore>,
    page_size: usize,
    call_timeout: Duration,
}

/// Result of a scan that may have stopped early
#[derive(Debug, Default)]
pub struct Scan {
    pub records: Vec<QuestionRecord>,
    pub pages: usize,
}

impl BulkLoader {
    pub fn new(store: Arc<dyn RecordStore>, page_size: usize, call_timeout: Duration) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            call_timeout,
        }
    }

    /// Up to `max_rows` records. A failing page ends the scan and the rows
    /// read so far are returned.
    pub async fn load_all(&self, max_rows: usize) -> Vec<QuestionRecord> {
        let mut scan = Scan::default();
        if let Err(e) = self.scan_into(max_rows, &mut scan).await {
            tracing::warn!(
                kind = e.kind(),
                error = %e,
                loaded = scan.records.len(),
                pages = scan.pages,
                "Bulk load stopped early"
            );
        }
        scan.records
    }

    /// Up to `max_rows` records, failing on the first bad page
    pub async fn try_load_all(&self, max_rows: usize) -> StoreResult<Vec<QuestionRecord>> {
        let mut scan = Scan::default();
        self.scan_into(max_rows, &mut scan).await?;
        Ok(scan.records)
    }

    async fn scan_into(&self, max_rows: usize, scan: &mut Scan) -> StoreResult<()> {
        while scan.records.len() < max_rows {
            let want = self.page_size.min(max_rows - scan.records.len());
            let offset = scan.records.len();
            let page = bounded(self.call_timeout, self.store.record_page(want, offset)).await?;
            scan.pages += 1;

            let fetched = page.len();
            scan.records.extend(page);
            if fetched < want {
                break;
            }
        }

        tracing::debug!(rows = scan.records.len(), pages = scan.pages, "Bulk load finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::store::memory::Fault;
    use chrono::{Duration as Span, Utc};
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;

    fn store_of(n: usize) -> Arc<MemoryStore> {
        let now = Utc::now();
        Arc::new(MemoryStore::with_records((0..n).map(|i| {
            // Spread timestamps, with some ties to exercise the tie-breaker
            QuestionRecord::unrated(format!("q{i:05}.png"), now - Span::seconds((i / 3) as i64))
        })))
    }

    async fn check_complete(n: usize, max_rows: usize, page_size: usize) {
        let store = store_of(n);
        let loader = BulkLoader::new(store, page_size, Duration::from_secs(10));
        let records = loader.load_all(max_rows).await;

        assert_eq!(records.len(), n.min(max_rows), "n={n} max={max_rows}");
        let unique: HashSet<_> = records.iter().map(|r| &r.question_file).collect();
        assert_eq!(unique.len(), records.len(), "duplicates for n={n}");
    }

    #[tokio::test]
    async fn test_pagination_completeness() {
        check_complete(0, 100, 10).await;
        check_complete(7, 100, 10).await;
        check_complete(30, 100, 10).await;
        check_complete(35, 20, 10).await;
        check_complete(35, 25, 10).await;
        check_complete(2500, 10_000, 1100).await;
        check_complete(2200, 2200, 1100).await;
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_one_empty_page() {
        let store = store_of(20);
        let loader = BulkLoader::new(store.clone(), 10, Duration::from_secs(10));
        assert_eq!(loader.load_all(100).await.len(), 20);
        assert_eq!(store.stats.record_pages.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_row_cap_stops_paging() {
        let store = store_of(50);
        let loader = BulkLoader::new(store.clone(), 10, Duration::from_secs(10));
        assert_eq!(loader.load_all(20).await.len(), 20);
        assert_eq!(store.stats.record_pages.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_newest_first() {
        let loader = BulkLoader::new(store_of(9), 4, Duration::from_secs(10));
        let records = loader.load_all(100).await;
        assert!(records.windows(2).all(|w| w[0].last_updated >= w[1].last_updated));
    }

    #[tokio::test]
    async fn test_failure_surfaces_in_try_variant() {
        let store = store_of(5);
        store.set_fault(Some(Fault::Status(503))).await;
        let loader = BulkLoader::new(store, 10, Duration::from_secs(10));

        assert!(loader.load_all(100).await.is_empty());
        let err = loader.try_load_all(100).await.unwrap_err();
        assert!(err.is_transient());
    }
}
