//! Dashboard aggregates and catalog reconciliation.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Serialize;

use quizrank_common::{Difficulty, QuestionRecord};

use crate::classifier::success_rate;

/// Aggregate view of the statistics table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DifficultySummary {
    pub questions: usize,
    pub unrated: usize,
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
    /// Questions pinned by an operator
    pub pinned: usize,
    pub total_attempts: u64,
    pub correct_attempts: u64,
    /// Overall percent correct across every attempt
    pub success_rate: f64,
}

impl DifficultySummary {
    pub fn from_records(records: &[QuestionRecord]) -> Self {
        let mut summary = Self {
            questions: records.len(),
            ..Default::default()
        };

        for record in records {
            match record.difficulty {
                Difficulty::Unrated => summary.unrated += 1,
                Difficulty::Easy => summary.easy += 1,
                Difficulty::Medium => summary.medium += 1,
                Difficulty::Hard => summary.hard += 1,
            }
            if record.manual_override {
                summary.pinned += 1;
            }
            summary.total_attempts += u64::from(record.total_attempts);
            summary.correct_attempts += u64::from(record.correct_attempts);
        }

        summary.success_rate = if summary.total_attempts == 0 {
            0.0
        } else {
            let raw = summary.correct_attempts as f64 / summary.total_attempts as f64 * 100.0;
            (raw * 100.0).round() / 100.0
        };
        summary
    }

    pub fn count(&self, tier: Difficulty) -> usize {
        match tier {
            Difficulty::Unrated => self.unrated,
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

/// One catalog file joined with its statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    /// Name as listed in the catalog
    pub file: String,
    /// Stored record, or a zero-attempt placeholder
    pub record: QuestionRecord,
    /// False when the store has no row for this file yet
    pub tracked: bool,
}

/// Catalog joined against the store
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogMerge {
    pub entries: Vec<CatalogEntry>,
    /// Store rows whose file is not in the catalog
    pub orphans: Vec<QuestionRecord>,
}

impl CatalogMerge {
    pub fn untracked(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(|e| !e.tracked)
    }
}

/// Join catalog files with store records, ignoring case in file names.
///
/// When several records differ only by case, the most recently updated one
/// wins and the rest are reported as orphans. Catalog names that differ only
/// by case all resolve to the same record.
pub fn merge_catalog(files: &[String], records: Vec<QuestionRecord>) -> CatalogMerge {
    let mut by_key: HashMap<String, QuestionRecord> = HashMap::new();
    let mut orphans = Vec::new();

    for record in records {
        let key = record.question_file.to_lowercase();
        let keep_existing = by_key
            .get(&key)
            .is_some_and(|kept| kept.last_updated >= record.last_updated);
        if keep_existing {
            orphans.push(record);
        } else if let Some(replaced) = by_key.insert(key, record) {
            orphans.push(replaced);
        }
    }

    let now = Utc::now();
    let mut matched = HashSet::new();
    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let key = file.to_lowercase();
        let entry = match by_key.get(&key).cloned() {
            Some(record) => {
                matched.insert(key);
                CatalogEntry {
                    file: file.clone(),
                    record,
                    tracked: true,
                }
            }
            None => CatalogEntry {
                file: file.clone(),
                record: QuestionRecord::unrated(file.clone(), now),
                tracked: false,
            },
        };
        entries.push(entry);
    }

    orphans.extend(
        by_key
            .into_iter()
            .filter(|(key, _)| !matched.contains(key))
            .map(|(_, record)| record),
    );
    orphans.sort_by(|a, b| a.question_file.cmp(&b.question_file));

    CatalogMerge { entries, orphans }
}

/// Success rate of a single record, recomputed from its counters
pub fn recomputed_rate(record: &QuestionRecord) -> f64 {
    success_rate(record.correct_attempts, record.total_attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(file: &str, difficulty: Difficulty, total: u32, correct: u32) -> QuestionRecord {
        let mut r = QuestionRecord::unrated(file, Utc::now());
        r.difficulty = difficulty;
        r.total_attempts = total;
        r.correct_attempts = correct;
        r.success_rate = success_rate(correct, total);
        r
    }

    #[test]
    fn test_summary_counts() {
        let mut pinned = record("c.png", Difficulty::Hard, 2, 2);
        pinned.manual_override = true;
        let summary = DifficultySummary::from_records(&[
            record("a.png", Difficulty::Unrated, 0, 0),
            record("b.png", Difficulty::Easy, 4, 3),
            pinned,
        ]);

        assert_eq!(summary.questions, 3);
        assert_eq!(summary.count(Difficulty::Unrated), 1);
        assert_eq!(summary.count(Difficulty::Easy), 1);
        assert_eq!(summary.count(Difficulty::Hard), 1);
        assert_eq!(summary.pinned, 1);
        assert_eq!(summary.total_attempts, 6);
        assert_eq!(summary.success_rate, 83.33);
    }

    #[test]
    fn test_summary_empty() {
        let summary = DifficultySummary::from_records(&[]);
        assert_eq!(summary, DifficultySummary::default());
    }

    #[test]
    fn test_merge_ignores_case() {
        let files = vec!["Cat.PNG".to_string(), "dog.png".to_string()];
        let merge = merge_catalog(
            &files,
            vec![
                record("cat.png", Difficulty::Easy, 3, 3),
                record("bird.png", Difficulty::Hard, 1, 0),
            ],
        );

        assert_eq!(merge.entries.len(), 2);
        assert!(merge.entries[0].tracked);
        assert_eq!(merge.entries[0].record.question_file, "cat.png");
        assert_eq!(merge.entries[0].file, "Cat.PNG");
        assert!(!merge.entries[1].tracked);
        assert_eq!(merge.entries[1].record.difficulty, Difficulty::Unrated);
        assert_eq!(merge.untracked().count(), 1);
        assert_eq!(merge.orphans.len(), 1);
        assert_eq!(merge.orphans[0].question_file, "bird.png");
    }

    #[test]
    fn test_merge_prefers_newest_case_variant() {
        let mut old = record("Q.png", Difficulty::Hard, 1, 0);
        old.last_updated = Utc::now() - Duration::hours(1);
        let new = record("q.png", Difficulty::Easy, 5, 5);

        let merge = merge_catalog(&["q.PNG".to_string()], vec![old, new]);
        assert_eq!(merge.entries[0].record.question_file, "q.png");
        assert_eq!(merge.orphans.len(), 1);
        assert_eq!(merge.orphans[0].question_file, "Q.png");
        assert_eq!(recomputed_rate(&merge.entries[0].record), 100.0);
    }

    #[test]
    fn test_merge_case_duplicate_catalog_names() {
        let files = vec!["Cat.png".to_string(), "cat.PNG".to_string()];
        let merge = merge_catalog(&files, vec![record("cat.png", Difficulty::Medium, 2, 1)]);

        assert_eq!(merge.entries.len(), 2);
        assert!(merge.entries.iter().all(|e| e.tracked));
        assert!(
            merge
                .entries
                .iter()
                .all(|e| e.record.difficulty == Difficulty::Medium)
        );
        assert_eq!(merge.entries[1].file, "cat.PNG");
        assert_eq!(merge.untracked().count(), 0);
        assert!(merge.orphans.is_empty());
    }
}
