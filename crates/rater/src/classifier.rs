//! Success-rate to difficulty mapping.

use quizrank_common::Difficulty;
use quizrank_common::constants::thresholds::{EASY_MIN_RATE, MEDIUM_MIN_RATE};

/// Map a success rate (percent) onto a tier.
///
/// Thresholds are inclusive lower bounds checked from easiest down, so the
/// three ranges are disjoint and cover every rate. Callers must not pass the
/// rate of a zero-attempt record; use [`classify_counts`] for that.
pub fn classify(success_rate: f64) -> Difficulty {
    if success_rate >= EASY_MIN_RATE {
        Difficulty::Easy
    } else if success_rate >= MEDIUM_MIN_RATE {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    }
}

/// Percent of correct attempts rounded to 2 decimals, 0 when there are none
pub fn success_rate(correct: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = f64::from(correct) / f64::from(total) * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Tier for a pair of counters. Zero attempts stay unrated.
pub fn classify_counts(correct: u32, total: u32) -> Difficulty {
    if total == 0 {
        Difficulty::Unrated
    } else {
        classify(success_rate(correct, total))
    }
}
