//! Core types shared across Quizrank components.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Difficulty tier of a question.
///
/// - `Unrated`: no attempts recorded yet
/// - `Easy`: success rate of 70% or more
/// - `Medium`: success rate from 40% up to 70%
/// - `Hard`: success rate below 40%
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Unrated,
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Unrated,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrated => "unrated",
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Unrated
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a tier name is not one of the four known tiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDifficulty(pub String);

impl fmt::Display for UnknownDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown difficulty '{}'", self.0)
    }
}

impl std::error::Error for UnknownDifficulty {}

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unrated" => Ok(Self::Unrated),
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(UnknownDifficulty(s.to_string())),
        }
    }
}

/// Per-question statistics row, one per question file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Unique key, case-sensitive as stored
    pub question_file: String,

    /// Current tier
    pub difficulty: Difficulty,

    /// Percent of correct attempts, rounded to 2 decimals
    pub success_rate: f64,

    pub total_attempts: u32,

    pub correct_attempts: u32,

    /// Pinned by an operator; attempts no longer reclassify
    #[serde(default)]
    pub manual_override: bool,

    pub created_at: DateTime<Utc>,

    pub last_updated: DateTime<Utc>,
}

impl QuestionRecord {
    /// Zero-attempt record used to pre-populate the store
    pub fn unrated(question_file: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            question_file: question_file.into(),
            difficulty: Difficulty::Unrated,
            success_rate: 0.0,
            total_attempts: 0,
            correct_attempts: 0,
            manual_override: false,
            created_at: now,
            last_updated: now,
        }
    }

    /// Apply a partial update in place, mirroring store PATCH semantics
    pub fn apply(&mut self, patch: &StatsPatch) {
        if let Some(total) = patch.total_attempts {
            self.total_attempts = total;
        }
        if let Some(correct) = patch.correct_attempts {
            self.correct_attempts = correct;
        }
        if let Some(rate) = patch.success_rate {
            self.success_rate = rate;
        }
        if let Some(difficulty) = patch.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(pinned) = patch.manual_override {
            self.manual_override = pinned;
        }
        if let Some(updated) = patch.last_updated {
            self.last_updated = updated;
        }
    }
}

/// Partial update body. Unset fields are left untouched by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_attempts: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_attempts: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_override: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl StatsPatch {
    /// Fields rewritten by a recorded attempt. Never touches
    /// `manual_override` or `created_at`.
    pub fn attempt(record: &QuestionRecord) -> Self {
        Self {
            total_attempts: Some(record.total_attempts),
            correct_attempts: Some(record.correct_attempts),
            success_rate: Some(record.success_rate),
            difficulty: Some(record.difficulty),
            manual_override: None,
            last_updated: Some(record.last_updated),
        }
    }

    /// Operator pin of a tier
    pub fn manual(difficulty: Difficulty, now: DateTime<Utc>) -> Self {
        Self {
            difficulty: Some(difficulty),
            manual_override: Some(true),
            last_updated: Some(now),
            ..Default::default()
        }
    }
}

/// Projected row: only the key and its tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyEntry {
    pub question_file: String,
    pub difficulty: Difficulty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_parse() {
        assert_eq!("easy".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert_eq!(" Hard ".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("extreme".parse::<Difficulty>().is_err());
        for tier in Difficulty::ALL {
            assert_eq!(tier.as_str().parse::<Difficulty>(), Ok(tier));
        }
    }

    #[test]
    fn test_attempt_patch_fields() {
        let record = QuestionRecord::unrated("q1.png", Utc::now());
        let body = serde_json::to_value(StatsPatch::attempt(&record)).unwrap();
        let mut keys: Vec<_> = body.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            [
                "correct_attempts",
                "difficulty",
                "last_updated",
                "success_rate",
                "total_attempts"
            ]
        );
    }

    #[test]
    fn test_manual_patch_pins() {
        let mut record = QuestionRecord::unrated("q1.png", Utc::now());
        record.total_attempts = 4;
        record.apply(&StatsPatch::manual(Difficulty::Hard, Utc::now()));
        assert_eq!(record.difficulty, Difficulty::Hard);
        assert!(record.manual_override);
        assert_eq!(record.total_attempts, 4);
    }

    #[test]
    fn test_record_timestamps_round_trip() {
        let record = QuestionRecord::unrated("q1.png", Utc::now());
        let json = serde_json::to_string(&record).unwrap();
        let back: QuestionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
