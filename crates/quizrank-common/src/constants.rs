//! Shared constants for Quizrank components.

/// Default rater HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Default PostgREST base URL (local Supabase)
pub const DEFAULT_STORE_URL: &str = "http://127.0.0.1:54321";

/// Table holding per-question statistics
pub const DEFAULT_TABLE: &str = "question_difficulty";

/// Server-side function recomputing every classification
pub const DEFAULT_RECALCULATE_RPC: &str = "recalculate_all_difficulties";

/// Difficulty snapshot lifetime (2 hours)
pub const CACHE_TTL_SECS: u64 = 7200;

/// Rows per paginated read, kept under the store's per-request cap
pub const PAGE_SIZE: usize = 1100;

/// Upper bound for a single store call
pub const STORE_TIMEOUT_SECS: u64 = 10;

/// Default row cap for full-table scans
pub const DEFAULT_MAX_ROWS: usize = 10_000;

/// Classification thresholds (percent, inclusive lower bounds)
pub mod thresholds {
    /// At or above this success rate a question is easy
    pub const EASY_MIN_RATE: f64 = 70.0;

    /// At or above this (and below easy) a question is medium
    pub const MEDIUM_MIN_RATE: f64 = 40.0;
}

/// Column names on the remote table
pub mod columns {
    pub const QUESTION_FILE: &str = "question_file";
    pub const DIFFICULTY: &str = "difficulty";
    pub const LAST_UPDATED: &str = "last_updated";
}

/// HTTP header names used against the record store
pub mod headers {
    /// PostgREST gateway key header
    pub const API_KEY: &str = "apikey";

    /// Write preference header
    pub const PREFER: &str = "Prefer";

    /// Ask the store not to echo written rows
    pub const RETURN_MINIMAL: &str = "return=minimal";
}
