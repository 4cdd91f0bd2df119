//! # Quizrank Common
//!
//! Shared types, traits, and utilities used across Quizrank components.
//!
//! ## Modules
//! - `types` - Core data structures (Difficulty, QuestionRecord, StatsPatch)
//! - `error` - Record store error taxonomy
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod types;

pub use error::StoreError;
pub use types::*;
