//! # Rater - Quizrank difficulty engine
//!
//! Adaptive question difficulty for the quiz application: counts answers per
//! question, reclassifies the question from its success rate, and serves a
//! cached `file -> tier` snapshot to question selection.
//!
//! ## Architecture
//! ```text
//! answer ──▶ DifficultyService ──▶ classifier ──▶ RecordStore (PostgREST)
//!                  │                                   ▲
//!                  └──── clear ──▶ DifficultyCache ────┘ read-through
//! ```

pub mod cache;
pub mod classifier;
pub mod config;
pub mod loader;
pub mod locks;
pub mod report;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

pub use service::{DifficultyService, Outcome, ServiceConfig};
