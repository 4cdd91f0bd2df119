//! Question difficulty endpoints used by the quiz flow.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use quizrank_common::{Difficulty, QuestionRecord};

use super::{WriteResponse, parse_tier};
use crate::state::AppState;

/// Full `file -> tier` mapping
pub async fn all_difficulties(
    State(state): State<AppState>,
) -> Json<HashMap<String, Difficulty>> {
    let map = state.service.get_all_difficulties_map().await;
    Json(map.as_ref().clone())
}

/// Files in one tier
pub async fn by_difficulty(
    State(state): State<AppState>,
    Path(tier): Path<String>,
) -> Result<Json<Vec<String>>, StatusCode> {
    let tier = parse_tier(&tier)?;
    Ok(Json(state.service.get_questions_by_difficulty(tier).await))
}

#[derive(Deserialize)]
pub struct SampleQuery {
    /// How many questions to draw
    #[serde(default = "default_sample_count")]
    count: usize,
}

fn default_sample_count() -> usize { 10 }

/// Random questions from one tier
pub async fn sample(
    State(state): State<AppState>,
    Path(tier): Path<String>,
    Query(params): Query<SampleQuery>,
) -> Result<Json<Vec<String>>, StatusCode> {
    let tier = parse_tier(&tier)?;
    Ok(Json(state.service.sample_questions(tier, params.count).await))
}

/// Fresh statistics for one question
pub async fn get_question(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Json<QuestionRecord>, StatusCode> {
    state
        .service
        .get_one(&file)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Deserialize)]
pub struct AttemptRequest {
    /// Whether the answer was right
    correct: bool,
}

/// Record one answer
pub async fn record_attempt(
    State(state): State<AppState>,
    Path(file): Path<String>,
    Json(payload): Json<AttemptRequest>,
) -> Json<WriteResponse> {
    tracing::debug!(question_file = %file, correct = payload.correct, "Recording attempt");
    let success = state.service.record_attempt(&file, payload.correct).await;
    Json(WriteResponse { success })
}

/// Pre-create an unrated record
pub async fn bootstrap(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Json<WriteResponse> {
    let success = state.service.bootstrap_unrated(&file).await;
    Json(WriteResponse { success })
}
