//! HTTP route handlers for the rater.

use axum::{
    Router,
    routing::{get, post, put},
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use quizrank_common::{Difficulty, QuestionRecord};

use crate::report::DifficultySummary;
use crate::state::AppState;

mod health;
mod questions;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // Quiz flow
        .route("/difficulties", get(questions::all_difficulties))
        .route("/difficulties/{tier}", get(questions::by_difficulty))
        .route("/difficulties/{tier}/sample", get(questions::sample))
        .route("/questions/{file}", get(questions::get_question))
        .route("/questions/{file}/attempts", post(questions::record_attempt))
        .route("/questions/{file}/bootstrap", post(questions::bootstrap))

        // Operator endpoints
        .nest("/admin", admin_routes())

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Admin routes (manual overrides, recompute, reporting)
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/questions/{file}/difficulty", put(set_difficulty))
        .route("/recalculate", post(recalculate))
        .route("/records", get(list_records))
        .route("/summary", get(summary))
        .route("/cache/clear", post(clear_cache))
        .route("/stats", get(get_stats))
}

/// Collapsed result of a write
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteResponse {
    pub success: bool,
}

pub(crate) fn parse_tier(raw: &str) -> Result<Difficulty, StatusCode> {
    raw.parse().map_err(|_| StatusCode::BAD_REQUEST)
}

// === Admin Handlers ===

#[derive(Deserialize)]
struct SetDifficulty {
    difficulty: String,
}

async fn set_difficulty(
    State(state): State<AppState>,
    Path(file): Path<String>,
    Json(payload): Json<SetDifficulty>,
) -> Result<Json<WriteResponse>, StatusCode> {
    let tier = parse_tier(&payload.difficulty)?;
    let success = state.service.set_manual_difficulty(&file, tier).await;
    Ok(Json(WriteResponse { success }))
}

#[derive(Serialize, Deserialize)]
struct RecalculateResponse {
    updated: u64,
}

async fn recalculate(State(state): State<AppState>) -> Json<RecalculateResponse> {
    Json(RecalculateResponse {
        updated: state.service.recalculate_all().await,
    })
}

#[derive(Deserialize)]
struct ScanQuery {
    max_rows: Option<usize>,
}

async fn list_records(
    State(state): State<AppState>,
    Query(params): Query<ScanQuery>,
) -> Json<Vec<QuestionRecord>> {
    let max_rows = params.max_rows.unwrap_or(state.config.cache.max_rows);
    Json(state.service.load_all(max_rows).await)
}

async fn summary(
    State(state): State<AppState>,
    Query(params): Query<ScanQuery>,
) -> Json<DifficultySummary> {
    let max_rows = params.max_rows.unwrap_or(state.config.cache.max_rows);
    Json(state.service.summary(max_rows).await)
}

async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.service.clear_cache().await;
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
struct StatsResponse {
    version: &'static str,
    uptime_secs: u64,
    store_url: String,
    cache_ttl_secs: u64,
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        store_url: state.config.store.url.clone(),
        cache_ttl_secs: state.config.cache.ttl_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde::de::DeserializeOwned;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::in_memory(AppConfig::default()))
    }

    async fn call(router: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    fn json<T: DeserializeOwned>(bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _) = call(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_attempt_flow() {
        let router = app();

        let (status, body) = call(
            &router,
            Method::POST,
            "/questions/cat.png/attempts",
            Some(r#"{"correct":true}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json::<WriteResponse>(&body).success);

        let (_, body) = call(&router, Method::GET, "/questions/cat.png", None).await;
        let record: QuestionRecord = json(&body);
        assert_eq!(record.difficulty, Difficulty::Easy);

        let (_, body) = call(&router, Method::GET, "/difficulties/easy", None).await;
        assert_eq!(json::<Vec<String>>(&body), ["cat.png"]);

        let (_, body) = call(&router, Method::GET, "/difficulties", None).await;
        let map: HashMap<String, Difficulty> = json(&body);
        assert_eq!(map.get("cat.png"), Some(&Difficulty::Easy));
    }

    #[tokio::test]
    async fn test_missing_question_is_404() {
        let (status, _) = call(&app(), Method::GET, "/questions/nope.png", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_tier_is_400() {
        let router = app();
        let (status, _) = call(&router, Method::GET, "/difficulties/extreme", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &router,
            Method::PUT,
            "/admin/questions/cat.png/difficulty",
            Some(r#"{"difficulty":"extreme"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_override_and_summary() {
        let router = app();
        call(&router, Method::POST, "/questions/a.png/bootstrap", None).await;
        call(&router, Method::POST, "/questions/b.png/bootstrap", None).await;
        let (status, body) = call(
            &router,
            Method::PUT,
            "/admin/questions/b.png/difficulty",
            Some(r#"{"difficulty":"hard"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json::<WriteResponse>(&body).success);

        // No record to pin: nothing is created
        let (status, body) = call(
            &router,
            Method::PUT,
            "/admin/questions/c.png/difficulty",
            Some(r#"{"difficulty":"unrated"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!json::<WriteResponse>(&body).success);

        let (_, body) = call(&router, Method::GET, "/admin/records?max_rows=1", None).await;
        assert_eq!(json::<Vec<QuestionRecord>>(&body).len(), 1);

        let (_, body) = call(&router, Method::GET, "/admin/summary", None).await;
        let summary: serde_json::Value = json(&body);
        assert_eq!(summary["questions"], 2);
        assert_eq!(summary["unrated"], 1);
        assert_eq!(summary["pinned"], 1);

        let (status, _) = call(&router, Method::POST, "/admin/cache/clear", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = call(&router, Method::POST, "/admin/recalculate", None).await;
        assert_eq!(json::<RecalculateResponse>(&body).updated, 0);
    }
}
