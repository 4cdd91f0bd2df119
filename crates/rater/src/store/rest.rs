//! PostgREST-backed record store.
//!
//! ```text
//! GET   /rest/v1/{table}?select=*&question_file=eq.{file}
//! GET   /rest/v1/{table}?select=question_file,difficulty&limit=..&offset=..
//! POST  /rest/v1/{table}                  [record]       Prefer: return=minimal
//! PATCH /rest/v1/{table}?question_file=eq.{file}  {..}   Prefer: return=minimal
//! POST  /rest/v1/rpc/{function}           {}             -> rows affected
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use quizrank_common::constants::{columns, headers};
use quizrank_common::{DifficultyEntry, QuestionRecord, StatsPatch, StoreError};

use super::{RecordStore, StoreResult};

/// Connection settings for [`RestStore`]
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Service key sent as `apikey` and bearer token
    pub api_key: String,
    /// Statistics table name
    pub table: String,
    /// Recompute function name
    pub recalculate_rpc: String,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Record store speaking PostgREST over HTTP
pub struct RestStore {
    client: reqwest::Client,
    table_url: String,
    rpc_url: String,
}

impl RestStore {
    pub fn new(config: RestStoreConfig) -> StoreResult<Self> {
        let mut default_headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let key = HeaderValue::from_str(&config.api_key)
                .map_err(|e| StoreError::Config(format!("invalid api key: {e}")))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| StoreError::Config(format!("invalid api key: {e}")))?;
            default_headers.insert(headers::API_KEY, key);
            default_headers.insert(AUTHORIZATION, bearer);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("quizrank-rater/", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;

        let base = config.base_url.trim_end_matches('/');
        Ok(Self {
            client,
            table_url: format!("{base}/rest/v1/{}", config.table),
            rpc_url: format!("{base}/rest/v1/rpc/{}", config.recalculate_rpc),
        })
    }

    async fn get_rows<T: DeserializeOwned>(&self, query: &[(&str, String)]) -> StoreResult<Vec<T>> {
        let response = self
            .client
            .get(&self.table_url)
            .query(query)
            .send()
            .await
            .map_err(map_transport)?;
        let body = success_body(response).await?;
        decode_rows(&body)
    }
}

#[async_trait]
impl RecordStore for RestStore {
    async fn find(&self, question_file: &str) -> StoreResult<Option<QuestionRecord>> {
        let rows: Vec<QuestionRecord> = self
            .get_rows(&[
                ("select", "*".to_string()),
                (columns::QUESTION_FILE, eq(question_file)),
                ("limit", "1".to_string()),
            ])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, record: &QuestionRecord) -> StoreResult<()> {
        let response = self
            .client
            .post(&self.table_url)
            .header(headers::PREFER, headers::RETURN_MINIMAL)
            .json(&[record])
            .send()
            .await
            .map_err(map_transport)?;
        success_body(response).await.map(drop)
    }

    async fn patch(&self, question_file: &str, patch: &StatsPatch) -> StoreResult<()> {
        let response = self
            .client
            .patch(&self.table_url)
            .query(&[(columns::QUESTION_FILE, eq(question_file))])
            .header(headers::PREFER, headers::RETURN_MINIMAL)
            .json(patch)
            .send()
            .await
            .map_err(map_transport)?;
        success_body(response).await.map(drop)
    }

    async fn difficulty_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<DifficultyEntry>> {
        self.get_rows(&[
            (
                "select",
                format!("{},{}", columns::QUESTION_FILE, columns::DIFFICULTY),
            ),
            ("order", format!("{}.asc", columns::QUESTION_FILE)),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ])
        .await
    }

    async fn record_page(&self, limit: usize, offset: usize) -> StoreResult<Vec<QuestionRecord>> {
        self.get_rows(&[
            ("select", "*".to_string()),
            (
                "order",
                format!(
                    "{}.desc,{}.asc",
                    columns::LAST_UPDATED,
                    columns::QUESTION_FILE
                ),
            ),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ])
        .await
    }

    async fn recalculate_all(&self) -> StoreResult<u64> {
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&Value::Object(Map::new()))
            .send()
            .await
            .map_err(map_transport)?;
        let body = success_body(response).await?;
        parse_count(&body)
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn map_transport(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout(err.to_string())
    } else if err.is_decode() {
        StoreError::Malformed(err.to_string())
    } else {
        StoreError::Unreachable(err.to_string())
    }
}

async fn success_body(response: reqwest::Response) -> StoreResult<String> {
    let status = response.status();
    let body = response.text().await.map_err(map_transport)?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(StoreError::status(status.as_u16(), body))
    }
}

/// Decode a JSON array of rows, matching field names case-insensitively
pub fn decode_rows<T: DeserializeOwned>(body: &str) -> StoreResult<Vec<T>> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Array(rows) = value else {
        return Err(StoreError::Malformed("expected a JSON array of rows".into()));
    };

    rows.into_iter()
        .map(|row| serde_json::from_value(lowercase_keys(row)).map_err(StoreError::from))
        .collect()
}

fn lowercase_keys(row: Value) -> Value {
    match row {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key.to_ascii_lowercase(), value))
                .collect(),
        ),
        other => other,
    }
}

/// RPC result: a bare number, a numeric string, or a single-row wrapper
fn parse_count(body: &str) -> StoreResult<u64> {
    let value: Value = serde_json::from_str(body)?;
    count_of(&value).ok_or_else(|| StoreError::Malformed(format!("expected a row count, got {body}")))
}

fn count_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) if items.len() == 1 => count_of(&items[0]),
        Value::Object(fields) if fields.len() == 1 => fields.values().next().and_then(count_of),
        _ => None,
    }
}
