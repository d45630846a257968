// SPDX-License-Identifier: MIT

//! Supabase (PostgREST) checkpoint backend
//!
//! Rows live in a table with an `id` text primary key and a `data` JSON
//! column. Writes are upserts resolved on `id`.

use super::backend::CheckpointBackend;
use crate::drafter::error::BackendError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use url::Url;

/// Default table name for checkpoint rows
pub const DEFAULT_TABLE: &str = "graph_state";

pub struct SupabaseBackend {
    client: Client,
    base_url: Url,
    api_key: String,
    table: String,
}

impl SupabaseBackend {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        table: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::Fatal(format!("invalid Supabase URL: {}", e)))?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::Fatal(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            table: table.into(),
        })
    }

    /// Create from `SUPABASE_URL` and `SUPABASE_KEY`
    pub fn from_env(table: &str, timeout: Option<Duration>) -> Result<Self, BackendError> {
        let url = env::var("SUPABASE_URL")
            .map_err(|_| BackendError::Fatal("SUPABASE_URL must be set".to_string()))?;
        let key = env::var("SUPABASE_KEY")
            .map_err(|_| BackendError::Fatal("SUPABASE_KEY must be set".to_string()))?;
        Self::new(&url, key, table, timeout)
    }

    fn table_url(&self) -> Result<Url, BackendError> {
        self.base_url
            .join(&format!("rest/v1/{}", self.table))
            .map_err(|e| BackendError::Fatal(format!("invalid table URL: {}", e)))
    }

    fn upsert_url(&self) -> Result<Url, BackendError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut().append_pair("on_conflict", "id");
        Ok(url)
    }

    fn select_url(&self, id: &str) -> Result<Url, BackendError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("select", "data")
            .append_pair("id", &format!("eq.{}", id));
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

/// Network-layer failures are worth retrying; anything else is not
fn classify_transport(err: reqwest::Error) -> BackendError {
    if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        BackendError::Transient(err.to_string())
    } else {
        BackendError::Fatal(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let message = format!("{}: {}", status, body);
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            BackendError::Transient(message)
        }
        _ => BackendError::Fatal(message),
    }
}

/// Extract the `data` column from a PostgREST select response
fn first_row_data(rows: Value) -> Result<Option<Value>, BackendError> {
    match rows {
        Value::Array(mut rows) => {
            if rows.is_empty() {
                return Ok(None);
            }
            Ok(rows.swap_remove(0).get_mut("data").map(Value::take))
        }
        other => Err(BackendError::Fatal(format!(
            "unexpected select response: {}",
            other
        ))),
    }
}

#[async_trait]
impl CheckpointBackend for SupabaseBackend {
    async fn upsert(&self, id: &str, payload: &Value) -> Result<(), BackendError> {
        let body = json!([{ "id": id, "data": payload }]);

        let resp = self
            .authorized(self.client.post(self.upsert_url()?))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }
        Ok(())
    }

    async fn select(&self, id: &str) -> Result<Option<Value>, BackendError> {
        let resp = self
            .authorized(self.client.get(self.select_url(id)?))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let rows: Value = resp.json().await.map_err(classify_transport)?;
        first_row_data(rows)
    }
}
