// SPDX-License-Identifier: MIT

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Instrument;

use crate::drafter::checkpoint::CheckpointKey;
use crate::drafter::error::DrafterError;
use crate::drafter::workflow::{DraftGraph, RunEvent, WorkflowState};

type ApiError = (StatusCode, Json<Value>);

pub fn router(graph: Arc<DraftGraph>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/runs", post(create_run))
        .route("/api/runs/stream", post(stream_run))
        .route("/api/runs/{thread_id}", get(get_run))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(graph)
}

pub async fn serve(
    port: u16,
    graph: Arc<DraftGraph>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // TraceLayer emits through tracing; env_logger may already own `log`.
    let _ = tracing_subscriber::fmt().try_init();

    let app = router(graph);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub task: String,
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
    #[serde(default = "default_revision_number")]
    pub revision_number: u32,
    pub thread_id: Option<String>,
}

fn default_max_revisions() -> u32 {
    2
}

fn default_revision_number() -> u32 {
    1
}

impl RunRequest {
    fn into_parts(self) -> (CheckpointKey, WorkflowState) {
        let thread_id = self
            .thread_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let state = WorkflowState::new(self.task, self.max_revisions)
            .with_revision_number(self.revision_number);
        (CheckpointKey::from(thread_id), state)
    }
}

fn error_response(error: &DrafterError) -> ApiError {
    let status = match error {
        DrafterError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        DrafterError::Model(_) | DrafterError::Search(_) | DrafterError::MalformedOutput(_) => {
            StatusCode::BAD_GATEWAY
        }
        DrafterError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() })))
}

async fn create_run(
    State(graph): State<Arc<DraftGraph>>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<Value>, ApiError> {
    let (key, initial) = payload.into_parts();
    match graph.run(&key, initial).await {
        Ok(state) => Ok(Json(json!({
            "status": "completed",
            "thread_id": key.record_id(),
            "state": state,
        }))),
        Err(e) => {
            log::error!("Run '{}' failed: {}", key, e);
            Err(error_response(&e))
        }
    }
}

async fn stream_run(
    State(graph): State<Arc<DraftGraph>>,
    Json(payload): Json<RunRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(100);
    let (key, initial) = payload.into_parts();
    let span = tracing::info_span!("run", thread_id = %key);

    tokio::spawn(
        async move {
            log::info!("Starting streaming run '{}'", key);

            if let Err(e) = graph.run_stream(&key, initial, tx.clone()).await {
                log::error!("Streaming run '{}' failed: {}", key, e);
                let _ = tx
                    .send(RunEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
            }
        }
        .instrument(span),
    );

    let stream = ReceiverStream::new(rx).map(|event| {
        Ok(Event::default()
            .json_data(&event)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1)))
}

async fn get_run(
    State(graph): State<Arc<DraftGraph>>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let key = CheckpointKey::from(thread_id);
    match graph.get_state(&key).await {
        Ok(Some(state)) => Ok(Json(json!({ "thread_id": key.record_id(), "state": state }))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Run not found" })),
        )),
        Err(e) => Err(error_response(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafter::error::{BackendError, PersistenceError};

    #[test]
    fn test_run_request_defaults() {
        let request: RunRequest = serde_json::from_value(json!({"task": "Rust"})).unwrap();
        assert_eq!(request.max_revisions, 2);
        assert_eq!(request.revision_number, 1);

        let (key, state) = request.into_parts();
        assert!(!key.record_id().is_empty());
        assert_eq!(state.task, "Rust");
        assert_eq!(state.revision_number, 1);
    }

    #[test]
    fn test_run_request_keeps_thread_id() {
        let request: RunRequest = serde_json::from_value(json!({
            "task": "Rust",
            "max_revisions": 1,
            "revision_number": 2,
            "thread_id": "abc"
        }))
        .unwrap();
        let (key, state) = request.into_parts();
        assert_eq!(key.record_id(), "abc");
        assert_eq!(state.max_revisions, 1);
        assert_eq!(state.revision_number, 2);
    }

    #[test]
    fn test_error_status_mapping() {
        let (status, _) = error_response(&DrafterError::InvalidInput("empty".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let persistence = DrafterError::from(PersistenceError {
            key: "t".to_string(),
            operation: "upsert",
            attempts: 3,
            source: BackendError::Transient("down".to_string()),
        });
        let (status, Json(body)) = error_response(&persistence);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("t"));
    }
}
