// SPDX-License-Identifier: MIT

//! HTTP API over a shared [`WorkflowEngine`]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::redraft::error::{CheckpointError, EngineError, RedraftError};
use crate::redraft::workflow::graph::{RunOutcome, StepEvent, WorkflowEngine};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    /// Used when a request omits `max_revisions`
    pub default_max_revisions: u32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/runs", get(list_runs).post(create_run))
        .route("/api/runs/stream", post(stream_run))
        .route("/api/runs/{id}", get(get_run))
        .route("/api/runs/{id}/history", get(get_history))
        .route("/api/runs/{id}/resume", post(resume_run))
        .route("/api/runs/{id}/cancel", post(cancel_run))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> Result<(), RedraftError> {
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

type ApiResponse = (StatusCode, Json<Value>);

fn error_response(err: &EngineError) -> ApiResponse {
    let status = match err {
        EngineError::RunNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::RunExists(_) | EngineError::RunActive(_) => StatusCode::CONFLICT,
        EngineError::Checkpoint(CheckpointError::InvalidRunId(_)) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        log::error!("Request failed: {}", err);
    }
    (status, Json(json!({ "error": err.to_string() })))
}

fn outcome_response(result: Result<RunOutcome, EngineError>) -> ApiResponse {
    match result {
        Ok(outcome) => (StatusCode::OK, Json(json!(outcome))),
        Err(e) => error_response(&e),
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub task: String,
    pub max_revisions: Option<u32>,
    pub run_id: Option<String>,
}

impl RunRequest {
    fn validate(&self) -> Result<(), ApiResponse> {
        if self.task.trim().is_empty() {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "task must not be empty" })),
            ));
        }
        Ok(())
    }
}

/// Runs execute on their own task so a dropped connection cannot abort them mid-step
async fn create_run(State(app): State<AppState>, Json(payload): Json<RunRequest>) -> ApiResponse {
    if let Err(rejected) = payload.validate() {
        return rejected;
    }
    let max_revisions = payload.max_revisions.unwrap_or(app.default_max_revisions);

    let engine = app.engine.clone();
    let handle = tokio::spawn(async move {
        engine
            .start_run(&payload.task, max_revisions, payload.run_id)
            .await
    });
    match handle.await {
        Ok(result) => outcome_response(result),
        Err(e) => {
            log::error!("Run task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Run task failed: {}", e) })),
            )
        }
    }
}

async fn resume_run(State(app): State<AppState>, Path(id): Path<String>) -> ApiResponse {
    let engine = app.engine.clone();
    match tokio::spawn(async move { engine.resume(&id).await }).await {
        Ok(result) => outcome_response(result),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Run task failed: {}", e) })),
        ),
    }
}

async fn cancel_run(State(app): State<AppState>, Path(id): Path<String>) -> ApiResponse {
    if app.engine.cancel(&id) {
        (
            StatusCode::ACCEPTED,
            Json(json!({ "run_id": id, "cancelling": true })),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Run is not executing: {}", id) })),
        )
    }
}

async fn get_run(State(app): State<AppState>, Path(id): Path<String>) -> ApiResponse {
    match app.engine.snapshot(&id).await {
        Ok(checkpoint) => (
            StatusCode::OK,
            Json(json!({
                "run_id": checkpoint.run_id,
                "status": checkpoint.status,
                "active": app.engine.is_active(&id),
                "sequence": checkpoint.sequence,
                "last_step": checkpoint.step,
                "next": checkpoint.next,
                "draft": checkpoint.state.final_draft(),
                "state": checkpoint.state,
                "updated_at": checkpoint.created_at,
            })),
        ),
        Err(e) => error_response(&e),
    }
}

async fn get_history(State(app): State<AppState>, Path(id): Path<String>) -> ApiResponse {
    match app.engine.history(&id).await {
        Ok(history) => (StatusCode::OK, Json(json!(history))),
        Err(e) => error_response(&e),
    }
}

async fn list_runs(State(app): State<AppState>) -> ApiResponse {
    let ids = match app.engine.runs().await {
        Ok(ids) => ids,
        Err(e) => return error_response(&e),
    };

    let mut runs = Vec::with_capacity(ids.len());
    for id in ids {
        match app.engine.snapshot(&id).await {
            Ok(checkpoint) => runs.push(json!({
                "run_id": id,
                "status": checkpoint.status,
                "active": app.engine.is_active(&id),
                "sequence": checkpoint.sequence,
                "revision_count": checkpoint.state.revision_count,
                "task": checkpoint.state.task,
            })),
            Err(e) => log::warn!("Skipping run {}: {}", id, e),
        }
    }
    (StatusCode::OK, Json(json!(runs)))
}

/// Frames of the streaming endpoint
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    Step(StepEvent),
    Finished(RunOutcome),
    Error { message: String },
}

impl RunEvent {
    fn name(&self) -> &'static str {
        match self {
            RunEvent::Step(_) => "step",
            RunEvent::Finished(_) => "finished",
            RunEvent::Error { .. } => "error",
        }
    }
}

async fn stream_run(
    State(app): State<AppState>,
    Json(payload): Json<RunRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        if let Err((_, Json(body))) = payload.validate() {
            let message = body["error"].as_str().unwrap_or_default().to_string();
            let _ = tx.send(RunEvent::Error { message }).await;
            return;
        }
        let max_revisions = payload.max_revisions.unwrap_or(app.default_max_revisions);

        let (step_tx, mut step_rx) = mpsc::channel::<StepEvent>(32);
        let forward = {
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(event) = step_rx.recv().await {
                    let _ = tx.send(RunEvent::Step(event)).await;
                }
            })
        };

        let result = app
            .engine
            .start_run_with_events(&payload.task, max_revisions, payload.run_id, Some(step_tx))
            .await;
        // The engine dropped its sender, so the forwarder drains and exits
        let _ = forward.await;

        let last = match result {
            Ok(outcome) => RunEvent::Finished(outcome),
            Err(e) => {
                log::error!("Streaming run failed: {}", e);
                RunEvent::Error {
                    message: e.to_string(),
                }
            }
        };
        let _ = tx.send(last).await;
    });

    let stream = ReceiverStream::new(rx).map(|event: RunEvent| {
        Ok(Event::default()
            .event(event.name())
            .json_data(&event)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1)))
}
