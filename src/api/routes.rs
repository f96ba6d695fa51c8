//! REST + SSE endpoints for tools and jobs.

use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};
use uuid::Uuid;

use super::agent_card::{AGENT_NAME, AgentCard, PROTOCOL_VERSION};
use crate::error::{Error, ToolError};
use crate::jobs::ExecutionEngine;
use crate::tools::Parameters;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: ExecutionEngine,
    /// Default `limit` for job listings.
    pub recent_jobs_limit: usize,
}

/// Build the Axum router with tool, job, and stream routes.
pub fn api_routes(engine: ExecutionEngine, recent_jobs_limit: usize) -> Router {
    let state = AppState {
        engine,
        recent_jobs_limit,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(status))
        .route("/health", get(health))
        .route("/.well-known/agent-card.json", get(agent_card))
        .route("/api/tools", get(list_tools))
        .route("/api/tools/categories", get(tool_categories))
        .route("/api/tools/{id}", get(get_tool))
        .route("/api/jobs", get(list_jobs).post(create_job))
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/jobs/{id}/cancel", post(cancel_job))
        .route("/api/jobs/{id}/stream", get(stream_job))
        .route("/api/jobs/{id}/events", get(stream_events))
        .layer(cors)
        .with_state(state)
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Tool(ToolError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Tool(ToolError::InvalidParameters { .. }) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match err {
            Error::Tool(ToolError::InvalidParameters { reason, .. }) => reason,
            other => other.to_string(),
        };
        api_error(status, message)
    }
}

fn job_not_found(id: Uuid) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("Job not found: {id}"))
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "admin-tools",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "running",
        "name": AGENT_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "protocol_version": PROTOCOL_VERSION,
    }))
}

// ── Discovery ───────────────────────────────────────────────────────────

async fn agent_card(headers: HeaderMap, State(state): State<AppState>) -> impl IntoResponse {
    let url = headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .map(|host| format!("http://{host}"));
    let definitions = state.engine.tools().list_definitions().await;
    Json(AgentCard::new(&definitions, url))
}

// ── Tools ───────────────────────────────────────────────────────────────

async fn list_tools(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.tools().list_definitions().await)
}

async fn tool_categories(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.tools().categories().await)
}

async fn get_tool(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .engine
        .tools()
        .definition(&id)
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Tool not found: {id}")))
}

// ── Jobs ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateJobRequest {
    tool_id: String,
    #[serde(default)]
    parameters: Parameters,
}

async fn create_job(
    State(state): State<AppState>,
    body: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.map_err(|e| api_error(e.status(), e.body_text()))?;
    let job = state.engine.submit(&body.tool_id, body.parameters).await?;
    info!(job_id = %job.id, tool = %body.tool_id, "Job submitted via API");
    Ok(Json(job))
}

#[derive(Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

async fn list_jobs(
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(state.recent_jobs_limit);
    Json(state.engine.recent_jobs(limit).await)
}

async fn get_job(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .engine
        .get_job(id)
        .await
        .map(Json)
        .ok_or_else(|| job_not_found(id))
}

async fn cancel_job(Path(id): Path<Uuid>, State(state): State<AppState>) -> impl IntoResponse {
    let cancelled = state.engine.cancel_job(id).await;
    debug!(job_id = %id, cancelled, "Cancel requested via API");
    Json(json!({ "job_id": id, "cancelled": cancelled }))
}

// ── Streams ─────────────────────────────────────────────────────────────

fn sse<S>(stream: S) -> Response
where
    S: Stream<Item = Result<Event, axum::Error>> + Send + 'static,
{
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("ping"),
        )
        .into_response()
}

async fn stream_job(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    if state.engine.get_job(id).await.is_none() {
        return Err(job_not_found(id));
    }
    debug!(job_id = %id, "SSE snapshot subscriber connected");
    let updates = state.engine.subscribe(id).await;
    Ok(sse(updates.map(|job| Event::default().event("job").json_data(job))))
}

async fn stream_events(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    if state.engine.get_job(id).await.is_none() {
        return Err(job_not_found(id));
    }
    debug!(job_id = %id, "SSE event subscriber connected");
    let events = state.engine.subscribe_events(id).await;
    Ok(sse(events.map(|event| {
        let name = event_name(&event);
        Event::default().event(name).json_data(event)
    })))
}

/// SSE event name: the `type` tag of the serialized event.
fn event_name(event: &crate::jobs::JobEvent) -> &'static str {
    use crate::jobs::JobEvent::*;
    match event {
        RunStarted { .. } => "run_started",
        ToolCallStart { .. } => "tool_call_start",
        StateDelta { .. } => "state_delta",
        ToolCallEnd { .. } => "tool_call_end",
        RunFinished { .. } => "run_finished",
        RunError { .. } => "run_error",
        RunCancelled { .. } => "run_cancelled",
    }
}
