// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Handles POST /v1/invoke, GET /v1/results/{result_id}, GET /health, GET /metrics.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillrun_core::jobs::{HistoryTurn, InvokeJob, JobKind, NewJob, SkillInput};
use skillrun_core::types::{ActionResult, ResultDraft, Target};
use skillrun_core::{ActionStep, SkillrunError};
use skillrun_engine::ENQUEUE_ERROR;
use skillrun_engine::context::{history_refs, purge_context};
use tracing::{error, info};

use crate::server::GatewayState;
use crate::sse;

/// Request body for POST /v1/invoke.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    pub uid: String,
    /// Existing result to re-run as a new version. A new id is generated if absent.
    #[serde(default)]
    pub result_id: Option<String>,
    pub query: String,
    #[serde(default)]
    pub skill_name: Option<String>,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub target: Option<Target>,
    #[serde(default)]
    pub locale: Option<String>,
    pub model_name: String,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    #[serde(default)]
    pub context: Value,
}

/// Response body for a queued invocation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeAccepted {
    pub result_id: String,
    pub version: i64,
    pub job_id: i64,
}

/// Response body for GET /v1/results/{result_id}.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub result: ActionResult,
    pub steps: Vec<ActionStep>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error mapped to an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<SkillrunError> for ApiError {
    fn from(e: SkillrunError) -> Self {
        match e {
            SkillrunError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            other => {
                error!(error = %other, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Validates a request and creates the `executing` result version for it.
pub async fn prepare_invocation(
    state: &GatewayState,
    body: InvokeRequest,
) -> Result<InvokeJob, ApiError> {
    if body.query.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "query must not be empty"));
    }
    if body.model_name.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "modelName must not be empty"));
    }

    let deps = state.invocations.supervisor().deps();
    if deps.users.get_user(&body.uid).await?.is_none() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("user not found: {}", body.uid),
        ));
    }

    let resolved = deps.catalog.resolve(&body.model_name);
    let input = SkillInput {
        query: body.query,
        skill_name: body.skill_name,
        params: body.params,
    };
    let input_json = serde_json::to_value(&input).map_err(SkillrunError::serialization)?;
    let result_id = body
        .result_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("ar-{}", uuid::Uuid::new_v4()));
    let context = purge_context(&body.context);

    let row = deps
        .store
        .create_result_version(&ResultDraft {
            result_id,
            title: input.query.clone(),
            uid: body.uid.clone(),
            target: body.target.clone(),
            model_name: resolved.item.model_name.clone(),
            tier: resolved.item.tier.clone(),
            provider_item_id: resolved.item.item_id.clone(),
            input: input_json,
            context: context.clone(),
            history: history_refs(&body.history),
        })
        .await?;

    Ok(InvokeJob {
        uid: body.uid,
        result_id: row.result_id,
        version: row.version,
        input,
        target: body.target,
        locale: body.locale,
        model: resolved.model_info(),
        history: body.history,
        context,
    })
}

/// POST /v1/invoke
///
/// With `Accept: text/event-stream` the invocation runs now and its events
/// stream back. Otherwise it is queued and 202 is returned.
pub async fn post_invoke(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<InvokeRequest>,
) -> Response {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let job = match prepare_invocation(&state, body).await {
        Ok(job) => job,
        Err(e) => return e.into_response(),
    };

    if accept.contains("text/event-stream") {
        return sse::stream_invocation(state, job).into_response();
    }

    let queue = &state.invocations.supervisor().deps().queue;
    let enqueued = match NewJob::new(JobKind::Invoke, &job) {
        Ok(new_job) => queue.enqueue(&new_job).await,
        Err(e) => Err(e),
    };
    match enqueued {
        Ok(job_id) => {
            info!(result_id = %job.result_id, version = job.version, job_id, "invocation queued");
            (
                StatusCode::ACCEPTED,
                Json(InvokeAccepted {
                    result_id: job.result_id,
                    version: job.version,
                    job_id,
                }),
            )
                .into_response()
        }
        Err(e) => {
            state
                .invocations
                .abandon(&job.result_id, job.version, ENQUEUE_ERROR)
                .await;
            ApiError::from(e).into_response()
        }
    }
}

/// GET /v1/results/{result_id}
///
/// Returns the live (highest) version of a result with its steps.
pub async fn get_result(
    State(state): State<GatewayState>,
    Path(result_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let store = &state.invocations.supervisor().deps().store;
    let result = store
        .get_latest_result(&result_id)
        .await?
        .ok_or_else(|| SkillrunError::NotFound {
            entity: "result".into(),
            id: result_id.clone(),
        })?;
    let steps = store.list_steps(&result.result_id, result.version).await?;
    Ok(Json(ResultResponse { result, steps }))
}

/// GET /metrics
///
/// Prometheus text format. 404 when the recorder is not installed.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match state.metrics_render.as_ref() {
        Some(render) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => ApiError::new(StatusCode::NOT_FOUND, "metrics are disabled").into_response(),
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
