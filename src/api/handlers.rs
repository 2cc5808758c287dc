//! Route handlers realizing the HTTP operation table.
//! Thin: parse DTO, call into the core, translate the result/error back to
//! the wire shape.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::sse::{encode_chunk, encode_done};
use super::types::{
    CompletionRequestDto, CompletionResponseDto, CreateDebateRequestDto, CreateDebateResponseDto,
    CreateSessionRequestDto, ErrorBody,
};
use super::AppState;
use crate::error::EnsembleError;
use crate::models::{DebateStatus, RequestOrigin, RoleSlot, RoleTag, Session};

fn error_response(err: EnsembleError) -> (StatusCode, Json<ErrorBody>) {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorBody::from(err)))
}

fn default_slot(state: &AppState) -> RoleSlot {
    RoleSlot::new(RoleTag::Proposer, state.default_model.clone(), vec![])
}

/// `Complete`/`Chat`.
pub async fn complete(
    State(state): State<AppState>,
    Json(body): Json<CompletionRequestDto>,
) -> impl IntoResponse {
    let prompt = body
        .prompt
        .or_else(|| body.messages.as_ref().and_then(|m| m.last()).map(|m| m.content.clone()))
        .unwrap_or_default();

    let mut request = state
        .router
        .build_request(prompt, body.user_id, body.session_id, RequestOrigin::SingleShot);
    if let Some(params) = body.params {
        request.params = params;
    }
    if let Some(ensemble_config) = body.ensemble_config {
        request.ensemble_config = ensemble_config;
    }

    let slot = default_slot(&state);
    match state.router.complete(request, slot, CancellationToken::new()).await {
        Ok(response) => (StatusCode::OK, Json(CompletionResponseDto::from(response))).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// `Complete` streaming variant.
pub async fn complete_stream(
    State(state): State<AppState>,
    Json(body): Json<CompletionRequestDto>,
) -> impl IntoResponse {
    let prompt = body.prompt.unwrap_or_default();
    let model = state.default_model.clone();
    let Some(adapter) = state.providers.get(&model.provider_id) else {
        return error_response(EnsembleError::no_available_provider()).into_response();
    };

    let history = vec![crate::models::ChatMessage::user(prompt)];
    let params = body.params.unwrap_or_default();
    let chunk_stream = match adapter.stream(&model, &history, &params, CancellationToken::new()).await {
        Ok(stream) => stream,
        Err(e) => return error_response(EnsembleError::ServiceUnavailable(e.to_string())).into_response(),
    };

    let mut first = true;
    let sse_stream = chunk_stream.map(move |item| {
        let event = match item {
            Ok(chunk) => {
                let e = encode_chunk(&chunk, first);
                first = false;
                e
            }
            Err(e) => super::sse::encode_error(&e.message),
        };
        Ok::<_, std::convert::Infallible>(event)
    })
    .chain(futures::stream::once(async { Ok(encode_done()) }));

    Sse::new(sse_stream).keep_alive(KeepAlive::default()).into_response()
}

#[derive(serde::Deserialize)]
pub struct DebateParticipantDto {
    pub role: String,
    pub primary_provider: String,
    pub primary_model: String,
    #[serde(default)]
    pub fallback_providers: Vec<(String, String)>,
}

fn role_from_str(s: &str) -> RoleTag {
    match s.to_lowercase().as_str() {
        "analyst" => RoleTag::Analyst,
        "proposer" => RoleTag::Proposer,
        "critic" => RoleTag::Critic,
        "synthesis" => RoleTag::Synthesis,
        "mediator" => RoleTag::Mediator,
        _ => RoleTag::Proposer,
    }
}

/// `CreateDebate`. Uses the crate's default standard-5 role
/// set unless the caller later extends this DTO with explicit participants;
/// kept intentionally minimal since provider wiring is the deployer's job.
pub async fn create_debate(
    State(state): State<AppState>,
    Json(body): Json<CreateDebateRequestDto>,
) -> impl IntoResponse {
    let participants: Vec<RoleSlot> = RoleTag::ALL
        .iter()
        .map(|role| RoleSlot::new(*role, state.default_model.clone(), vec![]))
        .collect();

    let result = state
        .router
        .create_debate(
            None,
            body.topic,
            participants,
            body.timeout_seconds.unwrap_or(120),
            Default::default(),
            body.validation_config,
            CancellationToken::new(),
        )
        .await;

    match result {
        Ok(debate_id) => (
            StatusCode::ACCEPTED,
            Json(CreateDebateResponseDto {
                debate_id,
                status: "accepted".to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

pub async fn get_debate(State(state): State<AppState>, Path(debate_id): Path<Uuid>) -> impl IntoResponse {
    match state.debates.get(debate_id) {
        Some(debate) => (StatusCode::OK, Json(debate)).into_response(),
        None => error_response(EnsembleError::NotFound(format!("debate {debate_id}"))).into_response(),
    }
}

pub async fn get_debate_status(
    State(state): State<AppState>,
    Path(debate_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.debates.get(debate_id) {
        Some(debate) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": debate.status, "current_phase": debate.current_phase })),
        )
            .into_response(),
        None => error_response(EnsembleError::NotFound(format!("debate {debate_id}"))).into_response(),
    }
}

/// `GetDebateResults`.
pub async fn get_debate_results(
    State(state): State<AppState>,
    Path(debate_id): Path<Uuid>,
) -> impl IntoResponse {
    let Some(debate) = state.debates.get(debate_id) else {
        return error_response(EnsembleError::NotFound(format!("debate {debate_id}"))).into_response();
    };

    match debate.status {
        DebateStatus::Pending => {
            error_response(EnsembleError::NotFound(format!("debate {debate_id} is pending"))).into_response()
        }
        DebateStatus::Running => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::from(EnsembleError::InvalidRequest(format!(
                "debate not completed, status={:?}",
                debate.status
            )))),
        )
            .into_response(),
        DebateStatus::Failed => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::from(EnsembleError::InvalidRequest(
                "debate failed".to_string(),
            ))),
        )
            .into_response(),
        DebateStatus::Completed => match debate.result {
            Some(result) => (StatusCode::OK, Json(result)).into_response(),
            None => error_response(EnsembleError::Internal(
                "debate completed without a result".to_string(),
            ))
            .into_response(),
        },
    }
}

pub async fn list_debates(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let status_filter = params.get("status").and_then(|s| match s.as_str() {
        "pending" => Some(DebateStatus::Pending),
        "running" => Some(DebateStatus::Running),
        "completed" => Some(DebateStatus::Completed),
        "failed" => Some(DebateStatus::Failed),
        _ => None,
    });
    Json(state.debates.list(status_filter)).into_response()
}

pub async fn delete_debate(State(state): State<AppState>, Path(debate_id): Path<Uuid>) -> impl IntoResponse {
    if state.debates.remove_if_terminal(debate_id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "cancellation_requested" })),
        )
            .into_response()
    }
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequestDto>,
) -> impl IntoResponse {
    let session = Session::new(body.user_id, body.ttl_hours);
    state.sessions.put(session.session_id, session.clone());
    (StatusCode::CREATED, Json(session)).into_response()
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let include_context = params
        .get("include_context")
        .map(|v| v == "true")
        .unwrap_or(false);
    match state.sessions.get(&session_id) {
        Some(mut session) => {
            if !include_context {
                session.context.clear();
            }
            (StatusCode::OK, Json(session)).into_response()
        }
        None => error_response(EnsembleError::NotFound(format!("session {session_id}"))).into_response(),
    }
}

pub async fn terminate_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.sessions.get(&session_id) {
        Some(mut session) => {
            session.status = crate::models::SessionStatus::Terminated;
            state.sessions.put(session_id, session);
            StatusCode::NO_CONTENT.into_response()
        }
        None => error_response(EnsembleError::NotFound(format!("session {session_id}"))).into_response(),
    }
}

pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sessions.list(|_| true)).into_response()
}

pub async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.health.all_snapshots()).into_response()
}
