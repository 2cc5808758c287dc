//! Wire DTOs for the HTTP binding. A thin
//! layer over the core model types — no business logic lives here, only
//! (de)serialization shapes, keeping internal domain types separate from
//! OpenAI-compatible wire types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatMessage, EnsembleConfig, ModelParams, Response, ValidationConfig};

#[derive(Debug, Deserialize)]
pub struct CompletionRequestDto {
    pub prompt: Option<String>,
    pub messages: Option<Vec<ChatMessage>>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub params: Option<ModelParams>,
    #[serde(default)]
    pub ensemble_config: Option<EnsembleConfig>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct CompletionResponseDto {
    pub response_id: Uuid,
    pub request_id: Uuid,
    pub model: String,
    pub content: String,
    pub finish_reason: String,
    pub confidence: f64,
    pub usage: UsageDto,
}

#[derive(Debug, Serialize)]
pub struct UsageDto {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<Response> for CompletionResponseDto {
    fn from(r: Response) -> Self {
        Self {
            response_id: r.response_id,
            request_id: r.request_id,
            model: r.model.canonical(),
            content: r.content,
            finish_reason: format!("{:?}", r.finish_reason).to_lowercase(),
            confidence: r.confidence,
            usage: UsageDto {
                prompt_tokens: r.usage.prompt_tokens,
                completion_tokens: r.usage.completion_tokens,
                total_tokens: r.usage.total_tokens,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateDebateRequestDto {
    pub topic: String,
    pub timeout_seconds: Option<u64>,
    pub validation_config: Option<ValidationConfig>,
}

#[derive(Debug, Serialize)]
pub struct CreateDebateResponseDto {
    pub debate_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
    pub message: String,
}

impl From<crate::error::EnsembleError> for ErrorBody {
    fn from(e: crate::error::EnsembleError) -> Self {
        Self {
            error: ErrorDetail {
                kind: e.error_type().to_string(),
                code: e.status_code().to_string(),
                message: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequestDto {
    pub user_id: String,
    pub ttl_hours: Option<u32>,
}
