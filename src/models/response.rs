//! The outbound response shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::provider::ModelRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    FunctionCall,
    Empty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub response_id: Uuid,
    pub request_id: Uuid,
    /// The actual model that produced this content, after any fallbacks.
    pub model: ModelRef,
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Response {
    pub fn new(request_id: Uuid, model: ModelRef, content: impl Into<String>) -> Self {
        Self {
            response_id: Uuid::new_v4(),
            request_id,
            model,
            content: content.into(),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage::default(),
            confidence: 1.0,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_debate_context(mut self, debate_id: Uuid, phase: &str) -> Self {
        self.metadata.insert(
            "debate_id".to_string(),
            serde_json::Value::String(debate_id.to_string()),
        );
        self.metadata.insert(
            "phase".to_string(),
            serde_json::Value::String(phase.to_string()),
        );
        self
    }
}
