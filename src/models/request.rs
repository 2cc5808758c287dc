//! The inbound request shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<serde_json::Value>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            name: None,
            tool_calls: None,
        }
    }
}

/// Model sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub stop: Vec<String>,
    /// Per-attempt deadline. When absent, the slot's own timeout (if any)
    /// governs.
    pub timeout_seconds: Option<u64>,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
            top_p: 1.0,
            stop: Vec::new(),
            timeout_seconds: None,
        }
    }
}

/// Aggregation strategy for weighted voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    ConfidenceWeighted,
    MajorityVote,
    BestOfN,
}

impl Default for VotingStrategy {
    fn default() -> Self {
        VotingStrategy::ConfidenceWeighted
    }
}

/// `ensemble_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub strategy: VotingStrategy,
    pub min_providers: usize,
    pub confidence_threshold: f64,
    pub fallback_to_best: bool,
    pub timeout_seconds: u64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            strategy: VotingStrategy::ConfidenceWeighted,
            min_providers: 1,
            confidence_threshold: 0.0,
            fallback_to_best: true,
            timeout_seconds: 60,
        }
    }
}

/// `validation_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub enable_validation: bool,
    pub enable_polish: bool,
    pub validation_timeout_seconds: Option<u64>,
    pub polish_timeout_seconds: Option<u64>,
    pub min_confidence_to_skip: f64,
    pub max_validation_rounds: u32,
    pub show_phase_indicators: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enable_validation: true,
            enable_polish: true,
            validation_timeout_seconds: None,
            polish_timeout_seconds: None,
            min_confidence_to_skip: 0.9,
            max_validation_rounds: 1,
            show_phase_indicators: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RequestFlags {
    pub stream: bool,
    pub memory_enhanced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RequestStatus {
    /// Status is monotonic forward except `running -> failed`.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Pending, Failed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub request_id: Uuid,
    pub user_id: String,
    pub session_id: String,
    pub prompt: String,
    pub history: Vec<ChatMessage>,
    pub params: ModelParams,
    pub ensemble_config: EnsembleConfig,
    pub validation_config: ValidationConfig,
    pub flags: RequestFlags,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    /// Telemetry-only; never consulted by routing logic.
    pub origin: RequestOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOrigin {
    SingleShot,
    Debate,
}

impl Request {
    pub fn new(prompt: impl Into<String>, origin: RequestOrigin) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_id: "anonymous".to_string(),
            session_id: Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            history: Vec::new(),
            params: ModelParams::default(),
            ensemble_config: EnsembleConfig::default(),
            validation_config: ValidationConfig::default(),
            flags: RequestFlags::default(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            origin,
        }
    }

    /// Attempt a status transition, returning whether it was applied.
    pub fn transition(&mut self, next: RequestStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_monotonic_except_running_to_failed() {
        let mut req = Request::new("ping", RequestOrigin::SingleShot);
        assert!(req.transition(RequestStatus::Running));
        assert!(req.transition(RequestStatus::Failed));
        // Can't go from Failed anywhere.
        assert!(!req.transition(RequestStatus::Completed));
    }

    #[test]
    fn cannot_skip_directly_from_pending_to_completed() {
        let mut req = Request::new("ping", RequestOrigin::SingleShot);
        assert!(!req.transition(RequestStatus::Completed));
        assert_eq!(req.status, RequestStatus::Pending);
    }
}
