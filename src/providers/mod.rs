//! Provider Adapter Contract (C1).
//!
//! The uniform async interface every backend is plugged in behind. Real
//! provider wire protocols (OpenAI/Anthropic/Google/...) are out of this
//! crate's scope — callers supply their own `ProviderAdapter` impl,
//! implemented once per backend and handed to the router. This module
//! ships the trait, the pure error categorizer shared across the crate,
//! and a deterministic mock used by tests and the local demo binary.

pub mod mock;
pub mod reqwest_adapter;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::models::{ChatMessage, FinishReason, ModelParams, ModelRef, Response, TokenUsage};
pub use crate::models::fallback::ProviderErrorKind;

/// A categorized provider failure. Never just an opaque string.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Categorize a raw error string and wrap it.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = categorize_error(&message);
        Self { kind, message }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ProviderError {}

/// A single streamed delta. A terminal chunk carries `finish_reason` and
/// `usage`.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub delta: String,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<TokenUsage>,
}

pub type ProviderResult<T> = Result<T, ProviderError>;
pub type ChunkStream = Pin<Box<dyn Stream<Item = ProviderResult<StreamChunk>> + Send>>;

/// Capability every backend must provide. Implementors must honor the
/// cancellation token promptly at the next I/O boundary, report
/// `empty_response` when the call succeeds but returns no content, and
/// never mutate the caller's history/params.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn complete(
        &self,
        model: &ModelRef,
        history: &[ChatMessage],
        params: &ModelParams,
        cancel: CancellationToken,
    ) -> ProviderResult<Response>;

    async fn stream(
        &self,
        model: &ModelRef,
        history: &[ChatMessage],
        params: &ModelParams,
        cancel: CancellationToken,
    ) -> ProviderResult<ChunkStream>;
}

/// Pure, deterministic, case-insensitive categorizer. First substring match
/// wins, in this fixed order:
/// rate -> timeout -> auth -> quota -> connection -> unavailable ->
/// overloaded -> invalid_request -> empty_response -> unknown.
///
/// Shared verbatim by the Fallback Executor's retry decision, the Health
/// Monitor's logging, and the renderers' icon selection — keep the table
/// in this one place.
pub fn categorize_error(message: &str) -> ProviderErrorKind {
    let lower = message.to_lowercase();

    const RATE_LIMIT: &[&str] = &["rate limit", "rate_limit", "429", "too many requests"];
    const TIMEOUT: &[&str] = &["timeout", "timed out", "deadline exceeded"];
    const AUTH: &[&str] = &[
        "unauthorized",
        "authentication",
        "invalid api key",
        "invalid_api_key",
        "401",
        "forbidden",
        "403",
    ];
    const QUOTA: &[&str] = &["quota", "insufficient_quota", "billing"];
    const CONNECTION: &[&str] = &[
        "connection refused",
        "connection reset",
        "econnrefused",
        "dns",
        "network error",
        "broken pipe",
    ];
    const UNAVAILABLE: &[&str] = &["unavailable", "503", "no healthy upstream"];
    const OVERLOADED: &[&str] = &["overloaded", "capacity", "529", "too busy"];
    const INVALID_REQUEST: &[&str] = &["invalid_request", "invalid request", "bad request", "400"];
    const EMPTY_RESPONSE: &[&str] = &["empty response", "empty completion", "no content"];

    let tables: [(&[&str], ProviderErrorKind); 9] = [
        (RATE_LIMIT, ProviderErrorKind::RateLimit),
        (TIMEOUT, ProviderErrorKind::Timeout),
        (AUTH, ProviderErrorKind::Auth),
        (QUOTA, ProviderErrorKind::Quota),
        (CONNECTION, ProviderErrorKind::Connection),
        (UNAVAILABLE, ProviderErrorKind::Unavailable),
        (OVERLOADED, ProviderErrorKind::Overloaded),
        (INVALID_REQUEST, ProviderErrorKind::InvalidRequest),
        (EMPTY_RESPONSE, ProviderErrorKind::EmptyResponse),
    ];

    for (substrings, kind) in tables {
        if substrings.iter().any(|s| lower.contains(s)) {
            return kind;
        }
    }
    ProviderErrorKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorization_is_deterministic_and_case_insensitive() {
        for msg in [
            "Rate Limit Exceeded",
            "RATE LIMIT EXCEEDED",
            "rate limit exceeded",
        ] {
            assert_eq!(categorize_error(msg), ProviderErrorKind::RateLimit);
        }
    }

    #[test]
    fn first_match_wins_in_fixed_order() {
        // Contains both "timeout" and "unavailable" - timeout wins since it
        // is earlier in the fixed order.
        assert_eq!(
            categorize_error("request timeout, service unavailable"),
            ProviderErrorKind::Timeout
        );
    }

    #[test]
    fn unmatched_message_is_unknown() {
        assert_eq!(categorize_error("the sky is falling"), ProviderErrorKind::Unknown);
    }

    #[test]
    fn auth_detected_before_quota() {
        assert_eq!(
            categorize_error("401 unauthorized: quota also exceeded"),
            ProviderErrorKind::Auth
        );
    }
}
